//! Logging helpers for user-supplied text

/// Maximum number of characters of message text to log
pub const MAX_LOG_TEXT_LENGTH: usize = 50;

/// Patterns that indicate potentially sensitive content
pub const SENSITIVE_PATTERNS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "bearer",
    "authorization",
    "credential",
    "-----begin",
];

/// Mask potentially sensitive text for logging
///
/// Text containing a sensitive pattern is replaced wholesale; anything else
/// is cut at [`MAX_LOG_TEXT_LENGTH`] characters.
///
/// # Examples
/// ```
/// use rela_core::util::mask_for_logging;
///
/// assert!(mask_for_logging("my password is hunter2").contains("REDACTED"));
/// assert_eq!(mask_for_logging("Hello"), "Hello");
/// ```
#[must_use]
pub fn mask_for_logging(text: &str) -> String {
    let lower = text.to_lowercase();

    if SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p)) {
        return "[REDACTED - potentially sensitive content]".to_string();
    }

    match text.char_indices().nth(MAX_LOG_TEXT_LENGTH) {
        Some((cut, _)) => format!("{}...[truncated]", &text[..cut]),
        None => text.to_string(),
    }
}
