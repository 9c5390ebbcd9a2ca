use super::*;
use std::sync::atomic::AtomicUsize;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

use crate::client::{MockPlatformClient, PlatformClient};
use crate::error::ClientError;
use crate::hub::Subscription;
use crate::mock::ScriptedClientFactory;

fn setup() -> (BotRegistry, ScriptedClientFactory, Subscription) {
    let factory = ScriptedClientFactory::new();
    let hub = Arc::new(EventHub::new(64));
    let sub = hub.register();
    let registry = BotRegistry::new(Arc::new(factory.clone()), hub);
    (registry, factory, sub)
}

async fn next_event(sub: &mut Subscription) -> BroadcastEvent {
    let frame = tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("timed out waiting for event")
        .expect("hub dropped observer");
    serde_json::from_str(&frame).unwrap()
}

fn assert_no_event(sub: &mut Subscription) {
    if let Some(frame) = sub.try_recv() {
        panic!("unexpected event: {frame}");
    }
}

/// Hands out one prepared client, then refuses.
struct OneShotFactory(Mutex<Option<Box<dyn PlatformClient>>>);

impl OneShotFactory {
    fn new(client: impl PlatformClient + 'static) -> Arc<Self> {
        Arc::new(Self(Mutex::new(Some(Box::new(client)))))
    }
}

impl ClientFactory for OneShotFactory {
    fn build(&self, _token: &str) -> std::result::Result<Box<dyn PlatformClient>, ClientError> {
        self.0
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ClientError::new("no client left"))
    }
}

struct RefusingFactory;

impl ClientFactory for RefusingFactory {
    fn build(&self, _token: &str) -> std::result::Result<Box<dyn PlatformClient>, ClientError> {
        Err(ClientError::new("malformed token"))
    }
}

/// Mock whose handler slot the test can reach.
fn mock_client(handler_slot: Arc<Mutex<Option<MessageHandler>>>) -> MockPlatformClient {
    let mut mock = MockPlatformClient::new();
    mock.expect_on_message().returning(move |handler| {
        *handler_slot.lock().unwrap() = Some(handler);
    });
    mock
}

#[tokio::test]
async fn test_create_registers_running_bot() {
    let (registry, factory, mut sub) = setup();

    let id = tokio_test::assert_ok!(registry.create("Alpha", "tok-1").await);

    let bots = registry.list().await;
    assert_eq!(bots.len(), 1);
    assert_eq!(bots[0].id, id);
    assert_eq!(bots[0].name, "Alpha");
    assert_eq!(bots[0].status, BotStatus::Running);

    assert_eq!(
        next_event(&mut sub).await,
        BroadcastEvent::BotCreated {
            name: "Alpha".to_string()
        }
    );
    assert_no_event(&mut sub);

    let client = factory.last_client().unwrap();
    assert_eq!(client.token(), "tok-1");
    assert!(client.is_started());
}

#[tokio::test]
async fn test_create_trims_token() {
    let (registry, factory, _sub) = setup();

    registry.create("Alpha", "  tok-1\n").await.unwrap();
    assert_eq!(factory.last_client().unwrap().token(), "tok-1");
}

#[tokio::test]
async fn test_create_rejects_blank_token() {
    let (registry, factory, mut sub) = setup();

    for token in ["", "   ", "\t\n"] {
        let err = registry.create("Alpha", token).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    assert!(registry.is_empty().await);
    assert_eq!(factory.built_count(), 0);
    assert_no_event(&mut sub);
}

#[tokio::test]
async fn test_create_start_failure_records_nothing() {
    let (registry, factory, mut sub) = setup();
    factory.reject_token("bad");

    let err = registry.create("Alpha", "bad").await.unwrap_err();
    match err {
        Error::StartFailed(e) => assert_eq!(e.message(), "Unauthorized"),
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(registry.list().await.is_empty());
    assert_no_event(&mut sub);
}

#[tokio::test]
async fn test_create_factory_failure_is_start_failure() {
    let hub = Arc::new(EventHub::new(16));
    let mut sub = hub.register();
    let registry = BotRegistry::new(Arc::new(RefusingFactory), hub);

    let err = registry.create("Alpha", "tok").await.unwrap_err();
    assert!(matches!(err, Error::StartFailed(_)));
    assert!(registry.is_empty().await);
    assert_no_event(&mut sub);
}

#[tokio::test]
async fn test_duplicate_names_get_distinct_ids() {
    let (registry, _factory, _sub) = setup();

    let a = registry.create("Twin", "tok-a").await.unwrap();
    let b = registry.create("Twin", "tok-b").await.unwrap();

    assert_ne!(a, b);
    assert_eq!(registry.len().await, 2);
}

#[tokio::test]
async fn test_list_keeps_creation_order() {
    let (registry, _factory, _sub) = setup();

    let mut ids = Vec::new();
    for i in 0..10 {
        ids.push(registry.create(&format!("bot-{i}"), "tok").await.unwrap());
    }
    registry.stop(ids[3]).await.unwrap();

    let listed: Vec<BotId> = registry.list().await.into_iter().map(|b| b.id).collect();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn test_get_unknown_is_not_found() {
    let (registry, _factory, _sub) = setup();
    let err = tokio_test::assert_err!(registry.get(Uuid::new_v4()).await);
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_stop_then_start() {
    let (registry, factory, mut sub) = setup();
    let id = registry.create("Alpha", "tok").await.unwrap();
    next_event(&mut sub).await;

    registry.stop(id).await.unwrap();
    assert_eq!(registry.get(id).await.unwrap().status, BotStatus::Stopped);
    assert!(!factory.last_client().unwrap().is_started());
    assert_eq!(
        next_event(&mut sub).await,
        BroadcastEvent::Status {
            name: "Alpha".to_string(),
            status: BotStatus::Stopped
        }
    );

    registry.start(id).await.unwrap();
    assert_eq!(registry.get(id).await.unwrap().status, BotStatus::Running);
    assert_eq!(
        next_event(&mut sub).await,
        BroadcastEvent::Status {
            name: "Alpha".to_string(),
            status: BotStatus::Running
        }
    );
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    let (registry, factory, mut sub) = setup();
    let id = registry.create("Alpha", "tok").await.unwrap();
    next_event(&mut sub).await;
    let client = factory.last_client().unwrap();

    // already running
    registry.start(id).await.unwrap();
    assert_eq!(client.start_calls(), 1);
    assert_no_event(&mut sub);

    registry.stop(id).await.unwrap();
    next_event(&mut sub).await;

    registry.stop(id).await.unwrap();
    assert_eq!(client.stop_calls(), 1);
    assert_no_event(&mut sub);
    assert_eq!(registry.get(id).await.unwrap().status, BotStatus::Stopped);
}

#[tokio::test]
async fn test_restart_failure_stays_stopped() {
    let (registry, factory, mut sub) = setup();
    let id = registry.create("Alpha", "tok").await.unwrap();
    registry.stop(id).await.unwrap();
    next_event(&mut sub).await;
    next_event(&mut sub).await;

    let client = factory.last_client().unwrap();
    client.fail_start(Some("network down"));

    let err = registry.start(id).await.unwrap_err();
    assert!(matches!(err, Error::StartFailed(_)));
    assert_eq!(registry.get(id).await.unwrap().status, BotStatus::Stopped);
    assert_no_event(&mut sub);
}

#[tokio::test]
async fn test_stop_failure_stays_running() {
    let slot = Arc::new(Mutex::new(None));
    let mut mock = mock_client(Arc::clone(&slot));
    mock.expect_start().times(1).returning(|| Ok(()));
    mock.expect_stop()
        .times(1)
        .returning(|| Err(ClientError::new("timeout")));

    let hub = Arc::new(EventHub::new(16));
    let mut sub = hub.register();
    let registry = BotRegistry::new(OneShotFactory::new(mock), hub);

    let id = registry.create("Alpha", "tok").await.unwrap();
    next_event(&mut sub).await;

    let err = registry.stop(id).await.unwrap_err();
    match err {
        Error::StopFailed(e) => assert_eq!(e.message(), "timeout"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(registry.get(id).await.unwrap().status, BotStatus::Running);
    assert_no_event(&mut sub);
}

#[tokio::test]
async fn test_delete_running_bot() {
    let (registry, factory, mut sub) = setup();
    let id = registry.create("Alpha", "tok").await.unwrap();
    next_event(&mut sub).await;

    registry.delete(id).await.unwrap();

    let client = factory.last_client().unwrap();
    assert_eq!(client.stop_calls(), 1);
    assert!(registry.list().await.is_empty());
    // no status event for the implicit stop
    assert_eq!(
        next_event(&mut sub).await,
        BroadcastEvent::Deleted {
            name: "Alpha".to_string()
        }
    );
    assert_no_event(&mut sub);
}

#[tokio::test]
async fn test_delete_stopped_bot_does_not_stop_again() {
    let (registry, factory, _sub) = setup();
    let id = registry.create("Alpha", "tok").await.unwrap();
    registry.stop(id).await.unwrap();

    registry.delete(id).await.unwrap();
    assert_eq!(factory.last_client().unwrap().stop_calls(), 1);
}

#[tokio::test]
async fn test_delete_removes_even_if_stop_fails() {
    let (registry, factory, mut sub) = setup();
    let id = registry.create("Alpha", "tok").await.unwrap();
    next_event(&mut sub).await;
    factory.last_client().unwrap().fail_stop(Some("timeout"));

    registry.delete(id).await.unwrap();

    assert!(registry.is_empty().await);
    assert_eq!(
        next_event(&mut sub).await,
        BroadcastEvent::Deleted {
            name: "Alpha".to_string()
        }
    );
}

#[tokio::test]
async fn test_deleted_id_is_not_found() {
    let (registry, _factory, mut sub) = setup();
    let id = registry.create("Alpha", "tok").await.unwrap();
    registry.delete(id).await.unwrap();
    next_event(&mut sub).await;
    next_event(&mut sub).await;

    assert!(matches!(registry.start(id).await, Err(Error::NotFound(_))));
    assert!(matches!(registry.stop(id).await, Err(Error::NotFound(_))));
    assert!(matches!(registry.delete(id).await, Err(Error::NotFound(_))));
    assert_no_event(&mut sub);
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let (registry, _factory, mut sub) = setup();
    let id = Uuid::new_v4();

    assert!(matches!(registry.start(id).await, Err(Error::NotFound(_))));
    assert!(matches!(registry.stop(id).await, Err(Error::NotFound(_))));
    assert!(matches!(registry.delete(id).await, Err(Error::NotFound(_))));
    assert_no_event(&mut sub);
}

#[tokio::test]
async fn test_inbound_message_is_published_and_answered() {
    let (registry, factory, mut sub) = setup();
    registry.create("Alpha", "tok").await.unwrap();
    let client = factory.last_client().unwrap();

    assert!(client.deliver("42", "hi"));

    assert_eq!(
        next_event(&mut sub).await,
        BroadcastEvent::BotCreated {
            name: "Alpha".to_string()
        }
    );
    assert_eq!(
        next_event(&mut sub).await,
        BroadcastEvent::Message {
            bot: "Alpha".to_string(),
            msg: "hi".to_string()
        }
    );

    tokio::time::timeout(Duration::from_secs(2), async {
        while client.replies().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert_eq!(
        client.replies(),
        vec![(
            "42".to_string(),
            "Hello, I am Alpha! You wrote: hi".to_string()
        )]
    );
}

#[tokio::test]
async fn test_custom_reply_template() {
    let factory = ScriptedClientFactory::new();
    let registry = BotRegistry::new(Arc::new(factory.clone()), Arc::new(EventHub::default()))
        .with_reply_template("{name} echoes: {message}");
    registry.create("Echo", "tok").await.unwrap();
    let client = factory.last_client().unwrap();

    client.deliver("7", "ping");

    tokio::time::timeout(Duration::from_secs(2), async {
        while client.replies().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert_eq!(client.replies()[0].1, "Echo echoes: ping");
}

#[tokio::test]
async fn test_messages_keep_arrival_order() {
    let (registry, factory, mut sub) = setup();
    registry.create("Alpha", "tok").await.unwrap();
    next_event(&mut sub).await;
    let client = factory.last_client().unwrap();

    for i in 0..20 {
        client.deliver("1", &format!("m{i}"));
    }

    for i in 0..20 {
        match next_event(&mut sub).await {
            BroadcastEvent::Message { msg, .. } => assert_eq!(msg, format!("m{i}")),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_reply_failure_still_publishes() {
    let (registry, factory, mut sub) = setup();
    registry.create("Alpha", "tok").await.unwrap();
    next_event(&mut sub).await;
    let client = factory.last_client().unwrap();
    client.fail_reply(Some("chat not found"));

    client.deliver("42", "first");
    client.deliver("42", "second");

    for expected in ["first", "second"] {
        assert_eq!(
            next_event(&mut sub).await,
            BroadcastEvent::Message {
                bot: "Alpha".to_string(),
                msg: expected.to_string()
            }
        );
    }
    assert!(client.replies().is_empty());
}

#[tokio::test]
async fn test_stopped_bot_does_not_deliver() {
    let (registry, factory, mut sub) = setup();
    let id = registry.create("Alpha", "tok").await.unwrap();
    registry.stop(id).await.unwrap();
    next_event(&mut sub).await;
    next_event(&mut sub).await;

    let client = factory.last_client().unwrap();
    assert!(!client.deliver("42", "anyone?"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_no_event(&mut sub);
    assert!(client.replies().is_empty());
}

#[tokio::test]
async fn test_handler_call_after_stop_is_dropped() {
    // A client that keeps invoking the handler after stop must not leak
    // events past the registry.
    let slot: Arc<Mutex<Option<MessageHandler>>> = Arc::new(Mutex::new(None));
    let mut mock = mock_client(Arc::clone(&slot));
    mock.expect_start().returning(|| Ok(()));
    mock.expect_stop().returning(|| Ok(()));
    mock.expect_reply().never();

    let hub = Arc::new(EventHub::new(16));
    let mut sub = hub.register();
    let registry = BotRegistry::new(OneShotFactory::new(mock), hub);

    let id = registry.create("Alpha", "tok").await.unwrap();
    registry.stop(id).await.unwrap();
    next_event(&mut sub).await;
    next_event(&mut sub).await;

    let handler = slot.lock().unwrap().clone().unwrap();
    handler(InboundMessage::new("42", "late"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_no_event(&mut sub);
}

#[tokio::test]
async fn test_message_in_flight_at_delete_is_dropped() {
    let (registry, factory, mut sub) = setup();
    let id = registry.create("Alpha", "tok").await.unwrap();
    let client = factory.last_client().unwrap();

    registry.delete(id).await.unwrap();
    // the scripted client is stopped now, so nothing reaches the handler
    assert!(!client.deliver("42", "too late"));

    next_event(&mut sub).await;
    next_event(&mut sub).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_no_event(&mut sub);
}

#[tokio::test]
async fn test_concurrent_creates() {
    let (registry, _factory, _sub) = setup();
    let registry = Arc::new(registry);

    let mut handles = Vec::new();
    for i in 0..32 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry.create(&format!("bot-{i}"), "tok").await.unwrap()
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }
    assert_eq!(ids.len(), 32);
    assert_eq!(registry.len().await, 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_start_stop_matches_last_event() {
    let (registry, _factory, mut sub) = setup();
    let registry = Arc::new(registry);
    let id = registry.create("Alpha", "tok").await.unwrap();
    next_event(&mut sub).await;

    let mut handles = Vec::new();
    for i in 0..40 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                registry.stop(id).await
            } else {
                registry.start(id).await
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Status events must alternate, and the last one matches the final state.
    let mut last = BotStatus::Running;
    while let Some(frame) = sub.try_recv() {
        let event: BroadcastEvent = serde_json::from_str(&frame).unwrap();
        match event {
            BroadcastEvent::Status { status, .. } => {
                assert_ne!(status, last);
                last = status;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(registry.get(id).await.unwrap().status, last);
}

#[tokio::test]
async fn test_concurrent_delete_succeeds_once() {
    let (registry, _factory, mut sub) = setup();
    let registry = Arc::new(registry);
    let id = registry.create("Alpha", "tok").await.unwrap();
    next_event(&mut sub).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move { registry.delete(id).await }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(Error::NotFound(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(ok, 1);
    next_event(&mut sub).await;
    assert_no_event(&mut sub);
}

#[tokio::test]
async fn test_shutdown_stops_running_bots_silently() {
    let (registry, factory, mut sub) = setup();
    let a = registry.create("A", "tok-a").await.unwrap();
    registry.create("B", "tok-b").await.unwrap();
    registry.stop(a).await.unwrap();
    while sub.try_recv().is_some() {}

    registry.shutdown().await;

    assert!(!factory.client_for("tok-a").unwrap().is_started());
    assert!(!factory.client_for("tok-b").unwrap().is_started());
    // the already stopped bot is not stopped twice
    assert_eq!(factory.client_for("tok-a").unwrap().stop_calls(), 1);
    assert_no_event(&mut sub);
}

#[test]
fn test_render_reply() {
    assert_eq!(
        render_reply(DEFAULT_REPLY_TEMPLATE, "Alpha", "hi"),
        "Hello, I am Alpha! You wrote: hi"
    );
    // placeholders inside substituted text are not expanded again
    assert_eq!(render_reply("{message}", "A", "{name}"), "{name}");
    assert_eq!(render_reply("{ {nam} {name}}", "A", "m"), "{ {nam} A}");
}

/// Client whose `start` waits on a gate after the first one went through.
struct GatedClient {
    starts: Arc<AtomicUsize>,
    gate: Arc<Notify>,
}

#[async_trait::async_trait]
impl PlatformClient for GatedClient {
    fn on_message(&self, _handler: MessageHandler) {}

    async fn start(&self) -> std::result::Result<(), ClientError> {
        if self.starts.fetch_add(1, Ordering::SeqCst) > 0 {
            self.gate.notified().await;
        }
        Ok(())
    }

    async fn stop(&self) -> std::result::Result<(), ClientError> {
        Ok(())
    }

    async fn reply(&self, _chat_id: &str, _text: &str) -> std::result::Result<(), ClientError> {
        Ok(())
    }
}

/// Builds a [`GatedClient`] for the token "gated", scripted clients otherwise.
struct GatedFactory {
    starts: Arc<AtomicUsize>,
    gate: Arc<Notify>,
    others: ScriptedClientFactory,
}

impl ClientFactory for GatedFactory {
    fn build(&self, token: &str) -> std::result::Result<Box<dyn PlatformClient>, ClientError> {
        if token == "gated" {
            Ok(Box::new(GatedClient {
                starts: Arc::clone(&self.starts),
                gate: Arc::clone(&self.gate),
            }))
        } else {
            self.others.build(token)
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_publish_once() {
    let starts = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let factory = GatedFactory {
        starts: Arc::clone(&starts),
        gate: Arc::clone(&gate),
        others: ScriptedClientFactory::new(),
    };
    let hub = Arc::new(EventHub::new(64));
    let mut sub = hub.register();
    let registry = Arc::new(BotRegistry::new(Arc::new(factory), hub));

    let alpha = registry.create("Alpha", "gated").await.unwrap();
    let beta = registry.create("Beta", "tok").await.unwrap();
    registry.stop(alpha).await.unwrap();
    for _ in 0..3 {
        next_event(&mut sub).await;
    }

    let first = tokio::spawn({
        let registry = Arc::clone(&registry);
        async move { registry.start(alpha).await }
    });
    let second = tokio::spawn({
        let registry = Arc::clone(&registry);
        async move { registry.start(alpha).await }
    });

    tokio::time::timeout(Duration::from_secs(2), async {
        while starts.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("client start never called");

    // Alpha's start is parked inside the client; nothing else waits on it.
    let limit = Duration::from_secs(1);
    let bots = tokio::time::timeout(limit, registry.list()).await.unwrap();
    assert_eq!(bots.len(), 2);
    let alpha_now = tokio::time::timeout(limit, registry.get(alpha)).await.unwrap();
    assert_eq!(alpha_now.unwrap().status, BotStatus::Stopped);
    tokio::time::timeout(limit, registry.stop(beta))
        .await
        .unwrap()
        .unwrap();
    tokio::time::timeout(limit, registry.start(beta))
        .await
        .unwrap()
        .unwrap();

    gate.notify_one();
    for handle in [first, second] {
        let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("start did not finish")
            .unwrap();
        tokio_test::assert_ok!(outcome);
    }

    let mut alpha_running = 0;
    while let Some(frame) = sub.try_recv() {
        let event: BroadcastEvent = serde_json::from_str(&frame).unwrap();
        if let BroadcastEvent::Status { name, status } = event {
            if name == "Alpha" {
                assert_eq!(status, BotStatus::Running);
                alpha_running += 1;
            }
        }
    }
    assert_eq!(alpha_running, 1);
    assert_eq!(starts.load(Ordering::SeqCst), 2);
    assert_eq!(registry.get(alpha).await.unwrap().status, BotStatus::Running);
}
