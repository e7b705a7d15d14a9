// ── Event hub client ──
//
// Turns a hub link advertised by the API into per-topic push streams.
// One stream per topic; any number of handlers share it. Hub failures are
// logged and swallowed: real-time updates are layered on top of a working
// request/response flow and never break it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use greetsync_api::{EventStreamHandle, Gateway, PushEvent, ReconnectConfig};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

// ── Types ────────────────────────────────────────────────────────────

/// Hub URL plus the subscriber token for it.
pub struct HubAuthorization {
    pub hub_url: Url,
    pub token: SecretString,
}

impl HubAuthorization {
    pub fn new(hub_url: Url, token: impl Into<String>) -> Self {
        Self {
            hub_url,
            token: SecretString::from(token.into()),
        }
    }
}

impl std::fmt::Debug for HubAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubAuthorization")
            .field("hub_url", &self.hub_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Identifies one attached handler, for [`EventHub::detach_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Callback invoked for every event on a topic, in delivery order.
pub type PushHandler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Opens the underlying push stream for a topic.
pub trait HubConnector: Send + Sync {
    fn open(
        &self,
        authorization: &HubAuthorization,
        topic: &str,
        cancel: CancellationToken,
    ) -> Result<EventStreamHandle, greetsync_api::Error>;
}

/// Server-Sent Events connector for a Mercure hub.
#[derive(Debug, Clone)]
pub struct SseConnector {
    http: reqwest::Client,
    reconnect: ReconnectConfig,
}

impl SseConnector {
    pub fn new(http: reqwest::Client, reconnect: ReconnectConfig) -> Self {
        Self { http, reconnect }
    }
}

impl HubConnector for SseConnector {
    fn open(
        &self,
        authorization: &HubAuthorization,
        topic: &str,
        cancel: CancellationToken,
    ) -> Result<EventStreamHandle, greetsync_api::Error> {
        EventStreamHandle::connect(
            self.http.clone(),
            &authorization.hub_url,
            topic,
            SecretString::from(authorization.token.expose_secret().to_owned()),
            self.reconnect.clone(),
            cancel,
        )
    }
}

// ── Subscription ─────────────────────────────────────────────────────

type HandlerList = Arc<RwLock<Vec<(HandlerId, PushHandler)>>>;

struct Subscription {
    stream: EventStreamHandle,
    handlers: HandlerList,
}

impl Subscription {
    fn attach(&self, id: HandlerId, handler: PushHandler) -> usize {
        let mut handlers = self.handlers.write().expect("handler lock poisoned");
        handlers.push((id, handler));
        handlers.len()
    }
}

// ── EventHub ─────────────────────────────────────────────────────────

pub struct EventHub {
    gateway: Gateway,
    connector: Arc<dyn HubConnector>,
    authorization: ArcSwapOption<HubAuthorization>,
    discover_lock: Mutex<()>,
    subscriptions: DashMap<String, Subscription>,
    next_handler: AtomicU64,
    cancel: CancellationToken,
}

impl EventHub {
    pub fn new(gateway: Gateway, connector: Arc<dyn HubConnector>) -> Self {
        Self {
            gateway,
            connector,
            authorization: ArcSwapOption::empty(),
            discover_lock: Mutex::new(()),
            subscriptions: DashMap::new(),
            next_handler: AtomicU64::new(1),
            cancel: CancellationToken::new(),
        }
    }

    // ── Authorization ────────────────────────────────────────────────

    /// Exchange the session for a hub token, once.
    ///
    /// No-op when already authorized. Failures are logged, never returned.
    pub async fn discover(&self, hub_url: &Url) -> bool {
        if self.is_ready() {
            return true;
        }
        let _guard = self.discover_lock.lock().await;
        if self.is_ready() {
            return true;
        }

        match self.gateway.hub_token().await {
            Ok(token) => {
                info!(hub = %hub_url, "push hub authorized");
                self.authorization.store(Some(Arc::new(HubAuthorization {
                    hub_url: hub_url.clone(),
                    token,
                })));
                true
            }
            Err(e) => {
                warn!(error = %e, hub = %hub_url, "push hub authorization failed");
                false
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.authorization.load().is_some()
    }

    pub fn authorization(&self) -> Option<Arc<HubAuthorization>> {
        self.authorization.load_full()
    }

    pub fn set_authorization(&self, authorization: HubAuthorization) {
        self.authorization.store(Some(Arc::new(authorization)));
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Attach `handler` to `topic`, opening the stream on first use.
    ///
    /// Returns `None` when the stream can't be opened (not authorized,
    /// connector failure, no runtime); the reason is logged.
    pub fn subscribe(
        &self,
        topic: &str,
        handler: impl Fn(&PushEvent) + Send + Sync + 'static,
    ) -> Option<HandlerId> {
        let id = HandlerId(self.next_handler.fetch_add(1, Ordering::Relaxed));
        let handler: PushHandler = Arc::new(handler);

        match self.subscriptions.entry(topic.to_owned()) {
            Entry::Occupied(entry) => {
                let count = entry.get().attach(id, handler);
                debug!(topic, handlers = count, "handler attached to open subscription");
            }
            Entry::Vacant(entry) => {
                let subscription = self.open(topic)?;
                subscription.attach(id, handler);
                entry.insert(subscription);
                info!(topic, "subscribed");
            }
        }
        Some(id)
    }

    fn open(&self, topic: &str) -> Option<Subscription> {
        let Some(authorization) = self.authorization.load_full() else {
            warn!(topic, "push hub not authorized, cannot subscribe");
            return None;
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, topic, "no async runtime, cannot subscribe");
                return None;
            }
        };
        let stream = match self
            .connector
            .open(&authorization, topic, self.cancel.child_token())
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, topic, "failed to open push stream");
                return None;
            }
        };

        let handlers = HandlerList::default();
        runtime.spawn(dispatch_loop(
            topic.to_owned(),
            stream.subscribe(),
            Arc::clone(&handlers),
            stream.cancel_token().clone(),
        ));
        Some(Subscription { stream, handlers })
    }

    /// Close the stream for `topic` and drop its handlers.
    pub fn unsubscribe(&self, topic: &str) -> bool {
        match self.subscriptions.remove(topic) {
            Some((_, subscription)) => {
                subscription.stream.shutdown();
                info!(topic, "unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Detach one handler, leaving the stream open.
    ///
    /// Returns the number of handlers still attached, or `None` when the
    /// topic has no subscription. Closing an idle stream is up to the caller.
    pub fn detach_handler(&self, topic: &str, id: HandlerId) -> Option<usize> {
        let subscription = self.subscriptions.get(topic)?;
        let mut handlers = subscription.handlers.write().expect("handler lock poisoned");
        handlers.retain(|(h, _)| *h != id);
        Some(handlers.len())
    }

    pub fn has_subscription(&self, topic: &str) -> bool {
        self.subscriptions.contains_key(topic)
    }

    pub fn handler_count(&self, topic: &str) -> usize {
        self.subscriptions.get(topic).map_or(0, |s| {
            s.handlers.read().expect("handler lock poisoned").len()
        })
    }

    pub fn topics(&self) -> Vec<String> {
        self.subscriptions.iter().map(|e| e.key().clone()).collect()
    }

    /// Close every stream and forget the authorization.
    pub fn reset(&self) {
        self.close_all();
        self.authorization.store(None);
    }

    fn close_all(&self) {
        for entry in self.subscriptions.iter() {
            entry.value().stream.shutdown();
        }
        self.subscriptions.clear();
    }
}

impl Drop for EventHub {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("ready", &self.is_ready())
            .field("topics", &self.topics())
            .finish_non_exhaustive()
    }
}

/// Fan one topic's events out to its handlers until cancelled.
async fn dispatch_loop(
    topic: String,
    mut events: broadcast::Receiver<Arc<PushEvent>>,
    handlers: HandlerList,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = events.recv() => match received {
                Ok(event) => {
                    debug!(topic, reason = event.reason(), id = %event.greeting().id, "push event");
                    let current = handlers.read().expect("handler lock poisoned").clone();
                    for (_, handler) in &current {
                        handler(&event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic, skipped, "push handlers lagged, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!(topic, "dispatcher stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use greetsync_api::{Error, MemoryTokenStorage, Session};

    use super::*;

    /// Connector backed by in-process channels the test can publish on.
    #[derive(Default)]
    struct ChannelConnector {
        senders: StdMutex<HashMap<String, broadcast::Sender<Arc<PushEvent>>>>,
        opened: AtomicUsize,
        fail: bool,
    }

    impl ChannelConnector {
        fn publish(&self, topic: &str, json: &str) {
            let event: PushEvent = serde_json::from_str(json).unwrap();
            let senders = self.senders.lock().unwrap();
            senders[topic].send(Arc::new(event)).unwrap();
        }
    }

    impl HubConnector for ChannelConnector {
        fn open(
            &self,
            _authorization: &HubAuthorization,
            topic: &str,
            cancel: CancellationToken,
        ) -> Result<EventStreamHandle, Error> {
            if self.fail {
                return Err(Error::EventStream("refused".into()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = broadcast::channel(16);
            self.senders.lock().unwrap().insert(topic.to_owned(), tx);
            Ok(EventStreamHandle::from_channel(topic, rx, cancel))
        }
    }

    fn hub(connector: Arc<ChannelConnector>) -> EventHub {
        let gateway = Gateway::new(
            Url::parse("http://127.0.0.1:1").unwrap(),
            Arc::new(Session::new(MemoryTokenStorage::with_tokens("a", "r"))),
            &greetsync_api::TransportConfig::default(),
        )
        .unwrap();
        EventHub::new(gateway, connector)
    }

    fn authorize(hub: &EventHub) {
        hub.set_authorization(HubAuthorization::new(
            Url::parse("https://hub.test/.well-known/mercure").unwrap(),
            "hub-token",
        ));
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn subscribe_requires_authorization() {
        let connector = Arc::new(ChannelConnector::default());
        let hub = hub(Arc::clone(&connector));

        assert!(hub.subscribe("t", |_| {}).is_none());
        assert!(!hub.has_subscription("t"));
        assert_eq!(connector.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn connector_failure_is_swallowed() {
        let connector = Arc::new(ChannelConnector {
            fail: true,
            ..ChannelConnector::default()
        });
        let hub = hub(connector);
        authorize(&hub);

        assert!(hub.subscribe("t", |_| {}).is_none());
        assert!(hub.topics().is_empty());
    }

    #[tokio::test]
    async fn handlers_share_one_stream_and_run_in_order() {
        let connector = Arc::new(ChannelConnector::default());
        let hub = hub(Arc::clone(&connector));
        authorize(&hub);

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let first = {
            let seen = Arc::clone(&seen);
            hub.subscribe("t", move |e| seen.lock().unwrap().push(format!("a:{}", e.reason())))
        };
        let second = {
            let seen = Arc::clone(&seen);
            hub.subscribe("t", move |e| seen.lock().unwrap().push(format!("b:{}", e.reason())))
        };
        assert!(first.is_some() && second.is_some());
        assert_eq!(connector.opened.load(Ordering::SeqCst), 1);
        assert_eq!(hub.handler_count("t"), 2);

        connector.publish("t", r#"{"reason":"create","greeting":{"id":"g1"}}"#);
        connector.publish("t", r#"{"reason":"delete","greeting":{"id":"g1"}}"#);
        settle().await;

        assert_eq!(
            *seen.lock().unwrap(),
            ["a:create", "b:create", "a:delete", "b:delete"]
        );
    }

    #[tokio::test]
    async fn detach_leaves_the_stream_open() {
        let connector = Arc::new(ChannelConnector::default());
        let hub = hub(Arc::clone(&connector));
        authorize(&hub);

        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let id = hub
            .subscribe("t", move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(hub.detach_handler("t", id), Some(0));
        assert!(hub.has_subscription("t"));
        assert_eq!(hub.detach_handler("missing", id), None);

        connector.publish("t", r#"{"reason":"create","greeting":{"id":"g1"}}"#);
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsubscribe_closes_the_stream() {
        let connector = Arc::new(ChannelConnector::default());
        let hub = hub(Arc::clone(&connector));
        authorize(&hub);

        hub.subscribe("t", |_| {});
        assert!(hub.unsubscribe("t"));
        assert!(!hub.unsubscribe("t"));

        // A fresh subscribe opens a new stream.
        hub.subscribe("t", |_| {});
        assert_eq!(connector.opened.load(Ordering::SeqCst), 2);

        hub.reset();
        assert!(!hub.is_ready());
        assert!(hub.topics().is_empty());
    }

    #[tokio::test]
    async fn failed_discovery_is_not_fatal() {
        let hub = hub(Arc::new(ChannelConnector::default()));
        let ready = hub
            .discover(&Url::parse("https://hub.test/.well-known/mercure").unwrap())
            .await;
        assert!(!ready);
        assert!(!hub.is_ready());
    }
}
