//! Push-hub event stream with auto-reconnect.
//!
//! Subscribes to one topic on a Mercure hub over Server-Sent Events and
//! streams parsed [`PushEvent`]s through a [`tokio::sync::broadcast`]
//! channel. Reconnects with exponential backoff + jitter, resuming from the
//! last seen event id, until shut down.
//!
//! # Example
//!
//! ```rust,ignore
//! use greetsync_api::sse::{EventStreamHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let handle = EventStreamHandle::connect(
//!     http,
//!     &hub_url,
//!     "https://greetings.test/greetings",
//!     hub_token,
//!     ReconnectConfig::default(),
//!     CancellationToken::new(),
//! )?;
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{} {}", event.reason(), event.greeting().id);
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::models::PushEvent;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 256;

const LAST_EVENT_ID: &str = "Last-Event-ID";

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for stream reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// `{hub}?topic=<encoded topic>`
pub fn subscription_url(hub_url: &Url, topic: &str) -> Url {
    let mut url = hub_url.clone();
    url.query_pairs_mut().append_pair("topic", topic);
    url
}

// ── EventStreamHandle ────────────────────────────────────────────────

/// Handle to a running topic subscription.
///
/// Dropping the handle does not stop the background task; call
/// [`shutdown`](Self::shutdown) (or cancel the token passed in).
pub struct EventStreamHandle {
    topic: String,
    event_rx: broadcast::Receiver<Arc<PushEvent>>,
    cancel: CancellationToken,
}

impl EventStreamHandle {
    /// Spawn the subscription loop for `topic`.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. Fails only when there is no Tokio runtime to spawn on.
    pub fn connect(
        http: reqwest::Client,
        hub_url: &Url,
        topic: &str,
        token: SecretString,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::EventStream(format!("no async runtime: {e}")))?;

        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let url = subscription_url(hub_url, topic);
        let task_cancel = cancel.clone();
        runtime.spawn(async move {
            sse_loop(http, url, token, event_tx, reconnect, task_cancel).await;
        });

        Ok(Self {
            topic: topic.to_owned(),
            event_rx,
            cancel,
        })
    }

    /// Wrap an existing event channel, e.g. one fed by a test harness.
    pub fn from_channel(
        topic: impl Into<String>,
        event_rx: broadcast::Receiver<Arc<PushEvent>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            topic: topic.into(),
            event_rx,
            cancel,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Get a new broadcast receiver for the event stream.
    ///
    /// If a consumer falls behind it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PushEvent>> {
        self.event_rx.resubscribe()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for EventStreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStreamHandle")
            .field("topic", &self.topic)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn sse_loop(
    http: reqwest::Client,
    url: Url,
    token: SecretString,
    event_tx: broadcast::Sender<Arc<PushEvent>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    let mut last_event_id: Option<String> = None;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&http, &url, &token, &event_tx, &mut last_event_id) => result,
        };

        let delay = match result {
            // Hub closed the response body. Reset the backoff and come back
            // after the initial delay.
            Ok(()) => {
                tracing::info!(url = %url, "event stream ended, reconnecting");
                attempt = 0;
                reconnect.initial_delay
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "event stream error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(max_retries = max, "event stream retry limit reached, giving up");
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &reconnect);
                attempt = attempt.saturating_add(1);
                delay
            }
        };

        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    tracing::debug!(url = %url, "event stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Open one SSE response and read it until it ends or fails.
async fn connect_and_read(
    http: &reqwest::Client,
    url: &Url,
    token: &SecretString,
    event_tx: &broadcast::Sender<Arc<PushEvent>>,
    last_event_id: &mut Option<String>,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to event hub");

    let mut request = http
        .get(url.clone())
        .bearer_auth(token.expose_secret())
        .header(ACCEPT, HeaderValue::from_static("text/event-stream"));
    if let Some(id) = last_event_id.as_deref() {
        request = request.header(LAST_EVENT_ID, id);
    }

    let response = request
        .send()
        .await
        .map_err(|e| Error::EventStream(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::EventStream(format!("hub responded with {status}")));
    }

    tracing::info!("event hub connected");

    let mut decoder = SseDecoder::default();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| Error::EventStream(e.to_string()))?;
        for message in decoder.push(&chunk) {
            if let Some(id) = &message.id {
                *last_event_id = Some(id.clone());
            }
            parse_and_broadcast(&message, event_tx);
        }
    }

    Ok(())
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse an SSE message body and broadcast the push event it carries.
///
/// Malformed payloads are logged and dropped.
fn parse_and_broadcast(message: &SseMessage, event_tx: &broadcast::Sender<Arc<PushEvent>>) {
    match serde_json::from_str::<PushEvent>(&message.data) {
        Ok(event) => {
            tracing::debug!(reason = event.reason(), id = %event.greeting().id, "push event");
            // No receivers just means nobody is listening right now.
            let _ = event_tx.send(Arc::new(event));
        }
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed push event");
        }
    }
}

/// One dispatched Server-Sent Event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; bytes are
/// buffered until a full line is available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: String,
    event: Option<String>,
    id: Option<String>,
}

impl SseDecoder {
    /// Feed a chunk, returning every message it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(message) = self.process_line(line) {
                out.push(message);
            }
        }

        out
    }

    fn process_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "event" => self.event = Some(value.to_owned()),
            "id" if !value.contains('\0') => self.id = Some(value.to_owned()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }
        Some(SseMessage {
            event,
            id: self.id.clone(),
            data,
        })
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`, jitter within ±25%.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);
        assert!(d1 > d0, "d1 ({d1:?}) should exceed d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should exceed d1 ({d1:?})");

        let d10 = calculate_backoff(10, &config);
        assert!(d10 <= Duration::from_millis(12_500), "{d10:?} not capped");
    }

    #[test]
    fn subscription_url_encodes_topic() {
        let hub = Url::parse("https://hub.test/.well-known/mercure").unwrap();
        let url = subscription_url(&hub, "https://greetings.test/greeting/42");
        assert_eq!(
            url.as_str(),
            "https://hub.test/.well-known/mercure?topic=https%3A%2F%2Fgreetings.test%2Fgreeting%2F42"
        );
    }

    #[test]
    fn decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"id: urn:1\nda").is_empty());
        assert!(decoder.push(b"ta: {\"a\":").is_empty());
        let messages = decoder.push(b"1}\r\n\r\n");
        assert_eq!(
            messages,
            vec![SseMessage {
                event: None,
                id: Some("urn:1".into()),
                data: "{\"a\":1}".into(),
            }]
        );
    }

    #[test]
    fn decoder_joins_multiline_data_and_skips_comments() {
        let mut decoder = SseDecoder::default();
        let messages = decoder.push(b": keepalive\n\nevent: update\ndata: line1\ndata: line2\n\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].event.as_deref(), Some("update"));
        assert_eq!(messages[0].data, "line1\nline2");
    }

    #[test]
    fn decoder_keeps_utf8_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        let text = "data: héllo\n\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xC3).map_or(0, |p| p + 1);
        assert!(decoder.push(&text[..split]).is_empty());
        let messages = decoder.push(&text[split..]);
        assert_eq!(messages[0].data, "héllo");
    }

    #[tokio::test]
    async fn malformed_payloads_are_dropped() {
        let (tx, mut rx) = broadcast::channel(4);
        let bad = SseMessage {
            event: None,
            id: None,
            data: "{\"reason\":\"explode\"}".into(),
        };
        let good = SseMessage {
            event: None,
            id: None,
            data: r#"{"reason":"update","greeting":{"id":"g1","text":"hey"}}"#.into(),
        };
        parse_and_broadcast(&bad, &tx);
        parse_and_broadcast(&good, &tx);

        let event = rx.recv().await.map(|e| e.greeting().id.clone());
        assert_eq!(event.ok().as_deref(), Some("g1"));
        assert!(rx.try_recv().is_err());
    }
}
