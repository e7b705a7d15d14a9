// ── Runtime client configuration ──
//
// Describes *how* to talk to the greetings backend: endpoint, TLS,
// timeouts, busy-counter tuning and push-stream reconnection. Never
// touches disk; the CLI builds a `ClientConfig` and hands it in.

use std::time::Duration;

use greetsync_api::activity::DEFAULT_WATCHDOG;
use greetsync_api::transport::{TlsMode, TransportConfig};
use greetsync_api::{DEFAULT_QUIET_ENDPOINTS, ReconnectConfig};
use url::Url;

/// Default page size for greeting lists, also the local cache capacity.
pub const DEFAULT_LIST_LIMIT: u32 = 10;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (local development backends).
    DangerAcceptInvalid,
}

/// Configuration for one backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, e.g. `https://api.example.com`.
    pub api_url: Url,
    /// Prefix for push topics (`{topic_base}/greetings`,
    /// `{topic_base}/greeting/{id}`). Defaults to the API URL.
    pub topic_base: Option<String>,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Stall-recovery interval of the busy counters.
    pub busy_watchdog: Duration,
    /// Page size for greeting lists.
    pub list_limit: u32,
    /// Request paths excluded from the busy counters.
    pub quiet_endpoints: Vec<String>,
    /// Push-stream reconnection backoff.
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            topic_base: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            busy_watchdog: DEFAULT_WATCHDOG,
            list_limit: DEFAULT_LIST_LIMIT,
            quiet_endpoints: DEFAULT_QUIET_ENDPOINTS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Topic prefix without a trailing slash.
    pub fn topic_base(&self) -> String {
        self.topic_base
            .as_deref()
            .unwrap_or_else(|| self.api_url.as_str())
            .trim_end_matches('/')
            .to_owned()
    }

    /// Local cache capacity, one page of the list.
    pub(crate) fn store_capacity(&self) -> usize {
        usize::try_from(self.list_limit).unwrap_or(usize::MAX)
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn topic_base_defaults_to_api_url() {
        let config = ClientConfig::new(Url::parse("https://api.test/").unwrap());
        assert_eq!(config.topic_base(), "https://api.test");

        let custom = ClientConfig {
            topic_base: Some("https://symfony.test/".into()),
            ..config
        };
        assert_eq!(custom.topic_base(), "https://symfony.test");
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::new(Url::parse("http://localhost:8000").unwrap());
        assert_eq!(config.list_limit, 10);
        assert_eq!(config.busy_watchdog, Duration::from_secs(15));
        assert!(config.quiet_endpoints.iter().any(|p| p == "/token/refresh"));
    }
}
