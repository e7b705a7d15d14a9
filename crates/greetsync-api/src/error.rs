use thiserror::Error;

/// The normalized shape every failed gateway call is reduced to.
///
/// Either reconstructed from an HTTP response (status code + reason or
/// server-supplied message) or passed through unchanged when a lower layer
/// already produced one. `Clone` so a single refresh outcome can be handed
/// to every request waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("request failed ({code}): {message}")]
pub struct RequestError {
    /// HTTP status code, or `0` when no response was received.
    pub code: u16,
    pub message: String,
}

impl RequestError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Build from a bare status, using the canonical reason phrase.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        Self::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown Status"),
        )
    }

    pub fn is_unauthorized(&self) -> bool {
        self.code == 401
    }

    pub fn is_not_found(&self) -> bool {
        self.code == 404
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::from_status(status),
            None => Self::new(0, err.to_string()),
        }
    }
}

/// Top-level error type for the `greetsync-api` crate.
///
/// `greetsync-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Requests ────────────────────────────────────────────────────
    /// A gateway call failed; already normalized to `{code, message}`.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Login rejected (wrong credentials, locked account, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Real-time ───────────────────────────────────────────────────
    /// The response carried no `Link: <...>; rel=mercure` header.
    #[error("No event hub link advertised by {resource}")]
    MissingHubLink { resource: String },

    /// The push-event stream could not be opened or broke.
    #[error("Event stream error: {0}")]
    EventStream(String),

    /// Third-party channel authorization was refused.
    #[error("Channel authorization failed: {0}")]
    ChannelAuthorization(String),
}

impl Error {
    /// Returns `true` if the server rejected the credentials.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Request(e) => e.is_unauthorized(),
            Self::Authentication { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_not_found())
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.code == 0 || e.code == 502 || e.code == 503 || e.code == 504,
            Self::EventStream(_) => true,
            _ => false,
        }
    }

    /// HTTP status code, if the failure came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Request(e) if e.code != 0 => Some(e.code),
            _ => None,
        }
    }
}
