// ── Core error types ──
//
// User-facing errors from greetsync-core. Consumers never see raw HTTP
// plumbing; the `From<greetsync_api::Error>` impl translates transport-layer
// failures into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Session expired -- log in again ({message})")]
    SessionExpired { message: String },

    #[error("Cannot reach backend: {reason}")]
    ConnectionFailed { reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Greeting not found: {id}")]
    GreetingNotFound { id: String },

    #[error("No pending update for greeting {id}")]
    PendingUpdateNotFound { id: String },

    #[error("Invalid greeting: {message}")]
    InvalidGreeting { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Real-time errors ─────────────────────────────────────────────
    #[error("Event hub is not authorized yet -- load greetings first")]
    HubNotReady,

    #[error("Event hub unavailable: {reason}")]
    HubUnavailable { reason: String },

    #[error("Channel authorization failed: {message}")]
    ChannelAuthorizationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if a response was received).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The backend status code behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            Self::SessionExpired { .. } => Some(401),
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<greetsync_api::Error> for CoreError {
    fn from(err: greetsync_api::Error) -> Self {
        match err {
            greetsync_api::Error::Request(e) => match e.code {
                0 => CoreError::ConnectionFailed { reason: e.message },
                401 => CoreError::SessionExpired { message: e.message },
                400 | 422 => CoreError::ValidationFailed { message: e.message },
                code => CoreError::Api {
                    message: e.message,
                    status: Some(code),
                },
            },
            greetsync_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            greetsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            greetsync_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            greetsync_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            greetsync_api::Error::MissingHubLink { resource } => CoreError::HubUnavailable {
                reason: format!("no hub link advertised by {resource}"),
            },
            greetsync_api::Error::EventStream(reason) => CoreError::HubUnavailable { reason },
            greetsync_api::Error::ChannelAuthorization(message) => {
                CoreError::ChannelAuthorizationFailed { message }
            }
        }
    }
}
