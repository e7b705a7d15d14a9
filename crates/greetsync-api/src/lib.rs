// greetsync-api: async client for the greetings backend
//
// Session tokens, request gateway with single-flight refresh, busy
// counters, validation errors, and the push-hub event stream.

pub mod activity;
pub mod auth;
pub mod endpoints;
pub mod error;
pub mod gateway;
pub mod link;
pub mod models;
pub mod refresh;
pub mod sse;
pub mod transport;
pub mod validation;

pub use activity::{ActivityGuard, ActivityKind, ActivityTracker, BusyCounter};
pub use auth::{MemoryTokenStorage, Session, StorageError, TokenPair, TokenStorage};
pub use endpoints::Discovered;
pub use error::{Error, RequestError};
pub use gateway::{ApiResponse, Gateway, RequestBody, RequestDescriptor};
pub use models::PushEvent;
pub use refresh::{RefreshCoordinator, TokenResponse};
pub use sse::{EventStreamHandle, ReconnectConfig};
pub use transport::{TlsMode, TransportConfig};
pub use validation::{ValidationError, ValidationRegistry};

/// Credential exchange; never refreshed on 401.
pub const LOGIN_PATH: &str = "/login_check";

/// Token refresh; never refreshed on 401, never counted as busy.
pub const REFRESH_PATH: &str = "/token/refresh";

/// Push-hub subscriber token.
pub const HUB_AUTH_PATH: &str = "/mercure-auth";

/// Background endpoints excluded from the busy counters.
pub const DEFAULT_QUIET_ENDPOINTS: &[&str] = &[REFRESH_PATH, HUB_AUTH_PATH, "/.well-known/mercure"];
