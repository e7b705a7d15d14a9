// greetsync-core: Reactive greeting cache, push-hub subscriptions and the
// client facade between greetsync-api and consumers (CLI).

pub mod client;
pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod model;
pub mod store;
pub mod stream;
pub mod user;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::GreetingClient;
pub use config::{ClientConfig, DEFAULT_LIST_LIMIT, TlsVerification};
pub use dispatch::{DispatchOutcome, Topics};
pub use error::CoreError;
pub use hub::{EventHub, HandlerId, HubAuthorization, HubConnector, SseConnector};
pub use store::{GreetingStore, StoreSnapshot};
pub use stream::{StoreStream, StoreWatchStream};
pub use user::CurrentUser;

pub use model::{
    Author, DeviceSession, Greeting, GreetingDraft, GreetingId, PendingUpdate, UpdateReason, User,
};

// Request bodies and push events consumers pass straight through.
pub use greetsync_api::models::{ChannelAuthorization, PasswordChange, ProfileUpdate};
pub use greetsync_api::{PushEvent, TokenStorage};
