// ── Domain model ──
//
// Canonical greeting, author, user and pending-update types that the
// store, hub dispatch and consumers (CLI) depend on.

pub mod greeting;
pub mod update;
pub mod user;

pub use greeting::{Author, Greeting, GreetingDraft, GreetingId};
pub use update::{PendingUpdate, UpdateReason};
pub use user::{DeviceSession, User};
