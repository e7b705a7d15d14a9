// ── Pending remote updates ──
//
// A change pushed for a greeting that is open in an edit view. It is
// staged here instead of being applied so the view can accept or discard it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::greeting::{Author, Greeting};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UpdateReason {
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingUpdate {
    pub greeting: Arc<Greeting>,
    pub reason: UpdateReason,
    /// Who made the change, when the hub says so.
    pub causer: Option<Author>,
}

impl PendingUpdate {
    pub fn new(greeting: Greeting, reason: UpdateReason, causer: Option<Author>) -> Self {
        Self {
            greeting: Arc::new(greeting),
            reason,
            causer,
        }
    }
}
