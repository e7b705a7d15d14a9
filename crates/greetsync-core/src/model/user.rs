// ── Signed-in user ──

use serde::{Deserialize, Serialize};

/// Role string carried by administrators.
pub const ADMIN_ROLE: &str = "ROLE_ADMIN";

/// One device holding a refresh token for this account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSession {
    pub id: String,
    pub device: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub role: Option<String>,
    pub devices: Vec<DeviceSession>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}
