// Wire types
//
// Request and response bodies for the greetings backend. Fields use
// `#[serde(default)]` liberally: push payloads and API responses are not
// always complete (a delete event may carry nothing but the id).
// Timestamps stay as strings here; `greetsync-core` parses them.

use serde::{Deserialize, Deserializer, Serialize};

/// Identities arrive as either JSON strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Str(s)) => s,
        Some(Raw::Int(n)) => n.to_string(),
        None => String::new(),
    })
}

// ── Greetings ────────────────────────────────────────────────────────

/// A greeting as returned by `/greetings`, `/greeting/{id}` and the push hub.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeting {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub variant: Option<Variant>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub updated_by: Option<Author>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
}

/// The user who wrote, edited or deleted a greeting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct GreetingListResponse {
    #[serde(default)]
    pub greetings: Vec<Greeting>,
}

#[derive(Debug, Deserialize)]
pub struct GreetingResponse {
    pub greeting: Greeting,
}

/// Body for `POST /greetings` and `PATCH /greeting/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminGreetingRequest<'a> {
    pub greeting: &'a str,
}

// ── Push events ──────────────────────────────────────────────────────

/// One message on a hub topic.
///
/// ```json
/// {"reason": "update", "greeting": {...}, "causer": {...}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "lowercase")]
pub enum PushEvent {
    Create {
        greeting: Greeting,
        #[serde(default)]
        causer: Option<Author>,
    },
    Update {
        greeting: Greeting,
        #[serde(default)]
        causer: Option<Author>,
    },
    Delete {
        greeting: Greeting,
        #[serde(default)]
        causer: Option<Author>,
    },
}

impl PushEvent {
    pub fn greeting(&self) -> &Greeting {
        match self {
            Self::Create { greeting, .. }
            | Self::Update { greeting, .. }
            | Self::Delete { greeting, .. } => greeting,
        }
    }

    pub fn causer(&self) -> Option<&Author> {
        match self {
            Self::Create { causer, .. } | Self::Update { causer, .. } | Self::Delete { causer, .. } => {
                causer.as_ref()
            }
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

// ── Account ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// A signed-in device (one issued refresh token).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceToken {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub tokens: Vec<DeviceToken>,
    /// Catch-all for fields not modelled above.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub password: String,
    pub password_confirmation: String,
}

// ── Hub / channels ───────────────────────────────────────────────────

/// `GET /mercure-auth` response: a subscriber token for the push hub.
#[derive(Debug, Deserialize)]
pub struct HubTokenResponse {
    pub token: String,
}

/// `POST /pusher-auth` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAuthorization {
    pub auth: String,
}
