// ── API-to-domain type conversions ──
//
// Bridges raw `greetsync_api::models` wire types into canonical
// `greetsync_core::model` domain types. Timestamps are parsed here;
// unparseable values are dropped rather than failing the whole record.

use chrono::{DateTime, Utc};

use greetsync_api::models as wire;

use crate::model::{
    Author, DeviceSession, Greeting, GreetingDraft, GreetingId, PendingUpdate, UpdateReason, User,
};

// ── Helpers ────────────────────────────────────────────────────────

/// Parse an ISO-8601 datetime string (as returned by the greeting endpoints).
fn parse_datetime(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.is_empty())
}

// ── Greeting ───────────────────────────────────────────────────────

impl From<wire::Author> for Author {
    fn from(a: wire::Author) -> Self {
        Self {
            id: a.id,
            first_name: a.first_name,
            last_name: a.last_name,
            display_name: a.display_name,
        }
    }
}

impl From<wire::Greeting> for Greeting {
    fn from(g: wire::Greeting) -> Self {
        Self {
            created_at: parse_datetime(g.created_at.as_deref()),
            updated_at: parse_datetime(g.updated_at.as_deref()),
            id: GreetingId::from(g.id),
            text: g.text,
            variant: non_empty(g.variant.map(|v| v.name)),
            author: g.author.map(Author::from),
            updated_by: g.updated_by.map(Author::from),
        }
    }
}

/// Draft → request body. The id is only sent when it is set.
impl From<&GreetingDraft> for wire::GreetingPayload {
    fn from(d: &GreetingDraft) -> Self {
        Self {
            id: d.id.is_valid().then(|| d.id.to_string()),
            text: Some(d.text.clone()),
            variant: d.variant.clone(),
        }
    }
}

// ── Push events ────────────────────────────────────────────────────

/// Split a push event into its greeting and a staging reason.
///
/// `create` has no pending form: a record can't be edited before it exists.
pub(crate) fn pending_from_event(event: &wire::PushEvent) -> Option<PendingUpdate> {
    let reason = match event {
        wire::PushEvent::Create { .. } => return None,
        wire::PushEvent::Update { .. } => UpdateReason::Update,
        wire::PushEvent::Delete { .. } => UpdateReason::Delete,
    };
    Some(PendingUpdate::new(
        Greeting::from(event.greeting().clone()),
        reason,
        event.causer().cloned().map(Author::from),
    ))
}

// ── User ───────────────────────────────────────────────────────────

impl From<wire::DeviceToken> for DeviceSession {
    fn from(t: wire::DeviceToken) -> Self {
        Self {
            id: t.id,
            device: non_empty(t.device),
            created_at: t.created_at,
        }
    }
}

impl From<wire::User> for User {
    fn from(u: wire::User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            display_name: u.display_name,
            role: non_empty(u.role),
            devices: u.tokens.into_iter().map(DeviceSession::from).collect(),
        }
    }
}
