// ── Push-event dispatch policy ──
//
// How hub events feed the greeting store. The list topic mutates the
// cached list directly; a single-greeting topic only stages pending
// updates so an open edit view can decide what to do with them.

use greetsync_api::PushEvent;
use tracing::debug;

use crate::convert::pending_from_event;
use crate::model::{Greeting, GreetingId};
use crate::store::GreetingStore;
use crate::user::CurrentUser;

// ── Topics ──────────────────────────────────────────────────────────

/// Topic names under a common base (usually the API URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
}

impl Topics {
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_owned(),
        }
    }

    /// `{base}/greetings`
    pub fn list(&self) -> String {
        format!("{}/greetings", self.base)
    }

    /// `{base}/greeting/{id}`
    pub fn record(&self, id: &GreetingId) -> String {
        format!("{}/greeting/{id}", self.base)
    }

    /// List topic for `None`, record topic otherwise.
    pub fn for_target(&self, id: Option<&GreetingId>) -> String {
        id.map_or_else(|| self.list(), |id| self.record(id))
    }
}

// ── Outcome ─────────────────────────────────────────────────────────

/// What a single push event did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The cached list changed.
    Applied,
    /// A pending update was registered.
    Staged,
    /// Valid event, but nothing to do (duplicate, unknown id, ...).
    Unchanged,
    /// Ignored before looking at it: no hydrated user, or a `create` on
    /// a record topic.
    Dropped,
}

impl DispatchOutcome {
    fn from_changed(changed: bool, hit: Self) -> Self {
        if changed { hit } else { Self::Unchanged }
    }
}

// ── Policies ────────────────────────────────────────────────────────

/// List topic: create inserts, update replaces, delete removes.
///
/// Events arriving before a current user is known are dropped, not queued.
pub fn apply_list_event(
    store: &GreetingStore,
    user: &CurrentUser,
    event: &PushEvent,
) -> DispatchOutcome {
    if !user.is_hydrated() {
        debug!(reason = event.reason(), "no current user, dropping list event");
        return DispatchOutcome::Dropped;
    }

    let greeting = Greeting::from(event.greeting().clone());
    let changed = match event {
        PushEvent::Create { .. } => store.insert(greeting),
        PushEvent::Update { .. } => store.replace(greeting),
        PushEvent::Delete { .. } => store.remove(&greeting.id).is_some(),
    };
    DispatchOutcome::from_changed(changed, DispatchOutcome::Applied)
}

/// Record topic: update and delete are staged as pending, never applied.
pub fn apply_record_event(store: &GreetingStore, event: &PushEvent) -> DispatchOutcome {
    let Some(update) = pending_from_event(event) else {
        return DispatchOutcome::Dropped;
    };
    DispatchOutcome::from_changed(
        store.register_pending_update(update),
        DispatchOutcome::Staged,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use greetsync_api::{MemoryTokenStorage, Session};

    use super::*;
    use crate::model::User;

    fn event(json: &str) -> PushEvent {
        serde_json::from_str(json).unwrap()
    }

    fn hydrated_user() -> CurrentUser {
        let session = Arc::new(Session::new(MemoryTokenStorage::with_tokens("a", "r")));
        let user = CurrentUser::new(session);
        user.set(User::default());
        user
    }

    #[test]
    fn topic_names() {
        let topics = Topics::new("https://api.test/");
        assert_eq!(topics.list(), "https://api.test/greetings");
        assert_eq!(topics.record(&"g1".into()), "https://api.test/greeting/g1");
        assert_eq!(topics.for_target(None), topics.list());
    }

    #[test]
    fn list_events_mutate_the_list() {
        let store = GreetingStore::default();
        let user = hydrated_user();

        let create = event(r#"{"reason":"create","greeting":{"id":"g1","text":"hi"}}"#);
        assert_eq!(apply_list_event(&store, &user, &create), DispatchOutcome::Applied);
        assert_eq!(apply_list_event(&store, &user, &create), DispatchOutcome::Unchanged);

        let update = event(r#"{"reason":"update","greeting":{"id":"g1","text":"edited"}}"#);
        assert_eq!(apply_list_event(&store, &user, &update), DispatchOutcome::Applied);
        assert_eq!(store.get(&"g1".into()).unwrap().text, "edited");

        let delete = event(r#"{"reason":"delete","greeting":{"id":"g1"}}"#);
        assert_eq!(apply_list_event(&store, &user, &delete), DispatchOutcome::Applied);
        assert!(store.is_empty());
    }

    #[test]
    fn list_events_need_a_current_user() {
        let store = GreetingStore::default();
        let user = CurrentUser::new(Arc::new(Session::in_memory()));

        let create = event(r#"{"reason":"create","greeting":{"id":"g1"}}"#);
        assert_eq!(apply_list_event(&store, &user, &create), DispatchOutcome::Dropped);
        assert!(store.is_empty());
    }

    #[test]
    fn list_delete_prunes_pending_update() {
        let store = GreetingStore::default();
        let user = hydrated_user();
        store.insert(Greeting {
            id: "g1".into(),
            ..Greeting::default()
        });
        let update = event(r#"{"reason":"update","greeting":{"id":"g1","text":"remote"}}"#);
        assert_eq!(apply_record_event(&store, &update), DispatchOutcome::Staged);

        let delete = event(r#"{"reason":"delete","greeting":{"id":"g1"}}"#);
        apply_list_event(&store, &user, &delete);

        assert!(store.get(&"g1".into()).is_none());
        assert!(store.pending_update(&"g1".into()).is_none());
    }

    #[test]
    fn record_events_stage_instead_of_applying() {
        let store = GreetingStore::default();
        store.insert(Greeting {
            id: "g1".into(),
            text: "local".into(),
            ..Greeting::default()
        });

        let update = event(r#"{"reason":"update","greeting":{"id":"g1","text":"remote"}}"#);
        assert_eq!(apply_record_event(&store, &update), DispatchOutcome::Staged);
        assert_eq!(store.get(&"g1".into()).unwrap().text, "local");
        assert!(store.has_update(&"g1".into()));

        let delete = event(r#"{"reason":"delete","greeting":{"id":"g1"}}"#);
        assert_eq!(apply_record_event(&store, &delete), DispatchOutcome::Staged);
        assert!(store.has_deletion_update(&"g1".into()));
        assert_eq!(store.len(), 1);

        let create = event(r#"{"reason":"create","greeting":{"id":"g2"}}"#);
        assert_eq!(apply_record_event(&store, &create), DispatchOutcome::Dropped);

        let unknown = event(r#"{"reason":"update","greeting":{"id":"zz"}}"#);
        assert_eq!(apply_record_event(&store, &unknown), DispatchOutcome::Unchanged);
    }
}
