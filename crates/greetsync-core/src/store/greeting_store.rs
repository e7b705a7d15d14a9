// ── GreetingStore ──
//
// Bounded greeting list and pending updates held in one `watch` snapshot.
// Every mutation runs inside a single `send_if_modified` closure, so the
// size cap and orphan pruning are applied before any reader can observe
// the new state.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::config::DEFAULT_LIST_LIMIT;
use crate::error::CoreError;
use crate::model::{Greeting, GreetingDraft, GreetingId, PendingUpdate, UpdateReason};
use crate::stream::StoreStream;

use super::view::sorted_by_recency;

/// Immutable view of the store at one instant.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    greetings: Arc<Vec<Arc<Greeting>>>,
    pending: Arc<Vec<Arc<PendingUpdate>>>,
}

impl StoreSnapshot {
    /// Greetings in list order (most recently inserted first).
    pub fn greetings(&self) -> &Arc<Vec<Arc<Greeting>>> {
        &self.greetings
    }

    pub fn pending(&self) -> &Arc<Vec<Arc<PendingUpdate>>> {
        &self.pending
    }

    pub fn sorted_view(&self) -> Vec<Arc<Greeting>> {
        sorted_by_recency(&self.greetings)
    }

    pub fn get(&self, id: &GreetingId) -> Option<Arc<Greeting>> {
        self.greetings.iter().find(|g| &g.id == id).cloned()
    }

    pub fn pending_update(&self, id: &GreetingId) -> Option<Arc<PendingUpdate>> {
        self.pending.iter().find(|p| &p.greeting.id == id).cloned()
    }

    fn contains(&self, id: &GreetingId) -> bool {
        self.greetings.iter().any(|g| &g.id == id)
    }

    /// Drop pending updates whose greeting is gone. Returns how many.
    fn prune(&mut self) -> usize {
        let live: HashSet<&GreetingId> = self.greetings.iter().map(|g| &g.id).collect();
        let orphaned = self
            .pending
            .iter()
            .filter(|p| !live.contains(&p.greeting.id))
            .count();
        if orphaned > 0 {
            Arc::make_mut(&mut self.pending).retain(|p| live.contains(&p.greeting.id));
        }
        orphaned
    }
}

/// The local greeting cache.
///
/// Cheap reads via [`snapshot`](Self::snapshot); reactive reads via
/// [`subscribe`](Self::subscribe).
pub struct GreetingStore {
    state: watch::Sender<StoreSnapshot>,
    capacity: usize,
}

impl GreetingStore {
    pub fn new(capacity: usize) -> Self {
        let (state, _) = watch::channel(StoreSnapshot::default());
        Self { state, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> StoreStream {
        StoreStream::new(self.state.subscribe())
    }

    pub fn greetings(&self) -> Arc<Vec<Arc<Greeting>>> {
        Arc::clone(&self.state.borrow().greetings)
    }

    pub fn sorted_view(&self) -> Vec<Arc<Greeting>> {
        self.state.borrow().sorted_view()
    }

    pub fn get(&self, id: &GreetingId) -> Option<Arc<Greeting>> {
        self.state.borrow().get(id)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().greetings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_updates(&self) -> Arc<Vec<Arc<PendingUpdate>>> {
        Arc::clone(&self.state.borrow().pending)
    }

    pub fn pending_update(&self, id: &GreetingId) -> Option<Arc<PendingUpdate>> {
        self.state.borrow().pending_update(id)
    }

    /// A staged `update` exists for `id`.
    pub fn has_update(&self, id: &GreetingId) -> bool {
        self.pending_reason(id) == Some(UpdateReason::Update)
    }

    /// A staged `delete` exists for `id`.
    pub fn has_deletion_update(&self, id: &GreetingId) -> bool {
        self.pending_reason(id) == Some(UpdateReason::Delete)
    }

    fn pending_reason(&self, id: &GreetingId) -> Option<UpdateReason> {
        self.state.borrow().pending_update(id).map(|p| p.reason)
    }

    // ── List mutations ───────────────────────────────────────────────

    /// Authoritative bulk replace after a full fetch.
    ///
    /// Records without an id are skipped, later duplicates are dropped and
    /// the result is capped at the store capacity.
    pub fn replace_all(&self, greetings: impl IntoIterator<Item = Greeting>) {
        let mut seen = HashSet::new();
        let list: Vec<Arc<Greeting>> = greetings
            .into_iter()
            .filter(|g| g.is_valid() && seen.insert(g.id.clone()))
            .take(self.capacity)
            .map(Arc::new)
            .collect();

        self.state.send_modify(|snap| {
            snap.greetings = Arc::new(list);
            let pruned = snap.prune();
            debug!(count = snap.greetings.len(), pruned, "greeting list replaced");
        });
    }

    /// Insert at the head. No-op for invalid or already-cached ids.
    pub fn insert(&self, greeting: Greeting) -> bool {
        if !greeting.is_valid() {
            debug!("ignoring greeting without an id");
            return false;
        }
        let capacity = self.capacity;
        self.state.send_if_modified(|snap| {
            if snap.contains(&greeting.id) {
                debug!(id = %greeting.id, "greeting already cached");
                return false;
            }
            let list = Arc::make_mut(&mut snap.greetings);
            list.insert(0, Arc::new(greeting));
            list.truncate(capacity);
            snap.prune();
            true
        })
    }

    /// Replace in place, keeping list position. No-op if absent.
    pub fn replace(&self, greeting: Greeting) -> bool {
        self.state.send_if_modified(|snap| {
            let Some(pos) = snap.greetings.iter().position(|g| g.id == greeting.id) else {
                return false;
            };
            Arc::make_mut(&mut snap.greetings)[pos] = Arc::new(greeting);
            snap.prune();
            true
        })
    }

    /// Remove by id, returning the removed record.
    pub fn remove(&self, id: &GreetingId) -> Option<Arc<Greeting>> {
        let mut removed = None;
        self.state.send_if_modified(|snap| {
            let Some(pos) = snap.greetings.iter().position(|g| &g.id == id) else {
                return false;
            };
            removed = Some(Arc::make_mut(&mut snap.greetings).remove(pos));
            let pruned = snap.prune();
            debug!(%id, pruned, "greeting removed");
            true
        });
        removed
    }

    pub fn clear(&self) {
        self.state.send_if_modified(|snap| {
            if snap.greetings.is_empty() && snap.pending.is_empty() {
                return false;
            }
            *snap = StoreSnapshot::default();
            true
        });
    }

    // ── Pending updates ──────────────────────────────────────────────

    /// Stage a remote update, replacing any earlier one for the same id.
    ///
    /// Dropped when the greeting is not cached: it would be an orphan.
    pub fn register_pending_update(&self, update: PendingUpdate) -> bool {
        self.state.send_if_modified(|snap| {
            let id = &update.greeting.id;
            if !snap.contains(id) {
                debug!(%id, reason = %update.reason, "dropping update for uncached greeting");
                return false;
            }
            let pending = Arc::make_mut(&mut snap.pending);
            match pending.iter().position(|p| &p.greeting.id == id) {
                Some(pos) => pending[pos] = Arc::new(update),
                None => pending.push(Arc::new(update)),
            }
            true
        })
    }

    /// Take the staged update for `id` as an editable draft.
    pub fn consume_pending_update(&self, id: &GreetingId) -> Result<GreetingDraft, CoreError> {
        let mut taken = None;
        self.state.send_if_modified(|snap| {
            let Some(pos) = snap.pending.iter().position(|p| &p.greeting.id == id) else {
                return false;
            };
            taken = Some(Arc::make_mut(&mut snap.pending).remove(pos));
            true
        });
        taken
            .map(|p| GreetingDraft::from(p.greeting.as_ref()))
            .ok_or_else(|| CoreError::PendingUpdateNotFound { id: id.to_string() })
    }

    /// Drop the staged update for `id` without applying it.
    pub fn discard_pending_update(&self, id: &GreetingId) -> bool {
        self.state.send_if_modified(|snap| {
            let before = snap.pending.len();
            Arc::make_mut(&mut snap.pending).retain(|p| &p.greeting.id != id);
            snap.pending.len() != before
        })
    }

    /// Remove pending updates for greetings no longer cached.
    ///
    /// Mutations already do this; exposed for callers that want to be
    /// explicit. Returns the number removed.
    pub fn prune_orphans(&self) -> usize {
        let mut pruned = 0;
        self.state.send_if_modified(|snap| {
            pruned = snap.prune();
            pruned > 0
        });
        pruned
    }
}

impl Default for GreetingStore {
    fn default() -> Self {
        Self::new(usize::try_from(DEFAULT_LIST_LIMIT).unwrap_or(usize::MAX))
    }
}

impl std::fmt::Debug for GreetingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.state.borrow();
        f.debug_struct("GreetingStore")
            .field("capacity", &self.capacity)
            .field("greetings", &snap.greetings.len())
            .field("pending", &snap.pending.len())
            .finish()
    }
}
