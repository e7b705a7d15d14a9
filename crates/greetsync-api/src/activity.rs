//! In-flight request counters.
//!
//! Two independent counters drive the global busy indicators: one for
//! reads (`GET`), one for writes/actions (everything else). Each counter
//! is floored at zero and guarded by a watchdog that zeroes it if no
//! activity is observed for [`DEFAULT_WATCHDOG`]; a leaked increment
//! cannot leave the UI spinning forever.
//!
//! Counters publish through `watch` channels so consumers can react to
//! changes instead of polling.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Stall-recovery interval for both counters.
pub const DEFAULT_WATCHDOG: Duration = Duration::from_secs(15);

/// Which counter a request contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Loading,
    Action,
}

impl ActivityKind {
    /// `GET` requests are loads; every other method is an action.
    pub fn for_method(method: &reqwest::Method) -> Self {
        if method == reqwest::Method::GET {
            Self::Loading
        } else {
            Self::Action
        }
    }
}

// ── Counter ──────────────────────────────────────────────────────────

struct CounterInner {
    name: &'static str,
    count: watch::Sender<usize>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
}

/// A non-negative counter with a stall watchdog.
#[derive(Clone)]
pub struct BusyCounter {
    inner: Arc<CounterInner>,
}

impl BusyCounter {
    pub fn new(name: &'static str, timeout: Duration) -> Self {
        let (count, _) = watch::channel(0);
        Self {
            inner: Arc::new(CounterInner {
                name,
                count,
                watchdog: Mutex::new(None),
                timeout,
            }),
        }
    }

    pub fn get(&self) -> usize {
        *self.inner.count.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.inner.count.subscribe()
    }

    pub fn increment(&self) {
        self.rearm_watchdog();
        self.inner.count.send_modify(|c| *c += 1);
    }

    /// Decrement, clamping at zero.
    pub fn decrement(&self) {
        self.rearm_watchdog();
        self.inner.count.send_modify(|c| *c = c.saturating_sub(1));
    }

    /// Force the counter back to zero.
    pub fn reset(&self) {
        self.rearm_watchdog();
        self.inner.count.send_if_modified(|c| std::mem::take(c) != 0);
    }

    /// Every counter activity restarts the stall timer.
    ///
    /// Outside a Tokio runtime there is nothing to schedule on, so the
    /// watchdog is simply not armed.
    fn rearm_watchdog(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let weak: Weak<CounterInner> = Arc::downgrade(&self.inner);
        let timeout = self.inner.timeout;
        let task = runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                let stalled = *inner.count.borrow();
                if stalled > 0 {
                    warn!(counter = inner.name, stalled, "counter stalled, forcing reset");
                    inner.count.send_replace(0);
                }
            }
        });

        let previous = self
            .inner
            .watchdog
            .lock()
            .expect("watchdog lock poisoned")
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

impl Drop for CounterInner {
    fn drop(&mut self) {
        if let Ok(slot) = self.watchdog.get_mut() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

// ── Tracker ──────────────────────────────────────────────────────────

/// Pair of busy counters plus the background-endpoint denylist.
#[derive(Clone)]
pub struct ActivityTracker {
    loading: BusyCounter,
    action: BusyCounter,
    quiet_endpoints: Arc<[String]>,
}

impl ActivityTracker {
    /// `quiet_endpoints` are request paths excluded from counting
    /// (token refresh, hub housekeeping) so silent background traffic
    /// never shows up as "busy".
    pub fn new(watchdog: Duration, quiet_endpoints: Vec<String>) -> Self {
        Self {
            loading: BusyCounter::new("loading", watchdog),
            action: BusyCounter::new("action", watchdog),
            quiet_endpoints: quiet_endpoints.into(),
        }
    }

    pub fn loading(&self) -> &BusyCounter {
        &self.loading
    }

    pub fn action(&self) -> &BusyCounter {
        &self.action
    }

    pub fn is_busy(&self) -> bool {
        self.loading.get() + self.action.get() > 0
    }

    pub fn is_loading(&self) -> bool {
        self.loading.get() > 0
    }

    pub fn is_action_in_progress(&self) -> bool {
        self.action.get() > 0
    }

    pub fn is_quiet(&self, path: &str) -> bool {
        self.quiet_endpoints.iter().any(|p| p == path)
    }

    /// Count a request for its whole lifetime.
    ///
    /// Returns `None` for quiet endpoints. The returned guard decrements
    /// on drop, so success, failure and early return all settle the count.
    pub fn begin(&self, kind: ActivityKind, path: &str) -> Option<ActivityGuard> {
        if self.is_quiet(path) {
            trace!(path, "quiet endpoint, not counted");
            return None;
        }
        let counter = match kind {
            ActivityKind::Loading => self.loading.clone(),
            ActivityKind::Action => self.action.clone(),
        };
        counter.increment();
        Some(ActivityGuard { counter })
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        let quiet = crate::DEFAULT_QUIET_ENDPOINTS
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        Self::new(DEFAULT_WATCHDOG, quiet)
    }
}

/// Decrements its counter when dropped.
#[must_use = "the request is only counted while the guard is alive"]
pub struct ActivityGuard {
    counter: BusyCounter,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.counter.decrement();
    }
}
