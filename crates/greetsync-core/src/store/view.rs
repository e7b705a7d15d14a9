// ── Derived projections ──

use std::sync::Arc;

use crate::model::Greeting;

/// Most recently updated first, falling back to creation time.
///
/// Records with neither timestamp sort last. Pure: the input is untouched.
pub fn sorted_by_recency(greetings: &[Arc<Greeting>]) -> Vec<Arc<Greeting>> {
    let mut view = greetings.to_vec();
    view.sort_by(|a, b| b.recency().cmp(&a.recency()));
    view
}
