// ── Local greeting cache ──
//
// The bounded, most-recent-first greeting list plus the side list of
// pending remote updates. Everything outside this module reads immutable
// snapshots; mutation goes through `GreetingStore` only.

mod greeting_store;
mod view;

pub use greeting_store::{GreetingStore, StoreSnapshot};
pub use view::sorted_by_recency;
