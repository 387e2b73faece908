// ── Reactive data store ──
//
// Concurrent entity storage with push-based change notification.

mod collection;
mod data_store;
mod reconcile;
mod refresh;

pub use data_store::DataStore;
pub use reconcile::MergeOutcome;
