// ── Generic reactive entity collection ──
//
// Concurrent storage keyed by row id with push-based change
// notification via `watch` channels.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use uuid::Uuid;

/// A reactive collection for one entity type.
///
/// `DashMap` holds the entities; every mutation rebuilds the snapshot
/// that subscribers receive. Snapshots are ordered by `order_key` so
/// consumers see a stable listing.
pub(crate) struct EntityCollection<T: Clone + Send + Sync + 'static> {
    by_id: DashMap<Uuid, Arc<T>>,

    /// Full snapshot, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,

    order_key: fn(&T) -> String,
}

impl<T: Clone + Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new(order_key: fn(&T) -> String) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_id: DashMap::new(),
            snapshot,
            order_key,
        }
    }

    /// Insert or replace an entity. Returns `true` if the id was new.
    pub(crate) fn upsert(&self, id: Uuid, entity: T) -> bool {
        let is_new = self.by_id.insert(id, Arc::new(entity)).is_none();
        self.publish();
        is_new
    }

    /// Upsert many entities with a single snapshot rebuild.
    pub(crate) fn upsert_many(&self, items: impl IntoIterator<Item = (Uuid, T)>) {
        for (id, entity) in items {
            self.by_id.insert(id, Arc::new(entity));
        }
        self.publish();
    }

    /// Mutate an existing entity in place. Returns `false` if absent or if
    /// `f` declined the change by returning `false`.
    pub(crate) fn modify(&self, id: &Uuid, f: impl FnOnce(&mut T) -> bool) -> bool {
        let changed = match self.by_id.get_mut(id) {
            Some(mut entry) => {
                let mut next = T::clone(entry.value());
                if f(&mut next) {
                    *entry.value_mut() = Arc::new(next);
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        if changed {
            self.publish();
        }
        changed
    }

    /// Remove every entity whose id is not in `keep`.
    pub(crate) fn retain_ids(&self, keep: &std::collections::HashSet<Uuid>) {
        let before = self.by_id.len();
        self.by_id.retain(|id, _| keep.contains(id));
        if self.by_id.len() != before {
            self.publish();
        }
    }

    pub(crate) fn get(&self, id: &Uuid) -> Option<Arc<T>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, id: &Uuid) -> bool {
        self.by_id.contains_key(id)
    }

    /// Current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn clear(&self) {
        self.by_id.clear();
        self.publish();
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn publish(&self) {
        let order_key = self.order_key;
        let mut values: Vec<Arc<T>> = self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by_cached_key(|v| order_key(v));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
