// ── Refresh application logic ──
//
// Each fetched slice is applied independently, so a failed fetch leaves
// its slice as it was while the others move forward.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::DataStore;
use super::collection::EntityCollection;
use crate::model::{ActivityLog, Device, EnergySample, Platform};

/// Upsert all incoming entities, then prune ids not in the incoming set.
/// This avoids the brief empty state that `clear()` causes.
fn upsert_and_prune<T: Clone + Send + Sync + 'static>(
    collection: &EntityCollection<T>,
    items: Vec<(Uuid, T)>,
) {
    let incoming: HashSet<Uuid> = items.iter().map(|(id, _)| *id).collect();
    collection.upsert_many(items);
    collection.retain_ids(&incoming);
}

impl DataStore {
    pub(crate) fn apply_platforms(&self, platforms: Vec<Platform>) {
        upsert_and_prune(
            &self.platforms,
            platforms.into_iter().map(|p| (p.id, p)).collect(),
        );
    }

    pub(crate) fn apply_devices(&self, devices: Vec<Device>) {
        upsert_and_prune(
            &self.devices,
            devices.into_iter().map(|d| (d.id, d)).collect(),
        );
    }

    /// Add or replace one platform without touching the rest.
    pub(crate) fn upsert_platform(&self, platform: Platform) {
        self.platforms.upsert(platform.id, platform);
    }

    pub(crate) fn apply_activity_logs(&self, logs: Vec<ActivityLog>) {
        self.activity_logs.send_replace(Arc::new(logs));
    }

    pub(crate) fn apply_energy(&self, samples: Vec<EnergySample>) {
        self.energy.send_replace(Arc::new(samples));
    }

    pub(crate) fn clear_devices(&self) {
        self.devices.clear();
    }

    pub(crate) fn mark_refreshed(&self) {
        self.last_full_refresh.send_replace(Some(Utc::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceCategory;
    use serde_json::json;

    fn device(name: &str) -> Device {
        Device {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            platform_id: None,
            external_id: name.into(),
            name: name.into(),
            device_type: "switch".into(),
            category: DeviceCategory::Switch,
            room: None,
            status: json!({ "state": "off" }),
            capabilities: json!({}),
            last_updated: None,
            platform_name: Some("Home".into()),
        }
    }

    #[test]
    fn apply_devices_replaces_the_set() {
        let store = DataStore::new();
        let a = device("a");
        let b = device("b");
        store.apply_devices(vec![a.clone(), b]);
        assert_eq!(store.device_count(), 2);

        let c = device("c");
        store.apply_devices(vec![a.clone(), c.clone()]);
        let ids: HashSet<Uuid> = store.devices_snapshot().iter().map(|d| d.id).collect();
        assert_eq!(ids, HashSet::from([a.id, c.id]));
    }

    #[test]
    fn logs_are_replaced_wholesale() {
        let store = DataStore::new();
        let rx = store.subscribe_activity_logs();
        store.apply_activity_logs(vec![ActivityLog {
            id: Uuid::new_v4(),
            device_id: None,
            device_name: None,
            action: "platform_sync".into(),
            description: "synced".into(),
            details: json!({}),
            timestamp: None,
        }]);
        assert_eq!(rx.borrow().len(), 1);
        store.apply_activity_logs(Vec::new());
        assert!(store.activity_logs_snapshot().is_empty());
    }
}
