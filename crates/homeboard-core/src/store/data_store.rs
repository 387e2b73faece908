// ── Central reactive data store ──
//
// The hub's mirror of backend rows. Platforms and devices live in
// keyed collections; logs and energy samples are bounded recent windows
// replaced wholesale on each fetch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use super::collection::EntityCollection;
use crate::model::{ActivityLog, Device, EnergySample, Platform};
use crate::stream::EntityStream;

fn platform_order(p: &Platform) -> String {
    format!("{}\u{0}{}", p.name.to_lowercase(), p.id)
}

fn device_order(d: &Device) -> String {
    format!(
        "{}\u{0}{}\u{0}{}",
        d.room.as_deref().unwrap_or("\u{10FFFF}").to_lowercase(),
        d.name.to_lowercase(),
        d.id
    )
}

/// Reactive mirror of the signed-in user's rows.
pub struct DataStore {
    pub(crate) platforms: EntityCollection<Platform>,
    pub(crate) devices: EntityCollection<Device>,
    pub(crate) activity_logs: watch::Sender<Arc<Vec<ActivityLog>>>,
    pub(crate) energy: watch::Sender<Arc<Vec<EnergySample>>>,
    pub(crate) last_full_refresh: watch::Sender<Option<DateTime<Utc>>>,
    pub(crate) last_realtime_event: watch::Sender<Option<DateTime<Utc>>>,
}

impl DataStore {
    pub fn new() -> Self {
        let (activity_logs, _) = watch::channel(Arc::new(Vec::new()));
        let (energy, _) = watch::channel(Arc::new(Vec::new()));
        let (last_full_refresh, _) = watch::channel(None);
        let (last_realtime_event, _) = watch::channel(None);

        Self {
            platforms: EntityCollection::new(platform_order),
            devices: EntityCollection::new(device_order),
            activity_logs,
            energy,
            last_full_refresh,
            last_realtime_event,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn platforms_snapshot(&self) -> Arc<Vec<Arc<Platform>>> {
        self.platforms.snapshot()
    }

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.devices.snapshot()
    }

    pub fn activity_logs_snapshot(&self) -> Arc<Vec<ActivityLog>> {
        self.activity_logs.borrow().clone()
    }

    pub fn energy_snapshot(&self) -> Arc<Vec<EnergySample>> {
        self.energy.borrow().clone()
    }

    // ── Single-entity lookups ────────────────────────────────────────

    pub fn device_by_id(&self, id: &Uuid) -> Option<Arc<Device>> {
        self.devices.get(id)
    }

    pub fn platform_by_id(&self, id: &Uuid) -> Option<Arc<Platform>> {
        self.platforms.get(id)
    }

    /// Every platform row with this display name, newest first.
    pub fn platforms_named(&self, name: &str) -> Vec<Arc<Platform>> {
        let mut rows: Vec<_> = self
            .platforms
            .snapshot()
            .iter()
            .filter(|p| p.name == name)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    /// Resolve a device by UUID, vendor id, or case-insensitive name.
    pub fn find_device(&self, identifier: &str) -> Option<Arc<Device>> {
        if let Ok(id) = identifier.parse::<Uuid>() {
            return self.devices.get(&id);
        }
        let snap = self.devices.snapshot();
        snap.iter()
            .find(|d| d.external_id == identifier)
            .or_else(|| snap.iter().find(|d| d.name.eq_ignore_ascii_case(identifier)))
            .cloned()
    }

    // ── Count accessors ──────────────────────────────────────────────

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn platform_count(&self) -> usize {
        self.platforms.len()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_platforms(&self) -> EntityStream<Platform> {
        EntityStream::new(self.platforms.subscribe())
    }

    pub fn subscribe_devices(&self) -> EntityStream<Device> {
        EntityStream::new(self.devices.subscribe())
    }

    pub fn subscribe_activity_logs(&self) -> watch::Receiver<Arc<Vec<ActivityLog>>> {
        self.activity_logs.subscribe()
    }

    pub fn subscribe_energy(&self) -> watch::Receiver<Arc<Vec<EnergySample>>> {
        self.energy.subscribe()
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_full_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_full_refresh.borrow()
    }

    pub fn last_realtime_event(&self) -> Option<DateTime<Utc>> {
        *self.last_realtime_event.borrow()
    }

    /// Drop every mirrored row.
    pub(crate) fn clear(&self) {
        self.platforms.clear();
        self.devices.clear();
        self.activity_logs.send_replace(Arc::new(Vec::new()));
        self.energy.send_replace(Arc::new(Vec::new()));
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}
