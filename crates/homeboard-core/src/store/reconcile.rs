// ── Realtime reconciliation ──
//
// Merges device-row UPDATE images into the mirror. Unknown ids are
// ignored, and an image whose `last_updated` is strictly older than the
// mirrored one is discarded. Images without a timestamp always apply.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, trace};
use uuid::Uuid;

use super::DataStore;

/// What happened to one incoming change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    /// No local device with that id.
    UnknownDevice,
    /// Older than the local copy.
    Stale,
    /// Not a row image we can read.
    Malformed,
}

impl DataStore {
    /// Shallow-merge a device row image into the local device.
    pub fn merge_device_update(&self, record: &Value) -> MergeOutcome {
        let Some(fields) = record.as_object() else {
            return MergeOutcome::Malformed;
        };
        let Some(id) = fields
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Uuid>().ok())
        else {
            return MergeOutcome::Malformed;
        };

        self.last_realtime_event.send_replace(Some(Utc::now()));

        if !self.devices.contains(&id) {
            trace!(%id, "ignoring update for unknown device");
            return MergeOutcome::UnknownDevice;
        }

        let incoming: Option<DateTime<Utc>> = fields
            .get("last_updated")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok());

        let mut outcome = MergeOutcome::UnknownDevice;
        self.devices.modify(&id, |device| {
            if let (Some(incoming), Some(local)) = (incoming, device.last_updated) {
                if incoming < local {
                    outcome = MergeOutcome::Stale;
                    return false;
                }
            }
            device.apply_patch(fields);
            outcome = MergeOutcome::Applied;
            true
        });
        if outcome == MergeOutcome::Stale {
            debug!(%id, "discarding stale device update");
        }
        outcome
    }

    /// Replace a device's status with a freshly confirmed payload.
    ///
    /// `last_updated` is only moved when the caller knows the row's new
    /// timestamp.
    pub(crate) fn set_device_status(
        &self,
        id: &Uuid,
        status: Value,
        last_updated: Option<DateTime<Utc>>,
    ) -> bool {
        self.devices.modify(id, |device| {
            device.status = status;
            if last_updated.is_some() {
                device.last_updated = last_updated;
            }
            true
        })
    }
}
