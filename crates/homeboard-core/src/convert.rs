// ── Row-to-domain conversions ──
//
// Bridges raw `homeboard_api` rows into `homeboard_core::model` types.
// Each `From` impl renames columns, parses the device tag, and lifts
// joined projections into plain fields.

use serde_json::Value;

use homeboard_api::store::rows::{ActivityLogRow, DeviceRow, EnergyUsageRow, PlatformRow};

use crate::model::{ActivityLog, Device, DeviceCategory, EnergySample, Platform, PlatformKind};

impl From<PlatformRow> for Platform {
    fn from(row: PlatformRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.platform_name,
            kind: PlatformKind::from(row.platform_type),
            credentials: row.credentials,
            is_connected: row.is_connected,
            last_sync: row.last_sync,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            platform_id: row.platform_id,
            external_id: row.device_id,
            name: row.device_name,
            category: DeviceCategory::from_tag(&row.device_type),
            device_type: row.device_type,
            room: row.room,
            status: row.status,
            capabilities: row.capabilities,
            last_updated: row.last_updated,
            platform_name: row.platform.map(|p| p.platform_name),
        }
    }
}

impl From<ActivityLogRow> for ActivityLog {
    fn from(row: ActivityLogRow) -> Self {
        let description = row
            .details
            .get("description")
            .and_then(Value::as_str)
            .map_or_else(|| row.action.replace('_', " "), str::to_owned);
        Self {
            id: row.id,
            device_id: row.device_id,
            device_name: row.device.map(|d| d.device_name),
            action: row.action,
            description,
            details: row.details,
            timestamp: row.timestamp,
        }
    }
}

impl From<EnergyUsageRow> for EnergySample {
    fn from(row: EnergyUsageRow) -> Self {
        Self {
            recorded_at: row.recorded_at,
            usage_kwh: row.usage_kwh.unwrap_or(0.0),
            solar_generation_kwh: row.solar_generation_kwh.unwrap_or(0.0),
            cost_usd: row.cost_usd,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn activity_description_falls_back_to_action() {
        let row: ActivityLogRow = serde_json::from_value(json!({
            "id": "6f9619ff-8b86-d011-b42d-00c04fc964ff",
            "action": "all_lights_off",
            "details": { "count": 3 }
        }))
        .unwrap();
        let log = ActivityLog::from(row);
        assert_eq!(log.description, "all lights off");
        assert!(log.device_name.is_none());
    }

    #[test]
    fn device_row_lifts_platform_name_and_category() {
        let row: DeviceRow = serde_json::from_value(json!({
            "id": "6f9619ff-8b86-d011-b42d-00c04fc964ff",
            "user_id": "550e8400-e29b-41d4-a716-446655440000",
            "device_id": "cam-1",
            "device_name": "Driveway",
            "device_type": "camera",
            "smart_home_platforms": { "platform_name": "ReoLink" }
        }))
        .unwrap();
        let device = Device::from(row);
        assert_eq!(device.category, DeviceCategory::Camera);
        assert_eq!(device.platform_name.as_deref(), Some("ReoLink"));
        assert_eq!(device.external_id, "cam-1");
    }
}
