// Wire shapes for the backend tables.
//
// Field names match the column names exactly. Free-form JSON columns
// (`credentials`, `status`, `capabilities`, `details`) stay as
// `serde_json::Value` here; typed views live in homeboard-core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ── Platforms ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform_name: String,
    pub platform_type: String,
    #[serde(default)]
    pub credentials: Value,
    #[serde(default)]
    pub is_connected: bool,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPlatform {
    pub user_id: Uuid,
    pub platform_name: String,
    pub platform_type: String,
    pub credentials: Value,
    pub is_connected: bool,
}

/// Partial update written after a sync attempt.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformSyncPatch {
    pub is_connected: bool,
    pub last_sync: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Devices ──────────────────────────────────────────────────────────

/// Embedded `smart_home_platforms(platform_name)` projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformNameRef {
    pub platform_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRow {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub platform_id: Option<Uuid>,
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub status: Value,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(
        default,
        rename = "smart_home_platforms",
        skip_serializing_if = "Option::is_none"
    )]
    pub platform: Option<PlatformNameRef>,
}

/// Insert/upsert payload for `smart_home_devices`.
///
/// Identity across resyncs is `(user_id, device_id, platform_id)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDevice {
    pub user_id: Uuid,
    pub platform_id: Uuid,
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    pub room: Option<String>,
    pub status: Value,
    pub capabilities: Value,
    pub last_updated: DateTime<Utc>,
}

/// Conflict target for device upserts: one row per user and external id.
pub const DEVICE_CONFLICT_KEY: &str = "user_id,device_id";

/// Partial update for a device's status column.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatusPatch {
    pub status: Value,
    pub last_updated: DateTime<Utc>,
}

// ── Activity logs ────────────────────────────────────────────────────

/// Embedded `smart_home_devices(device_name)` projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceNameRef {
    pub device_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogRow {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub device_id: Option<Uuid>,
    pub action: String,
    #[serde(default)]
    pub details: Value,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(
        default,
        rename = "smart_home_devices",
        skip_serializing_if = "Option::is_none"
    )]
    pub device: Option<DeviceNameRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewActivityLog {
    pub user_id: Uuid,
    pub device_id: Option<Uuid>,
    pub action: String,
    pub details: Value,
}

// ── Energy usage ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyUsageRow {
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub usage_kwh: Option<f64>,
    #[serde(default)]
    pub solar_generation_kwh: Option<f64>,
    #[serde(default)]
    pub cost_usd: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewEnergyUsage {
    pub user_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub usage_kwh: f64,
    pub solar_generation_kwh: f64,
    pub cost_usd: Option<f64>,
}
