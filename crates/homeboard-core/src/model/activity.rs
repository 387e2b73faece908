// ── Activity log domain types ──

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Action tags written by hub operations.
pub mod actions {
    pub const DEVICE_TOGGLE: &str = "device_toggle";
    pub const BRIGHTNESS_CHANGE: &str = "brightness_change";
    pub const COLOR_CHANGE: &str = "color_change";
    pub const THERMOSTAT_CHANGE: &str = "thermostat_change";
    pub const LOCK_CHANGE: &str = "lock_change";
    pub const PTZ_COMMAND: &str = "ptz_command";
    pub const NIGHT_VISION_CHANGE: &str = "night_vision_change";
    pub const ALL_LIGHTS_OFF: &str = "all_lights_off";
    pub const PLATFORM_CONNECTED: &str = "platform_connected";
    pub const PLATFORM_DISCONNECTED: &str = "platform_disconnected";
    pub const PLATFORM_SYNC: &str = "platform_sync";
}

/// One entry in the user's activity history.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityLog {
    pub id: Uuid,
    pub device_id: Option<Uuid>,
    /// Joined device name; `None` for platform-level entries.
    pub device_name: Option<String>,
    pub action: String,
    /// Human-readable text, stored under `details.description`.
    pub description: String,
    pub details: Value,
    pub timestamp: Option<DateTime<Utc>>,
}
