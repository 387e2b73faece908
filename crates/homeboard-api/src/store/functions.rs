// Request/response bodies for the server-side handlers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const DEVICE_COMMAND: &str = "smartthings-device-command";
pub const INVENTORY_SYNC: &str = "smartthings-sync";

/// Body of `smartthings-device-command`.
///
/// `device_id` is the local row id; the handler resolves the vendor id
/// and checks ownership.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCommandRequest {
    pub device_id: Uuid,
    pub command: String,
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCommandResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `smartthings-sync`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySyncRequest {
    pub platform_id: Uuid,
}

/// Count summary returned by the inventory sync handler.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySyncResponse {
    #[serde(default, alias = "devicesSynced", alias = "device_count")]
    pub device_count: usize,
    #[serde(default, alias = "roomsFound", alias = "room_count")]
    pub room_count: usize,
    #[serde(default, alias = "locationsFound", alias = "location_count")]
    pub location_count: usize,
}
