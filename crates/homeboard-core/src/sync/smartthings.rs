// ── SmartThings inventory ──
//
// Remote dispatch hands the whole pass to the `smartthings-sync` handler.
// Local dispatch walks locations and rooms into a room-name lookup, then
// lists devices and reads each one's live status.

use std::collections::HashMap;

use secrecy::SecretString;
use serde_json::{Map, Value, json};
use tracing::debug;

use homeboard_api::SmartThingsClient;
use homeboard_api::store::functions::{INVENTORY_SYNC, InventorySyncRequest, InventorySyncResponse};
use homeboard_api::vendor::smartthings::{Device as VendorDevice, DeviceStatus as VendorStatus};
use homeboard_api::TransportConfig;

use super::{Collected, DeviceDraft, Fidelity, Inventory, SyncAdapter, SyncContext};
use crate::config::{CommandDispatch, HubConfig};
use crate::error::CoreError;
use crate::model::{Platform, PlatformCredentials};

pub(crate) struct SmartThingsAdapter;

impl SyncAdapter for SmartThingsAdapter {
    fn fidelity(&self) -> Fidelity {
        Fidelity::Live
    }

    async fn collect(
        &self,
        ctx: &SyncContext<'_>,
        platform: &Platform,
    ) -> Result<Collected, CoreError> {
        match ctx.config.command_dispatch {
            CommandDispatch::Remote => {
                let resp: InventorySyncResponse = ctx
                    .store
                    .invoke(
                        INVENTORY_SYNC,
                        &InventorySyncRequest {
                            platform_id: platform.id,
                        },
                    )
                    .await?;
                Ok(Collected::Remote(resp))
            }
            CommandDispatch::Local => {
                let token = platform_token(platform)?;
                let client = vendor_client(ctx.config, ctx.transport, token)?;
                collect_inventory(&client).await.map(Collected::Inventory)
            }
        }
    }
}

/// The platform's SmartThings token.
pub(crate) fn platform_token(platform: &Platform) -> Result<SecretString, CoreError> {
    match platform.typed_credentials()? {
        PlatformCredentials::SmartThings(creds) => Ok(creds.token),
        _ => Err(CoreError::validation(format!(
            "platform '{}' is not a SmartThings platform",
            platform.name
        ))),
    }
}

pub(crate) fn vendor_client(
    config: &HubConfig,
    transport: &TransportConfig,
    token: SecretString,
) -> Result<SmartThingsClient, CoreError> {
    let http = transport.build_client()?;
    Ok(SmartThingsClient::from_reqwest(
        &config.smartthings_base_url,
        http,
        token,
    )?)
}

async fn collect_inventory(client: &SmartThingsClient) -> Result<Inventory, CoreError> {
    let locations = client.list_locations().await?;
    let mut rooms: HashMap<String, String> = HashMap::new();
    for location in &locations {
        for room in client.list_rooms(&location.location_id).await? {
            rooms.insert(room.room_id, room.name);
        }
    }
    debug!(locations = locations.len(), rooms = rooms.len(), "room lookup built");

    let devices = client.list_devices().await?;
    let mut drafts = Vec::with_capacity(devices.len());
    for device in &devices {
        let status = client.device_status(&device.device_id).await?;
        drafts.push(draft_from_vendor(device, &status, &rooms));
    }

    Ok(Inventory {
        devices: drafts,
        energy: Vec::new(),
        reachable: true,
        note: Some(format!(
            "{} location(s), {} room(s)",
            locations.len(),
            rooms.len()
        )),
    })
}

/// Coarse device type from capability ids.
pub(crate) fn classify(capabilities: &[&str]) -> &'static str {
    let has = |id: &str| capabilities.contains(&id);
    if has("switchLevel") {
        "light"
    } else if has("lock") {
        "lock"
    } else if has("thermostatHeatingSetpoint") {
        "thermostat"
    } else if has("switch") {
        "switch"
    } else if has("motionSensor") {
        "motion_sensor"
    } else if has("contactSensor") {
        "contact_sensor"
    } else if has("smokeDetector") {
        "smoke_sensor"
    } else if has("waterSensor") {
        "water_sensor"
    } else if has("temperatureMeasurement") {
        "temperature_sensor"
    } else {
        "other"
    }
}

fn draft_from_vendor(
    device: &VendorDevice,
    status: &VendorStatus,
    rooms: &HashMap<String, String>,
) -> DeviceDraft {
    let caps = device.capability_ids();
    let device_type = classify(&caps);
    DeviceDraft {
        external_id: device.device_id.clone(),
        name: device.display_name().to_owned(),
        device_type: device_type.to_owned(),
        room: device.room_id.as_ref().and_then(|id| rooms.get(id)).cloned(),
        status: status_from_vendor(status),
        capabilities: json!({
            "dimmable": caps.contains(&"switchLevel"),
            "color": caps.contains(&"colorControl"),
            "smartthings": caps,
        }),
    }
}

/// Map live vendor attributes onto the shared status bag keys.
pub(crate) fn status_from_vendor(status: &VendorStatus) -> Value {
    let mut out = Map::new();
    let mut put = |key: &str, value: Option<&Value>| {
        if let Some(v) = value {
            out.insert(key.to_owned(), v.clone());
        }
    };
    put("state", status.attribute("switch", "switch"));
    put("brightness", status.attribute("switchLevel", "level"));
    put("hue", status.attribute("colorControl", "hue"));
    put("saturation", status.attribute("colorControl", "saturation"));
    put("temperature", status.attribute("temperatureMeasurement", "temperature"));
    put(
        "target_temperature",
        status.attribute("thermostatHeatingSetpoint", "heatingSetpoint"),
    );
    put("mode", status.attribute("thermostatMode", "thermostatMode"));
    put("battery", status.attribute("battery", "battery"));

    if let Some(lock) = status.attribute("lock", "lock").and_then(Value::as_str) {
        out.insert("locked".into(), Value::Bool(lock == "locked"));
        out.insert("state".into(), Value::String(lock.to_owned()));
    }
    if let Some(motion) = status.attribute("motionSensor", "motion").and_then(Value::as_str) {
        out.insert("active".into(), Value::Bool(motion == "active"));
    }
    if let Some(contact) = status
        .attribute("contactSensor", "contact")
        .and_then(Value::as_str)
    {
        out.insert("state".into(), Value::String(contact.to_owned()));
        out.insert("active".into(), Value::Bool(contact == "open"));
    }
    Value::Object(out)
}
