// ── Konnected inventory ──
//
// The panel address comes from an explicit host or from the device YAML
// pasted at connect time. A reachable panel yields the panel row plus one
// row per wired zone; otherwise one placeholder panel with guidance.

use serde_json::{Value, json};
use tracing::{debug, warn};

use homeboard_api::KonnectedClient;
use homeboard_api::vendor::konnected::{PanelStatus, ZoneState};

use super::{Collected, DeviceDraft, Fidelity, Inventory, SyncAdapter, SyncContext, slug};
use crate::error::CoreError;
use crate::model::{KonnectedCredentials, Platform, PlatformCredentials};

/// YAML keys that may hold the panel address, in preference order.
const HOST_KEYS: [&str; 3] = ["static_ip", "ip_address", "host"];

pub(crate) struct KonnectedAdapter;

impl SyncAdapter for KonnectedAdapter {
    fn fidelity(&self) -> Fidelity {
        Fidelity::Live
    }

    async fn collect(
        &self,
        ctx: &SyncContext<'_>,
        platform: &Platform,
    ) -> Result<Collected, CoreError> {
        let PlatformCredentials::Konnected(creds) = platform.typed_credentials()? else {
            return Err(CoreError::validation(format!(
                "platform '{}' is not a Konnected platform",
                platform.name
            )));
        };

        let Some(host) = resolve_host(&creds) else {
            warn!(platform = %platform.name, "no Konnected panel address in credentials");
            return Ok(Collected::Inventory(placeholder(
                None,
                "No panel address was found. Add the panel's IP address, or paste a device \
                 YAML config containing `static_ip`, `ip_address` or `host`.",
            )));
        };

        let transport = ctx.transport.with_timeout(ctx.config.scan.probe_timeout);
        let client = KonnectedClient::new(&host, &transport)?;
        match client.status().await {
            Ok(status) => {
                debug!(%host, zones = status.sensors.len(), "Konnected panel reachable");
                Ok(Collected::Inventory(Inventory {
                    devices: panel_devices(&host, &status),
                    energy: Vec::new(),
                    reachable: true,
                    note: status.sw_version.clone(),
                }))
            }
            Err(e) => {
                warn!(error = %e, %host, "Konnected panel unreachable, storing placeholder");
                Ok(Collected::Inventory(placeholder(
                    Some(&host),
                    &format!(
                        "Could not reach the panel at {host}: {e}\n\
                         Check that the panel is powered, joined to this network, and that \
                         its address has not changed. A DHCP reservation or `static_ip` in \
                         the device YAML keeps it stable."
                    ),
                )))
            }
        }
    }
}

/// Explicit host first, then a search of the YAML config.
pub(crate) fn resolve_host(creds: &KonnectedCredentials) -> Option<String> {
    if let Some(host) = creds.host.as_deref().filter(|h| !h.trim().is_empty()) {
        return Some(host.trim().to_owned());
    }
    let yaml = creds.config_yaml.as_deref()?;
    match serde_yaml::from_str::<serde_yaml::Value>(yaml) {
        Ok(doc) => HOST_KEYS.iter().find_map(|key| find_key(&doc, key)),
        Err(e) => {
            warn!(error = %e, "Konnected YAML config does not parse");
            None
        }
    }
}

/// Depth-first search for a scalar under `key` anywhere in the document.
fn find_key(node: &serde_yaml::Value, key: &str) -> Option<String> {
    match node {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                if k.as_str() == Some(key) {
                    if let Some(found) = scalar(v) {
                        return Some(found);
                    }
                }
            }
            map.values().find_map(|v| find_key(v, key))
        }
        serde_yaml::Value::Sequence(items) => items.iter().find_map(|v| find_key(v, key)),
        serde_yaml::Value::Tagged(tagged) => find_key(&tagged.value, key),
        _ => None,
    }
}

fn scalar(v: &serde_yaml::Value) -> Option<String> {
    match v {
        serde_yaml::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        _ => None,
    }
}

fn panel_devices(host: &str, status: &PanelStatus) -> Vec<DeviceDraft> {
    let base = format!(
        "konnected-{}",
        slug(status.mac.as_deref().unwrap_or(host))
    );
    let zones: Vec<Value> = status.sensors.iter().map(zone_json).collect();

    let mut devices = vec![DeviceDraft {
        external_id: base.clone(),
        name: "Konnected Alarm Panel".into(),
        device_type: "security_panel".into(),
        room: None,
        status: json!({
            "online": true,
            "host": host,
            "ip": status.ip,
            "mac": status.mac,
            "firmware": status.sw_version,
            "hardware": status.hw_version,
            "rssi": status.rssi,
            "uptime": status.uptime,
            "zones": zones,
        }),
        capabilities: json!({
            "zones": status.sensors.len(),
            "actuators": status.actuators.len(),
        }),
    }];

    devices.extend(status.sensors.iter().map(|zone| {
        let label = zone_label(zone);
        DeviceDraft {
            external_id: format!("{base}-zone-{}", slug(&label)),
            name: format!("Zone {label}"),
            device_type: "contact_sensor".into(),
            room: None,
            status: json!({
                "state": if zone.state == Some(1) { "open" } else { "closed" },
                "active": zone.state == Some(1),
            }),
            capabilities: json!({ "pin": zone.pin }),
        }
    }));
    devices
}

fn zone_label(zone: &ZoneState) -> String {
    zone.zone
        .clone()
        .or_else(|| zone.pin.map(|p| p.to_string()))
        .unwrap_or_else(|| "unknown".into())
}

fn zone_json(zone: &ZoneState) -> Value {
    json!({ "zone": zone_label(zone), "pin": zone.pin, "state": zone.state })
}

fn placeholder(host: Option<&str>, message: &str) -> Inventory {
    let base = format!("konnected-{}", slug(host.unwrap_or("panel")));
    Inventory {
        devices: vec![DeviceDraft {
            external_id: base,
            name: "Konnected Alarm Panel".into(),
            device_type: "security_panel".into(),
            room: None,
            status: json!({
                "online": false,
                "host": host,
                "message": message,
                "setup": [
                    "Flash the panel with current Konnected firmware",
                    "Join the panel to your Wi-Fi from its setup page",
                    "Enter the panel's IP address when connecting this platform",
                ],
            }),
            capabilities: json!({}),
        }],
        energy: Vec::new(),
        reachable: false,
        note: Some(message.lines().next().unwrap_or(message).to_owned()),
    }
}
