// ── ReoLink inventory ──
//
// A camera yields four rows: the camera itself plus motion, PTZ, and
// night-vision companions. When the probe fails the same four rows are
// stored with the camera marked offline and carrying setup guidance.

use serde_json::{Value, json};
use strum::IntoEnumIterator;
use tracing::warn;

use homeboard_api::ReolinkClient;
use homeboard_api::vendor::reolink::{DevInfo, MEDIA_PORT, RTMP_PORT, RTSP_PORT};

use super::{Collected, DeviceDraft, Fidelity, Inventory, SyncAdapter, SyncContext, slug};
use crate::command::PtzDirection;
use crate::error::CoreError;
use crate::model::{NightVisionMode, Platform, PlatformCredentials, ReolinkCredentials};

pub(crate) struct ReolinkAdapter;

impl SyncAdapter for ReolinkAdapter {
    fn fidelity(&self) -> Fidelity {
        Fidelity::Live
    }

    async fn collect(
        &self,
        ctx: &SyncContext<'_>,
        platform: &Platform,
    ) -> Result<Collected, CoreError> {
        let PlatformCredentials::Reolink(creds) = platform.typed_credentials()? else {
            return Err(CoreError::validation(format!(
                "platform '{}' is not a ReoLink platform",
                platform.name
            )));
        };
        let ReolinkCredentials {
            host,
            username,
            password,
        } = creds;
        let host = host
            .ok_or_else(|| CoreError::validation("ReoLink credentials missing 'ip_address'"))?;

        let transport = ctx.transport.with_timeout(ctx.config.scan.probe_timeout);
        let client = ReolinkClient::new(&host, &username, password, &transport)?;
        let stream_url = client.rtsp_url();

        let (probe, reachable) = match client.dev_info().await {
            Ok(info) => (Probe::Live(info), true),
            Err(e) => {
                warn!(error = %e, host = %host, "ReoLink probe failed, storing placeholders");
                (Probe::Failed(e.to_string()), false)
            }
        };

        Ok(Collected::Inventory(Inventory {
            devices: camera_set(&host, &stream_url, &probe),
            energy: Vec::new(),
            reachable,
            note: match probe {
                Probe::Live(info) => info.model,
                Probe::Failed(reason) => Some(reason),
            },
        }))
    }
}

pub(crate) enum Probe {
    Live(DevInfo),
    Failed(String),
}

/// Steps shown on the camera when it cannot be reached.
pub(crate) fn remediation(host: &str, reason: &str, stream_url: &str) -> String {
    format!(
        "Could not reach the camera at {host}: {reason}\n\
         \n\
         To connect this camera:\n\
         1. Check that the camera is powered on and on the same network as this machine.\n\
         2. Enable the HTTP or HTTPS service in the camera's network settings.\n\
         3. Verify the username and password stored for this platform.\n\
         4. View the stream directly in a player that supports RTSP: {stream_url}"
    )
}

/// The camera row plus its three companion controls.
pub(crate) fn camera_set(host: &str, stream_url: &str, probe: &Probe) -> Vec<DeviceDraft> {
    let base = format!("reolink-{}", slug(host));
    let online = matches!(probe, Probe::Live(_));

    let camera_status = match probe {
        Probe::Live(info) => json!({
            "online": true,
            "host": host,
            "model": info.model,
            "name": info.name,
            "firmware": info.firm_ver,
            "hardware": info.hard_ver,
            "serial": info.serial,
            "channels": info.channel_num,
            "stream_url": stream_url,
        }),
        Probe::Failed(reason) => json!({
            "online": false,
            "host": host,
            "stream_url": stream_url,
            "message": remediation(host, reason, stream_url),
        }),
    };
    let camera_name = match probe {
        Probe::Live(DevInfo {
            name: Some(name), ..
        }) if !name.is_empty() => name.clone(),
        _ => format!("ReoLink Camera ({host})"),
    };

    let directions: Vec<String> = PtzDirection::iter()
        .map(|d| d.to_string())
        .collect();
    let modes: Vec<String> = NightVisionMode::iter()
        .map(|m| m.to_string())
        .collect();

    vec![
        DeviceDraft {
            external_id: format!("{base}-camera"),
            name: camera_name.clone(),
            device_type: "camera".into(),
            room: None,
            status: camera_status,
            capabilities: json!({
                "ptz": true,
                "night_vision": true,
                "streams": {
                    "rtsp": RTSP_PORT,
                    "rtmp": RTMP_PORT,
                    "media": MEDIA_PORT,
                },
            }),
        },
        DeviceDraft {
            external_id: format!("{base}-motion"),
            name: format!("{camera_name} Motion"),
            device_type: "motion_sensor".into(),
            room: None,
            status: json!({ "active": false, "online": online }),
            capabilities: json!({ "motion": true }),
        },
        DeviceDraft {
            external_id: format!("{base}-ptz"),
            name: format!("{camera_name} PTZ"),
            device_type: "ptz_control".into(),
            room: None,
            status: json!({ "last_command": Value::Null, "preset": "home" }),
            capabilities: json!({ "ptz": true, "directions": directions }),
        },
        DeviceDraft {
            external_id: format!("{base}-night-vision"),
            name: format!("{camera_name} Night Vision"),
            device_type: "night_vision".into(),
            room: None,
            status: json!({ "mode": NightVisionMode::Auto }),
            capabilities: json!({ "night_vision": true, "modes": modes }),
        },
    ]
}
