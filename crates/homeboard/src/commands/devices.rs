//! Device command handlers.

use std::str::FromStr;
use std::sync::Arc;

use tabled::Tabled;

use homeboard_core::{
    Color, Command as CoreCommand, CommandResult, Device, DeviceFilter, Hub, NightVisionMode,
    PtzDirection, ThermostatRequest,
};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    dtype: String,
    #[tabled(rename = "Room")]
    room: String,
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&Arc<Device>> for DeviceRow {
    fn from(d: &Arc<Device>) -> Self {
        Self {
            id: d.id.to_string(),
            name: d.name.clone(),
            dtype: d.device_type.clone(),
            room: output::or_dash(d.room.as_deref()),
            platform: output::or_dash(d.platform_name.as_deref()),
            status: d.typed_status().summary(),
        }
    }
}

fn detail(d: &Device) -> String {
    let caps = d.typed_capabilities();
    let mut flags = Vec::new();
    if caps.dimmable {
        flags.push("dimmable");
    }
    if caps.color {
        flags.push("color");
    }
    if caps.ptz {
        flags.push("ptz");
    }
    if caps.night_vision {
        flags.push("night vision");
    }

    let mut lines = vec![
        format!("ID:          {}", d.id),
        format!("Name:        {}", d.name),
        format!("Type:        {}", d.device_type),
        format!("External ID: {}", d.external_id),
        format!("Room:        {}", output::or_dash(d.room.as_deref())),
        format!("Platform:    {}", output::or_dash(d.platform_name.as_deref())),
        format!("Status:      {}", d.typed_status().summary()),
        format!("Updated:     {}", output::or_dash(d.last_updated)),
    ];
    if !flags.is_empty() {
        lines.push(format!("Features:    {}", flags.join(", ")));
    }
    if let Some(message) = d.status.get("message").and_then(|m| m.as_str()) {
        lines.push(String::new());
        lines.push(message.to_owned());
    }
    lines.join("\n")
}

fn print_device(result: &CommandResult, global: &GlobalOpts) {
    match result {
        CommandResult::Device { device, .. } => {
            let out = output::render_single(&global.output, device, detail, |d| d.id.to_string());
            output::print_output(&out, global.quiet);
        }
        other => util::report(other, global),
    }
}

fn parse_choice<T: FromStr>(field: &str, raw: &str, expected: &str) -> Result<T, CliError> {
    T::from_str(raw).map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("expected one of {expected}, got '{raw}'"),
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(hub: &Hub, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let command = match args.command {
        DevicesCommand::List {
            list,
            platform,
            room,
            on,
        } => {
            let mut filters = Vec::new();
            if let Some(p) = platform {
                filters.push(DeviceFilter::ByPlatform(p));
            }
            if let Some(r) = room {
                filters.push(DeviceFilter::ByRoom(r));
            }
            if on {
                filters.push(DeviceFilter::On);
            }
            let all = hub.devices_snapshot();
            let matching = all
                .iter()
                .filter(|d| filters.iter().all(|f| f.matches(d)))
                .cloned();
            let rows = util::apply_list_args(matching, &list, |d| d.name.as_str());
            let out = output::render_list(
                &global.output,
                &rows,
                |d| DeviceRow::from(d),
                |d| d.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            return Ok(());
        }

        DevicesCommand::Get { device } => {
            let d = util::resolve_device(hub, &device)?;
            let out = output::render_single(&global.output, d.as_ref(), detail, |d| {
                d.id.to_string()
            });
            output::print_output(&out, global.quiet);
            return Ok(());
        }

        DevicesCommand::Toggle { device } => CoreCommand::Toggle {
            device_id: util::resolve_device(hub, &device)?.id,
        },

        DevicesCommand::Brightness { device, level } => CoreCommand::SetBrightness {
            device_id: util::resolve_device(hub, &device)?.id,
            level,
        },

        DevicesCommand::Color {
            device,
            hue,
            saturation,
        } => CoreCommand::SetColor {
            device_id: util::resolve_device(hub, &device)?.id,
            color: Color { hue, saturation },
        },

        DevicesCommand::Thermostat {
            device,
            setpoint,
            mode,
        } => CoreCommand::SetThermostat {
            device_id: util::resolve_device(hub, &device)?.id,
            request: ThermostatRequest { setpoint, mode },
        },

        DevicesCommand::Lock { device } => CoreCommand::SetLock {
            device_id: util::resolve_device(hub, &device)?.id,
            locked: true,
        },

        DevicesCommand::Unlock { device } => CoreCommand::SetLock {
            device_id: util::resolve_device(hub, &device)?.id,
            locked: false,
        },

        DevicesCommand::Ptz { device, direction } => CoreCommand::Ptz {
            device_id: util::resolve_device(hub, &device)?.id,
            direction: parse_choice::<PtzDirection>(
                "direction",
                &direction,
                "up, down, left, right, zoom_in, zoom_out, home",
            )?,
        },

        DevicesCommand::NightVision { device, mode } => CoreCommand::NightVision {
            device_id: util::resolve_device(hub, &device)?.id,
            mode: parse_choice::<NightVisionMode>("mode", &mode, "auto, on, off")?,
        },
    };

    let result = hub.execute(command).await?;
    print_device(&result, global);
    Ok(())
}
