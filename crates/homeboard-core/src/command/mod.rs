// ── Command API ──
//
// Every write flows through one `Command` enum. The hub routes each
// variant to a direct row update, a server-side handler, or a sync
// adapter, and emits exactly one notice per command.

pub mod requests;

use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{Color, Device, NightVisionMode, Platform};
use crate::sync::SyncReport;

pub use requests::{ConnectPlatformRequest, PtzDirection, ThermostatRequest};

/// A command envelope sent through the command channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All write operations the hub accepts.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Device control ───────────────────────────────────────────────
    Toggle {
        device_id: Uuid,
    },
    SetBrightness {
        device_id: Uuid,
        /// 0-100.
        level: u8,
    },
    SetColor {
        device_id: Uuid,
        color: Color,
    },
    SetThermostat {
        device_id: Uuid,
        request: ThermostatRequest,
    },
    SetLock {
        device_id: Uuid,
        locked: bool,
    },
    Ptz {
        device_id: Uuid,
        direction: PtzDirection,
    },
    NightVision {
        device_id: Uuid,
        mode: NightVisionMode,
    },
    TurnOffAllLights,

    // ── Platforms ────────────────────────────────────────────────────
    ConnectPlatform(ConnectPlatformRequest),
    DisconnectPlatform {
        name: String,
    },
    CleanupDuplicates {
        name: String,
    },
    SyncPlatform {
        platform_id: Uuid,
    },
    ClearAllPlatforms,
}

impl Command {
    /// Notice title for this command.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Toggle { .. } => "Toggle device",
            Self::SetBrightness { .. } => "Set brightness",
            Self::SetColor { .. } => "Set color",
            Self::SetThermostat { .. } => "Set thermostat",
            Self::SetLock { locked: true, .. } => "Lock",
            Self::SetLock { locked: false, .. } => "Unlock",
            Self::Ptz { .. } => "PTZ",
            Self::NightVision { .. } => "Night vision",
            Self::TurnOffAllLights => "All lights off",
            Self::ConnectPlatform(_) => "Connect platform",
            Self::DisconnectPlatform { .. } => "Disconnect platform",
            Self::CleanupDuplicates { .. } => "Clean up duplicates",
            Self::SyncPlatform { .. } => "Sync platform",
            Self::ClearAllPlatforms => "Clear all platforms",
        }
    }

    /// Target device, for device-control variants.
    pub fn device_id(&self) -> Option<Uuid> {
        match self {
            Self::Toggle { device_id }
            | Self::SetBrightness { device_id, .. }
            | Self::SetColor { device_id, .. }
            | Self::SetThermostat { device_id, .. }
            | Self::SetLock { device_id, .. }
            | Self::Ptz { device_id, .. }
            | Self::NightVision { device_id, .. } => Some(*device_id),
            _ => None,
        }
    }
}

/// Outcome of a successfully routed command.
#[derive(Debug, Clone)]
pub enum CommandResult {
    /// Device after the command. `status_confirmed` is false when the
    /// remote call returned no fresh status and the mirror was left as is.
    Device {
        device: Device,
        status_confirmed: bool,
    },
    LightsOff {
        count: usize,
    },
    Platform(Platform),
    Disconnected {
        platforms: usize,
        devices: usize,
    },
    Cleanup {
        kept: Option<Uuid>,
        removed: usize,
    },
    Synced(SyncReport),
    Cleared {
        platforms: usize,
        devices: usize,
    },
}

impl CommandResult {
    /// Notice body for this result.
    pub fn summary(&self) -> String {
        match self {
            Self::Device {
                device,
                status_confirmed: true,
            } => format!("{} is now {}", device.name, device.typed_status().summary()),
            Self::Device { device, .. } => format!("Command sent to {}", device.name),
            Self::LightsOff { count: 0 } => "No lights were on".into(),
            Self::LightsOff { count } => format!("Turned off {count} light(s)"),
            Self::Platform(p) => format!("Connected {} ({})", p.name, p.kind),
            Self::Disconnected { platforms, devices } => {
                format!("Removed {platforms} platform row(s) and {devices} device(s)")
            }
            Self::Cleanup { removed: 0, .. } => "No duplicates found".into(),
            Self::Cleanup { removed, .. } => format!("Removed {removed} duplicate platform row(s)"),
            Self::Synced(report) => report.summary(),
            Self::Cleared { platforms, devices } => {
                format!("Cleared {platforms} platform(s) and {devices} device(s)")
            }
        }
    }
}
