// ── Typed request payloads for Command variants ──

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::PlatformKind;

/// Pan/tilt/zoom step for a camera's PTZ control.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PtzDirection {
    Up,
    Down,
    Left,
    Right,
    ZoomIn,
    ZoomOut,
    Home,
}

/// Thermostat change; at least one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThermostatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setpoint: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// New platform row submitted by the user.
#[derive(Debug, Clone)]
pub struct ConnectPlatformRequest {
    /// Display name; defaults to the kind's label.
    pub name: Option<String>,
    pub kind: PlatformKind,
    /// Credential blob, stored as given.
    pub credentials: Value,
}
