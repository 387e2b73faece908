// ── Device domain types ──
//
// The wire keeps `status` and `capabilities` as free-form bags keyed by a
// string `device_type` tag. `DeviceCategory`, `DeviceStatus`, and
// `Capabilities` are the typed views; all key lookups are lenient so a
// missing or oddly typed field degrades to `None` instead of failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Kind of passive sensor.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SensorKind {
    Generic,
    Motion,
    Contact,
    Temperature,
    Smoke,
    Water,
}

/// Coarse device category parsed from the `device_type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceCategory {
    Light,
    Switch,
    Thermostat,
    Lock,
    Camera,
    CameraView,
    GarageDoor,
    Sensor(SensorKind),
    PtzControl,
    NightVision,
    SecurityPanel,
    SolarInverter,
    SolarSystem,
    /// Unknown tags round-trip unchanged.
    Other(String),
}

impl DeviceCategory {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "light" | "dimmer" => Self::Light,
            "switch" | "outlet" | "plug" => Self::Switch,
            "thermostat" => Self::Thermostat,
            "lock" => Self::Lock,
            "camera" => Self::Camera,
            "camera_view" => Self::CameraView,
            "garage_door" => Self::GarageDoor,
            "sensor" => Self::Sensor(SensorKind::Generic),
            "motion_sensor" => Self::Sensor(SensorKind::Motion),
            "contact_sensor" => Self::Sensor(SensorKind::Contact),
            "temperature_sensor" => Self::Sensor(SensorKind::Temperature),
            "smoke_sensor" | "smoke_detector" => Self::Sensor(SensorKind::Smoke),
            "water_sensor" | "leak_sensor" => Self::Sensor(SensorKind::Water),
            "ptz_control" => Self::PtzControl,
            "night_vision" => Self::NightVision,
            "security_panel" | "alarm_panel" => Self::SecurityPanel,
            "solar_inverter" | "inverter" => Self::SolarInverter,
            "solar_system" => Self::SolarSystem,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Canonical wire tag.
    pub fn tag(&self) -> String {
        match self {
            Self::Light => "light".into(),
            Self::Switch => "switch".into(),
            Self::Thermostat => "thermostat".into(),
            Self::Lock => "lock".into(),
            Self::Camera => "camera".into(),
            Self::CameraView => "camera_view".into(),
            Self::GarageDoor => "garage_door".into(),
            Self::Sensor(SensorKind::Generic) => "sensor".into(),
            Self::Sensor(kind) => format!("{kind}_sensor"),
            Self::PtzControl => "ptz_control".into(),
            Self::NightVision => "night_vision".into(),
            Self::SecurityPanel => "security_panel".into(),
            Self::SolarInverter => "solar_inverter".into(),
            Self::SolarSystem => "solar_system".into(),
            Self::Other(tag) => tag.clone(),
        }
    }

    /// Whether a power toggle makes sense for this category.
    pub fn is_switchable(&self) -> bool {
        matches!(self, Self::Light | Self::Switch)
    }
}

impl From<String> for DeviceCategory {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<DeviceCategory> for String {
    fn from(category: DeviceCategory) -> Self {
        category.tag()
    }
}

/// On/off state of a switchable device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PowerState {
    On,
    Off,
    Unknown,
}

impl PowerState {
    fn from_value(v: Option<&Value>) -> Self {
        match v {
            Some(Value::String(s)) if s.eq_ignore_ascii_case("on") => Self::On,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("off") => Self::Off,
            Some(Value::Bool(true)) => Self::On,
            Some(Value::Bool(false)) => Self::Off,
            _ => Self::Unknown,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off | Self::Unknown => "off",
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off | Self::Unknown => Self::On,
        }
    }
}

/// Camera night-vision (IR) mode.
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
pub enum NightVisionMode {
    Auto,
    On,
    Off,
}

/// HSV-style color as used by color-capable bulbs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// 0-100 (percent of the hue circle).
    pub hue: f64,
    /// 0-100.
    pub saturation: f64,
}

/// Typed view of a device's status bag, one variant per category family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum DeviceStatus {
    Light {
        power: PowerState,
        brightness: Option<u8>,
        color: Option<Color>,
    },
    Switch {
        power: PowerState,
    },
    Thermostat {
        current: Option<f64>,
        target: Option<f64>,
        mode: Option<String>,
    },
    Lock {
        locked: Option<bool>,
    },
    Camera {
        online: bool,
        model: Option<String>,
        firmware: Option<String>,
        stream_url: Option<String>,
        message: Option<String>,
    },
    GarageDoor {
        open: Option<bool>,
    },
    Sensor {
        kind: SensorKind,
        active: Option<bool>,
        value: Option<f64>,
        battery: Option<u8>,
    },
    Ptz {
        last_command: Option<String>,
        preset: Option<String>,
    },
    NightVision {
        mode: Option<NightVisionMode>,
    },
    SecurityPanel {
        online: bool,
        armed: Option<String>,
        zones: usize,
        message: Option<String>,
    },
    Solar {
        power_w: Option<f64>,
        energy_today_kwh: Option<f64>,
        lifetime_kwh: Option<f64>,
    },
    Unknown,
}

impl DeviceStatus {
    /// Build the typed view from a category and its raw status bag.
    pub fn from_parts(category: &DeviceCategory, bag: &Value) -> Self {
        let s = Bag(bag);
        match category {
            DeviceCategory::Light => Self::Light {
                power: PowerState::from_value(bag.get("state")),
                brightness: s.u8("brightness").or_else(|| s.u8("level")),
                color: match (s.f64("hue"), s.f64("saturation")) {
                    (Some(hue), Some(saturation)) => Some(Color { hue, saturation }),
                    _ => bag
                        .get("color")
                        .and_then(|c| serde_json::from_value(c.clone()).ok()),
                },
            },
            DeviceCategory::Switch => Self::Switch {
                power: PowerState::from_value(bag.get("state")),
            },
            DeviceCategory::Thermostat => Self::Thermostat {
                current: s.f64("temperature").or_else(|| s.f64("current_temperature")),
                target: s
                    .f64("target_temperature")
                    .or_else(|| s.f64("heating_setpoint")),
                mode: s.string("mode"),
            },
            DeviceCategory::Lock => Self::Lock {
                locked: s.bool("locked").or_else(|| {
                    s.string("state").map(|st| st == "locked" || st == "lock")
                }),
            },
            DeviceCategory::Camera | DeviceCategory::CameraView => Self::Camera {
                online: s.bool("online").unwrap_or(false),
                model: s.string("model"),
                firmware: s.string("firmware"),
                stream_url: s.string("stream_url").or_else(|| s.string("rtsp_url")),
                message: s.string("message"),
            },
            DeviceCategory::GarageDoor => Self::GarageDoor {
                open: s.bool("open").or_else(|| s.string("state").map(|st| st == "open")),
            },
            DeviceCategory::Sensor(kind) => Self::Sensor {
                kind: *kind,
                active: s
                    .bool("active")
                    .or_else(|| s.bool("motion"))
                    .or_else(|| s.string("state").map(|st| st == "active" || st == "open")),
                value: s.f64("value").or_else(|| s.f64("temperature")),
                battery: s.u8("battery"),
            },
            DeviceCategory::PtzControl => Self::Ptz {
                last_command: s.string("last_command"),
                preset: s.string("preset"),
            },
            DeviceCategory::NightVision => Self::NightVision {
                mode: s.string("mode").and_then(|m| m.parse().ok()),
            },
            DeviceCategory::SecurityPanel => Self::SecurityPanel {
                online: s.bool("online").unwrap_or(false),
                armed: s.string("armed"),
                zones: bag
                    .get("zones")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len),
                message: s.string("message"),
            },
            DeviceCategory::SolarInverter | DeviceCategory::SolarSystem => Self::Solar {
                power_w: s.f64("current_power_w").or_else(|| s.f64("power_w")),
                energy_today_kwh: s.f64("energy_today_kwh"),
                lifetime_kwh: s.f64("lifetime_kwh"),
            },
            DeviceCategory::Other(_) => Self::Unknown,
        }
    }

    /// Power state for switchable variants, `None` otherwise.
    pub fn power(&self) -> Option<PowerState> {
        match self {
            Self::Light { power, .. } | Self::Switch { power } => Some(*power),
            _ => None,
        }
    }

    /// One-line summary for tables.
    pub fn summary(&self) -> String {
        match self {
            Self::Light {
                power, brightness, ..
            } => match brightness {
                Some(b) if *power == PowerState::On => format!("on ({b}%)"),
                _ => power.to_string(),
            },
            Self::Switch { power } => power.to_string(),
            Self::Thermostat {
                current, target, ..
            } => match (current, target) {
                (Some(c), Some(t)) => format!("{c:.1}° -> {t:.1}°"),
                (Some(c), None) => format!("{c:.1}°"),
                (None, Some(t)) => format!("target {t:.1}°"),
                (None, None) => "-".into(),
            },
            Self::Lock { locked } => match locked {
                Some(true) => "locked".into(),
                Some(false) => "unlocked".into(),
                None => "-".into(),
            },
            Self::Camera { online, model, .. } => {
                let state = if *online { "online" } else { "offline" };
                model
                    .as_ref()
                    .map_or_else(|| state.to_owned(), |m| format!("{state} ({m})"))
            }
            Self::GarageDoor { open } => match open {
                Some(true) => "open".into(),
                Some(false) => "closed".into(),
                None => "-".into(),
            },
            Self::Sensor { active, value, .. } => match (active, value) {
                (_, Some(v)) => format!("{v}"),
                (Some(true), None) => "active".into(),
                (Some(false), None) => "idle".into(),
                (None, None) => "-".into(),
            },
            Self::Ptz { last_command, .. } => last_command.clone().unwrap_or_else(|| "-".into()),
            Self::NightVision { mode } => mode.map_or_else(|| "-".into(), |m| m.to_string()),
            Self::SecurityPanel { online, zones, .. } => {
                let state = if *online { "online" } else { "offline" };
                format!("{state}, {zones} zones")
            }
            Self::Solar { power_w, .. } => {
                power_w.map_or_else(|| "-".into(), |w| format!("{w:.0} W"))
            }
            Self::Unknown => "-".into(),
        }
    }
}

/// Typed view of the capabilities bag: known keys plus everything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Capabilities {
    pub dimmable: bool,
    pub color: bool,
    pub ptz: bool,
    pub night_vision: bool,
    pub thermostat_modes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Capabilities {
    const KNOWN: [&'static str; 5] = ["dimmable", "color", "ptz", "night_vision", "thermostat_modes"];

    pub fn from_value(bag: &Value) -> Self {
        let s = Bag(bag);
        let extra = bag
            .as_object()
            .map(|m| {
                m.iter()
                    .filter(|(k, _)| !Self::KNOWN.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            dimmable: s.truthy("dimmable"),
            color: s.truthy("color"),
            ptz: s.truthy("ptz"),
            night_vision: s.truthy("night_vision"),
            thermostat_modes: bag
                .get("thermostat_modes")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                .unwrap_or_default(),
            extra,
        }
    }
}

/// A device row in the mirror.
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform_id: Option<Uuid>,
    /// Vendor-side identifier.
    pub external_id: String,
    pub name: String,
    /// Raw `device_type` tag.
    pub device_type: String,
    pub category: DeviceCategory,
    pub room: Option<String>,
    pub status: Value,
    pub capabilities: Value,
    pub last_updated: Option<DateTime<Utc>>,
    /// Owning platform's display name (joined on fetch).
    pub platform_name: Option<String>,
}

impl Device {
    pub fn typed_status(&self) -> DeviceStatus {
        DeviceStatus::from_parts(&self.category, &self.status)
    }

    pub fn typed_capabilities(&self) -> Capabilities {
        Capabilities::from_value(&self.capabilities)
    }

    pub fn power(&self) -> Option<PowerState> {
        self.typed_status().power()
    }

    /// A light whose status state is `on`.
    pub fn is_lit_light(&self) -> bool {
        self.category == DeviceCategory::Light && self.power() == Some(PowerState::On)
    }

    /// Shallow-merge a changed row image into this device.
    ///
    /// Each top-level column present in `record` replaces the local value
    /// wholesale; bags are not deep-merged. Unknown columns are ignored,
    /// and `id`/`user_id` never change.
    pub fn apply_patch(&mut self, record: &Map<String, Value>) {
        for (column, value) in record {
            match column.as_str() {
                "device_name" => {
                    if let Some(name) = value.as_str() {
                        name.clone_into(&mut self.name);
                    }
                }
                "device_type" => {
                    if let Some(tag) = value.as_str() {
                        tag.clone_into(&mut self.device_type);
                        self.category = DeviceCategory::from_tag(tag);
                    }
                }
                "device_id" => {
                    if let Some(ext) = value.as_str() {
                        ext.clone_into(&mut self.external_id);
                    }
                }
                "platform_id" => {
                    self.platform_id = value.as_str().and_then(|s| s.parse().ok());
                }
                "room" => self.room = value.as_str().map(String::from),
                "status" => self.status = value.clone(),
                "capabilities" => self.capabilities = value.clone(),
                "last_updated" => {
                    self.last_updated = value.as_str().and_then(|s| s.parse().ok());
                }
                _ => {}
            }
        }
    }
}

// ── Lenient bag lookups ──────────────────────────────────────────────

struct Bag<'a>(&'a Value);

impl Bag<'_> {
    fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    fn string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn u8(&self, key: &str) -> Option<u8> {
        self.f64(key)
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 255.0).round())
            .and_then(|v| format!("{v:.0}").parse().ok())
    }

    fn bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.as_str() {
                "true" | "yes" | "on" => Some(true),
                "false" | "no" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Present and not false/empty.
    fn truthy(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(_) | Value::Number(_)) => true,
            _ => false,
        }
    }
}
