// ── Domain model ──
//
// Canonical representations of backend rows, with typed views over the
// free-form JSON columns. Consumers depend on these, never on wire rows.

pub mod activity;
pub mod device;
pub mod energy;
pub mod notice;
pub mod platform;

// ── Re-exports ──────────────────────────────────────────────────────

pub use activity::{ActivityLog, actions};
pub use device::{
    Capabilities, Color, Device, DeviceCategory, DeviceStatus, NightVisionMode, PowerState,
    SensorKind,
};
pub use energy::{EnergySample, EnergySummary};
pub use notice::{Notice, NoticeLevel};
pub use platform::{
    EnlightenCredentials, KonnectedCredentials, Platform, PlatformCredentials, PlatformKind,
    ReolinkCredentials, SmartThingsCredentials,
};
