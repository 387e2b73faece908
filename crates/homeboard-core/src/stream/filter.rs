// ── Filter predicates for device snapshots ──

use crate::model::{Device, DeviceCategory, PowerState};

/// Filter predicate over mirrored devices.
pub enum DeviceFilter {
    All,
    ByCategory(DeviceCategory),
    ByPlatform(String),
    ByRoom(String),
    /// Switchable devices currently on.
    On,
    Custom(Box<dyn Fn(&Device) -> bool + Send + Sync>),
}

impl DeviceFilter {
    pub fn matches(&self, device: &Device) -> bool {
        match self {
            Self::All => true,
            Self::ByCategory(c) => device.category == *c,
            Self::ByPlatform(name) => device
                .platform_name
                .as_deref()
                .is_some_and(|p| p.eq_ignore_ascii_case(name)),
            Self::ByRoom(room) => device
                .room
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(room)),
            Self::On => device.power() == Some(PowerState::On),
            Self::Custom(f) => f(device),
        }
    }
}
