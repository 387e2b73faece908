// Backend row storage, auth, and serverless function surface.

mod auth;
mod client;
pub mod functions;
mod query;
pub mod rows;

pub use client::StoreClient;
pub use query::{Order, Query};

/// Table names as exposed by the row API.
pub mod tables {
    pub const PLATFORMS: &str = "smart_home_platforms";
    pub const DEVICES: &str = "smart_home_devices";
    pub const ACTIVITY_LOGS: &str = "device_activity_logs";
    pub const ENERGY_USAGE: &str = "energy_usage";
}
