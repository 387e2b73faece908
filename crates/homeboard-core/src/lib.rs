//! Reactive data and sync layer between `homeboard-api` and the CLI.
//!
//! This crate owns the business logic, domain model, and reactive data
//! infrastructure for the homeboard workspace:
//!
//! - **[`Hub`]**: central facade managing the session lifecycle.
//!   [`connect()`](Hub::connect) signs in, loads the mirror in parallel,
//!   subscribes to device and activity-log changes, and starts the command
//!   processor. [`Hub::oneshot()`](Hub::oneshot) is the lightweight mode
//!   for single CLI invocations.
//!
//! - **[`DataStore`]**: lock-free mirror built on `EntityCollection<T>`
//!   (`DashMap` + `tokio::sync::watch`). Realtime row images are
//!   shallow-merged into it; older images are discarded.
//!
//! - **[`EntityStream<T>`]**: subscription handle vended by the `DataStore`,
//!   exposing `current()` / `latest()` / `changed()`.
//!
//! - **[`Command`]**: typed mutations routed through an `mpsc` channel to
//!   the hub's command processor. Every executed command emits one
//!   [`Notice`].
//!
//! - **Sync adapters** ([`sync`]): SmartThings, ReoLink, Konnected, and a
//!   simulated Enlighten, all committing through one upsert-and-prune pass.
//!
//! - **[`PortScanner`]**: sequential best-effort probe of camera ports.

pub mod command;
pub mod config;
pub mod convert;
pub mod error;
pub mod hub;
pub mod model;
pub mod scan;
pub mod store;
pub mod stream;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::requests::*;
pub use command::{Command, CommandResult};
pub use config::{
    AuthCredentials, CommandDispatch, DisconnectScope, HubConfig, ScanConfig, TlsVerification,
};
pub use error::CoreError;
pub use hub::{ConnectionState, Hub};
pub use scan::{PortResult, PortScanner, PortStatus};
pub use store::{DataStore, MergeOutcome};
pub use stream::{DeviceFilter, EntityStream};
pub use sync::{Fidelity, SyncReport};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ActivityLog, Capabilities, Color, Device, DeviceCategory, DeviceStatus, EnergySample,
    EnergySummary, NightVisionMode, Notice, NoticeLevel, Platform, PlatformKind, PowerState,
    SensorKind,
};
