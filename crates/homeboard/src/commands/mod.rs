//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod energy;
pub mod lights;
pub mod logs;
pub mod platforms;
pub mod scan;
pub mod util;
pub mod watch;

use homeboard_core::Hub;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Platforms(args) => platforms::handle(hub, args, global).await,
        Command::Devices(args) => devices::handle(hub, args, global).await,
        Command::Lights(args) => lights::handle(hub, args, global).await,
        Command::Logs(args) => logs::handle(hub, &args, global),
        Command::Energy(args) => energy::handle(hub, &args, global),
        Command::Watch => watch::handle(hub, global).await,
        // Handled before a hub exists
        Command::Config(_) | Command::Completions(_) | Command::Scan(_) => Ok(()),
    }
}
