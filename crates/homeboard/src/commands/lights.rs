//! Whole-house light handlers.

use homeboard_core::{Command as CoreCommand, Hub};

use crate::cli::{GlobalOpts, LightsArgs, LightsCommand};
use crate::error::CliError;

use super::util;

pub async fn handle(hub: &Hub, args: LightsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        LightsCommand::Off => {
            let result = hub.execute(CoreCommand::TurnOffAllLights).await?;
            util::report(&result, global);
            Ok(())
        }
    }
}
