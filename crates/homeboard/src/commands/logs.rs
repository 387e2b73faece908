//! Activity log handlers.

use tabled::Tabled;

use homeboard_core::{ActivityLog, Hub};

use crate::cli::{GlobalOpts, LogsArgs, LogsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&ActivityLog> for LogRow {
    fn from(log: &ActivityLog) -> Self {
        Self {
            time: output::or_dash(log.timestamp.map(|t| t.format("%Y-%m-%d %H:%M:%S"))),
            action: log.action.clone(),
            device: output::or_dash(log.device_name.as_deref()),
            description: log.description.clone(),
        }
    }
}

pub fn handle(hub: &Hub, args: &LogsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        LogsCommand::List(ref list) => {
            let logs = hub.activity_logs_snapshot();
            // Platform-level entries have no device name; match on the description.
            let rows = util::apply_list_args(logs.iter().cloned(), list, |l| {
                l.description.as_str()
            });
            let out = output::render_list(
                &global.output,
                &rows,
                |l| LogRow::from(l),
                |l| l.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
