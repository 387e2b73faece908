//! Platform command handlers.

use std::sync::Arc;

use tabled::Tabled;

use homeboard_core::{
    Command as CoreCommand, CommandResult, ConnectPlatformRequest, Hub, Platform, PlatformKind,
    SyncReport,
};

use crate::cli::{GlobalOpts, PlatformsArgs, PlatformsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct PlatformRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Connected")]
    connected: String,
    #[tabled(rename = "Last Sync")]
    last_sync: String,
}

impl From<&Arc<Platform>> for PlatformRow {
    fn from(p: &Arc<Platform>) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            kind: p.kind.to_string(),
            connected: if p.is_connected { "yes" } else { "no" }.into(),
            last_sync: output::or_dash(p.last_sync.map(|t| t.format("%Y-%m-%d %H:%M"))),
        }
    }
}

fn detail(p: &Platform) -> String {
    [
        format!("ID:        {}", p.id),
        format!("Name:      {}", p.name),
        format!("Type:      {}", p.kind),
        format!("Connected: {}", p.is_connected),
        format!("Last sync: {}", output::or_dash(p.last_sync)),
        format!("Created:   {}", output::or_dash(p.created_at)),
    ]
    .join("\n")
}

fn sync_detail(r: &SyncReport) -> String {
    let mut lines = vec![
        format!("Platform:  {} ({})", r.platform_name, r.kind),
        format!("Fidelity:  {}", r.fidelity),
        format!("Reachable: {}", r.reachable),
        format!("Upserted:  {}", r.devices_upserted),
        format!("Removed:   {}", r.devices_pruned),
    ];
    if r.energy_samples > 0 {
        lines.push(format!("Energy:    {} sample(s)", r.energy_samples));
    }
    if r.remote {
        lines.push("Committed by the server-side handler".into());
    }
    if let Some(ref note) = r.note {
        lines.push(format!("Note:      {}", note.lines().next().unwrap_or_default()));
    }
    lines.join("\n")
}

pub async fn handle(hub: &Hub, args: PlatformsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        PlatformsCommand::List(list) => {
            let all = hub.platforms_snapshot();
            let rows = util::apply_list_args(all.iter().cloned(), &list, |p| p.name.as_str());
            let out = output::render_list(
                &global.output,
                &rows,
                |p| PlatformRow::from(p),
                |p| p.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PlatformsCommand::Connect {
            kind,
            name,
            credentials,
        } => {
            let credentials: serde_json::Value = serde_json::from_str(&credentials)?;
            if !credentials.is_object() {
                return Err(CliError::Validation {
                    field: "credentials".into(),
                    reason: "expected a JSON object".into(),
                });
            }
            let result = hub
                .execute(CoreCommand::ConnectPlatform(ConnectPlatformRequest {
                    name,
                    kind: PlatformKind::from(kind.as_str()),
                    credentials,
                }))
                .await?;
            if let CommandResult::Platform(ref platform) = result {
                let out = output::render_single(&global.output, platform, detail, |p| {
                    p.id.to_string()
                });
                output::print_output(&out, global.quiet);
            }
            Ok(())
        }

        PlatformsCommand::Disconnect { name } => {
            if !util::confirm(
                &format!("Disconnect '{name}' and remove its device rows?"),
                global,
            )? {
                return Ok(());
            }
            let result = hub
                .execute(CoreCommand::DisconnectPlatform { name })
                .await?;
            util::report(&result, global);
            Ok(())
        }

        PlatformsCommand::Cleanup { name } => {
            let result = hub
                .execute(CoreCommand::CleanupDuplicates { name })
                .await?;
            util::report(&result, global);
            Ok(())
        }

        PlatformsCommand::Sync { platform } => {
            let platform = util::resolve_platform(hub, &platform)?;
            let spinner = (!global.quiet).then(|| {
                let bar = indicatif::ProgressBar::new_spinner();
                bar.set_message(format!("Syncing {}", platform.name));
                bar.enable_steady_tick(std::time::Duration::from_millis(100));
                bar
            });
            let result = hub
                .execute(CoreCommand::SyncPlatform {
                    platform_id: platform.id,
                })
                .await;
            if let Some(bar) = spinner {
                bar.finish_and_clear();
            }
            if let CommandResult::Synced(ref report) = result? {
                let out = output::render_single(&global.output, report, sync_detail, |r| {
                    r.devices_upserted.to_string()
                });
                output::print_output(&out, global.quiet);
            }
            Ok(())
        }

        PlatformsCommand::Clear => {
            if !util::confirm("Delete every platform and device row?", global)? {
                return Ok(());
            }
            let result = hub.execute(CoreCommand::ClearAllPlatforms).await?;
            util::report(&result, global);
            Ok(())
        }
    }
}
