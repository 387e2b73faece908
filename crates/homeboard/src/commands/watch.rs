//! Live view: notices and device changes until Ctrl-C.

use std::collections::HashMap;

use uuid::Uuid;

use homeboard_core::Hub;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn handle(hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    let mut notices = hub.notices();
    let mut devices = hub.devices();
    let mut state = hub.connection_state();

    // Last printed status summary per device, so unchanged rows stay quiet.
    let mut seen: HashMap<Uuid, String> = devices
        .current()
        .iter()
        .map(|d| (d.id, d.typed_status().summary()))
        .collect();

    if !global.quiet {
        eprintln!("Watching {} device(s). Press Ctrl-C to stop.", seen.len());
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            notice = notices.recv() => match notice {
                Ok(n) => output::print_notice(&n, &global.color, global.quiet),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "notice stream lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },

            snapshot = devices.changed() => {
                let Some(snapshot) = snapshot else { break };
                for d in snapshot.iter() {
                    let summary = d.typed_status().summary();
                    if seen.get(&d.id) != Some(&summary) {
                        output::print_output(&format!("{}: {summary}", d.name), global.quiet);
                        seen.insert(d.id, summary);
                    }
                }
            }

            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state.borrow_and_update().clone();
                tracing::info!(state = ?current, "connection state changed");
            }
        }
    }
    Ok(())
}
