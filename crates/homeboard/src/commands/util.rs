//! Shared helpers for command handlers.

use std::sync::Arc;

use uuid::Uuid;

use homeboard_core::{CommandResult, Device, Hub, Platform};

use crate::cli::{GlobalOpts, ListArgs};
use crate::error::CliError;

/// Resolve a device by UUID, external id, or name.
pub fn resolve_device(hub: &Hub, identifier: &str) -> Result<Arc<Device>, CliError> {
    hub.store()
        .find_device(identifier)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "device".into(),
            identifier: identifier.into(),
            list_command: "devices list".into(),
        })
}

/// Resolve a platform by UUID, or the newest row with that display name.
pub fn resolve_platform(hub: &Hub, identifier: &str) -> Result<Arc<Platform>, CliError> {
    let store = hub.store();
    let found = match identifier.parse::<Uuid>() {
        Ok(id) => store.platform_by_id(&id),
        Err(_) => store.platforms_named(identifier).into_iter().next(),
    };
    found.ok_or_else(|| CliError::NotFound {
        resource_type: "platform".into(),
        identifier: identifier.into(),
        list_command: "platforms list".into(),
    })
}

/// Apply `--filter` (name substring) and `--limit` to a list.
pub fn apply_list_args<T>(
    items: impl IntoIterator<Item = T>,
    list: &ListArgs,
    name_of: impl Fn(&T) -> &str,
) -> Vec<T> {
    let needle = list.filter.as_deref().map(str::to_lowercase);
    items
        .into_iter()
        .filter(|item| {
            needle
                .as_deref()
                .is_none_or(|n| name_of(item).to_lowercase().contains(n))
        })
        .take(list.limit.unwrap_or(usize::MAX))
        .collect()
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, global: &GlobalOpts) -> Result<bool, CliError> {
    if global.yes {
        return Ok(true);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Print a command's summary line unless quiet.
pub fn report(result: &CommandResult, global: &GlobalOpts) {
    if !global.quiet {
        eprintln!("{}", result.summary());
    }
}
