//! CLI configuration: thin wrapper around `homeboard_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--url, --anon-key, --token, --insecure, --timeout).

use std::time::Duration;

use secrecy::SecretString;

use homeboard_core::{AuthCredentials, HubConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use homeboard_config::{
    Config, Defaults, Profile, SecretKind, config_path, keyring_entry, load_config_or_default, save_config,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.active_profile_name().to_owned())
}

/// Build a `HubConfig` from the config file, profile, and CLI overrides.
pub fn build_hub_config(global: &GlobalOpts) -> Result<HubConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return resolve_profile(profile, &profile_name, global);
    }
    if global.profile.is_some() {
        let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: if names.is_empty() {
                "(none)".into()
            } else {
                names.join(", ")
            },
        });
    }

    // No profile: build from flags and env alone, token auth only.
    let url_str = global.url.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let url = parse_url(url_str)?;
    let anon_key = global
        .anon_key
        .clone()
        .map(SecretString::from)
        .ok_or_else(|| CliError::NoCredentials {
            profile: profile_name.clone(),
            secret: "anon key".into(),
        })?;
    let token = global
        .token
        .clone()
        .map(SecretString::from)
        .ok_or_else(|| CliError::NoCredentials {
            profile: profile_name,
            secret: "access token".into(),
        })?;

    let mut config = HubConfig::new(url, anon_key, AuthCredentials::AccessToken(token));
    apply_flag_overrides(&mut config, global);
    Ok(config)
}

/// Translate a `Profile` + global flags into a `HubConfig`.
///
/// Flag values take priority over profile values.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<HubConfig, CliError> {
    let mut merged = profile.clone();
    if let Some(ref url) = global.url {
        merged.url.clone_from(url);
    }
    if let Some(ref key) = global.anon_key {
        merged.anon_key = Some(key.clone());
    }
    if let Some(ref token) = global.token {
        merged.auth_mode = "token".into();
        merged.access_token = Some(token.clone());
    }
    let mut config = homeboard_config::profile_to_hub_config(&merged, profile_name)?;
    // The keyring would otherwise win over the flag values seeded above.
    if let Some(ref key) = global.anon_key {
        config.anon_key = SecretString::from(key.clone());
    }
    if let Some(ref token) = global.token {
        config.auth = AuthCredentials::AccessToken(SecretString::from(token.clone()));
    }
    apply_flag_overrides(&mut config, global);
    Ok(config)
}

fn apply_flag_overrides(config: &mut HubConfig, global: &GlobalOpts) {
    if let Some(secs) = global.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    if global.insecure {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }
}

fn parse_url(raw: &str) -> Result<url::Url, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {raw}"),
    })
}
