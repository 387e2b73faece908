//! Config subcommand handlers.

use std::fmt::Write;

use dialoguer::{Input, Password, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, SecretArg};
use crate::config::{self, Config, Profile, SecretKind};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// A copy of `cfg` with every plaintext secret masked.
fn redacted(cfg: &Config) -> Config {
    let mask = |s: &Option<String>| s.as_ref().map(|_| MASK.to_owned());
    let profiles = cfg
        .profiles
        .iter()
        .map(|(name, p)| {
            let mut p = p.clone();
            p.anon_key = mask(&p.anon_key);
            p.password = mask(&p.password);
            p.access_token = mask(&p.access_token);
            (name.clone(), p)
        })
        .collect();
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: config::Defaults {
            output: cfg.defaults.output.clone(),
            color: cfg.defaults.color.clone(),
            timeout: cfg.defaults.timeout,
        },
        profiles,
    }
}

fn format_config(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "url = \"{}\"", p.url);
        let _ = writeln!(out, "auth_mode = \"{}\"", p.auth_mode);
        let optional = [
            ("anon_key", p.anon_key.as_deref()),
            ("anon_key_env", p.anon_key_env.as_deref()),
            ("email", p.email.as_deref()),
            ("password", p.password.as_deref()),
            ("access_token", p.access_token.as_deref()),
            ("command_dispatch", p.command_dispatch.as_deref()),
            ("disconnect_scope", p.disconnect_scope.as_deref()),
            ("smartthings_base_url", p.smartthings_base_url.as_deref()),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                let _ = writeln!(out, "{key} = \"{v}\"");
            }
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if p.insecure {
            let _ = writeln!(out, "insecure = true");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if !p.realtime {
            let _ = writeln!(out, "realtime = false");
        }
    }

    out
}

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn keyring_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "keyring".into(),
        reason: e.to_string(),
    }
}

fn profile_not_found(cfg: &Config, name: String) -> CliError {
    let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
    available.sort();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

fn prompt_secret(label: &str) -> Result<String, CliError> {
    let secret = Password::new()
        .with_prompt(label)
        .interact()
        .map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: label.to_lowercase(),
            reason: "value cannot be empty".into(),
        });
    }
    Ok(secret)
}

fn store_in_keyring(profile_name: &str, kind: SecretKind, secret: &str) -> Result<(), CliError> {
    config::keyring_entry(profile_name, kind)
        .and_then(|entry| entry.set_password(secret))
        .map_err(keyring_err)
}

/// Offer keyring or plaintext storage.
///
/// Returns `Some(secret)` for plaintext, `None` once stored in the keyring.
fn prompt_storage(
    profile_name: &str,
    kind: SecretKind,
    secret: String,
    label: &str,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt(format!("Where to store the {label}?"))
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        store_in_keyring(profile_name, kind, &secret)?;
        eprintln!("   ✓ {label} stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(secret))
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config, |_| {
                "config".into()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.active_profile_name();
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: homeboard config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(&cfg, name));
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetSecret { kind, profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(profile_not_found(&cfg, profile_name));
            }

            let (kind, label) = match kind {
                SecretArg::AnonKey => (SecretKind::AnonKey, "Anon key"),
                SecretArg::Password => (SecretKind::Password, "Password"),
                SecretArg::AccessToken => (SecretKind::AccessToken, "Access token"),
            };
            let secret = prompt_secret(label)?;
            store_in_keyring(&profile_name, kind, &secret)?;
            eprintln!("✓ {label} stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

fn init() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("homeboard configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let url: String = Input::new()
        .with_prompt("Backend project URL")
        .interact_text()
        .map_err(prompt_err)?;
    url::Url::parse(&url).map_err(|e| CliError::Validation {
        field: "url".into(),
        reason: e.to_string(),
    })?;

    let anon_key = prompt_secret("Anon key")?;
    let anon_key = prompt_storage(&profile_name, SecretKind::AnonKey, anon_key, "anon key")?;

    let auth_choices = &["Email and password", "Access token"];
    let auth_selection = Select::new()
        .with_prompt("Authentication method")
        .items(auth_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let mut profile = Profile {
        url,
        anon_key,
        realtime: true,
        ..Profile::default()
    };

    if auth_selection == 0 {
        let email: String = Input::new()
            .with_prompt("Email")
            .interact_text()
            .map_err(prompt_err)?;
        let password = prompt_secret("Password")?;
        profile.auth_mode = "password".into();
        profile.email = Some(email);
        profile.password = prompt_storage(&profile_name, SecretKind::Password, password, "password")?;
    } else {
        let token = prompt_secret("Access token")?;
        profile.auth_mode = "token".into();
        profile.access_token =
            prompt_storage(&profile_name, SecretKind::AccessToken, token, "access token")?;
    }

    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());

    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: homeboard platforms list");
    Ok(())
}
