//! Shared configuration for the homeboard CLI.
//!
//! TOML profiles, secret resolution (env + keyring + plaintext), and
//! translation to `homeboard_core::HubConfig`. The CLI layers its global
//! flags on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use homeboard_core::{
    AuthCredentials, CommandDispatch, DisconnectScope, HubConfig, ScanConfig, TlsVerification,
};

/// Service name under which secrets live in the system keyring.
pub const KEYRING_SERVICE: &str = "homeboard";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {secret} configured for profile '{profile}'")]
    NoCredentials { profile: String, secret: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// The profile name in effect when none is given explicitly.
    pub fn active_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or("default")
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_auth_mode() -> String {
    "password".into()
}
fn default_true() -> bool {
    true
}

/// A named backend profile.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Backend project URL (e.g. "https://abc.supabase.co").
    pub url: String,

    /// Public anon key (plaintext; prefer keyring or env var).
    pub anon_key: Option<String>,

    /// Environment variable holding the anon key.
    pub anon_key_env: Option<String>,

    /// Auth mode: "password" or "token".
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,

    pub email: Option<String>,

    /// Password (plaintext; prefer keyring).
    pub password: Option<String>,

    /// Access token for token mode (plaintext; prefer keyring).
    pub access_token: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    #[serde(default)]
    pub insecure: bool,

    pub timeout: Option<u64>,

    /// Subscribe to realtime changes in long-running commands.
    #[serde(default = "default_true")]
    pub realtime: bool,

    /// "remote" (server-side handlers) or "local" (in-process vendor calls).
    pub command_dispatch: Option<String>,

    /// "all" or "platform".
    pub disconnect_scope: Option<String>,

    pub activity_log_limit: Option<usize>,
    pub energy_sample_limit: Option<usize>,

    /// SmartThings REST base override.
    pub smartthings_base_url: Option<String>,

    #[serde(default)]
    pub scan: ScanSettings,
}

/// Scanner tuning, in milliseconds.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct ScanSettings {
    pub probe_timeout_ms: Option<u64>,
    pub inter_probe_delay_ms: Option<u64>,
    #[serde(default)]
    pub tcp_probe_streaming: bool,
}

impl ScanSettings {
    pub fn to_scan_config(&self) -> ScanConfig {
        let defaults = ScanConfig::default();
        ScanConfig {
            probe_timeout: self
                .probe_timeout_ms
                .map_or(defaults.probe_timeout, Duration::from_millis),
            inter_probe_delay: self
                .inter_probe_delay_ms
                .map_or(defaults.inter_probe_delay, Duration::from_millis),
            tcp_probe_streaming: self.tcp_probe_streaming,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "homeboard", "homeboard").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("homeboard");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields defaults.
///
/// Environment keys use `__` as the nesting separator, e.g.
/// `HOMEBOARD_PROFILES__HOME__URL`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HOMEBOARD_").split("__"));

    Ok(figment.extract()?)
}

/// Load config, returning a default if the file is missing or invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Secret resolution ───────────────────────────────────────────────

/// Secrets a profile can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    AnonKey,
    Password,
    AccessToken,
}

impl SecretKind {
    /// Keyring account suffix: `{profile}/{suffix}`.
    pub fn keyring_suffix(self) -> &'static str {
        match self {
            Self::AnonKey => "anon-key",
            Self::Password => "password",
            Self::AccessToken => "access-token",
        }
    }

    /// Fallback environment variable.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::AnonKey => "HOMEBOARD_ANON_KEY",
            Self::Password => "HOMEBOARD_PASSWORD",
            Self::AccessToken => "HOMEBOARD_ACCESS_TOKEN",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::AnonKey => "anon key",
            Self::Password => "password",
            Self::AccessToken => "access token",
        }
    }

    fn plaintext(self, profile: &Profile) -> Option<&str> {
        match self {
            Self::AnonKey => profile.anon_key.as_deref(),
            Self::Password => profile.password.as_deref(),
            Self::AccessToken => profile.access_token.as_deref(),
        }
    }

    fn profile_env(self, profile: &Profile) -> Option<&str> {
        match self {
            Self::AnonKey => profile.anon_key_env.as_deref(),
            Self::Password | Self::AccessToken => None,
        }
    }
}

/// Keyring entry for one profile secret.
pub fn keyring_entry(profile_name: &str, kind: SecretKind) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/{}", kind.keyring_suffix()),
    )
}

/// Resolve a secret from the chain: profile env var, fixed env var,
/// system keyring, then plaintext in the profile.
pub fn resolve_secret(
    profile: &Profile,
    profile_name: &str,
    kind: SecretKind,
) -> Result<SecretString, ConfigError> {
    let env_names = kind.profile_env(profile).into_iter().chain([kind.env_var()]);
    for name in env_names {
        if let Ok(val) = std::env::var(name) {
            if !val.is_empty() {
                return Ok(SecretString::from(val));
            }
        }
    }

    if let Ok(entry) = keyring_entry(profile_name, kind) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    if let Some(value) = kind.plaintext(profile).filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_owned()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
        secret: kind.label().into(),
    })
}

/// Resolve `AuthCredentials` from a profile's `auth_mode` field.
pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<AuthCredentials, ConfigError> {
    match profile.auth_mode.as_str() {
        "password" => {
            let email = profile
                .email
                .clone()
                .or_else(|| std::env::var("HOMEBOARD_EMAIL").ok())
                .ok_or_else(|| ConfigError::NoCredentials {
                    profile: profile_name.into(),
                    secret: "email".into(),
                })?;
            let password = resolve_secret(profile, profile_name, SecretKind::Password)?;
            Ok(AuthCredentials::Password { email, password })
        }
        "token" => Ok(AuthCredentials::AccessToken(resolve_secret(
            profile,
            profile_name,
            SecretKind::AccessToken,
        )?)),
        other => Err(ConfigError::Validation {
            field: "auth_mode".into(),
            reason: format!("expected 'password' or 'token', got '{other}'"),
        }),
    }
}

pub fn parse_dispatch(raw: &str) -> Result<CommandDispatch, ConfigError> {
    match raw {
        "remote" => Ok(CommandDispatch::Remote),
        "local" => Ok(CommandDispatch::Local),
        other => Err(ConfigError::Validation {
            field: "command_dispatch".into(),
            reason: format!("expected 'remote' or 'local', got '{other}'"),
        }),
    }
}

pub fn parse_disconnect_scope(raw: &str) -> Result<DisconnectScope, ConfigError> {
    match raw {
        "all" => Ok(DisconnectScope::AllDevices),
        "platform" => Ok(DisconnectScope::PlatformOnly),
        other => Err(ConfigError::Validation {
            field: "disconnect_scope".into(),
            reason: format!("expected 'all' or 'platform', got '{other}'"),
        }),
    }
}

/// Build a `HubConfig` from a profile, with no flag overrides.
pub fn profile_to_hub_config(profile: &Profile, profile_name: &str) -> Result<HubConfig, ConfigError> {
    let url: url::Url = profile.url.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {}", profile.url),
    })?;

    let anon_key = resolve_secret(profile, profile_name, SecretKind::AnonKey)?;
    let auth = resolve_auth(profile, profile_name)?;

    let mut config = HubConfig::new(url, anon_key, auth);
    config.tls = if profile.insecure {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or_else(default_timeout));
    config.realtime_enabled = profile.realtime;
    if let Some(ref raw) = profile.command_dispatch {
        config.command_dispatch = parse_dispatch(raw)?;
    }
    if let Some(ref raw) = profile.disconnect_scope {
        config.disconnect_scope = parse_disconnect_scope(raw)?;
    }
    if let Some(limit) = profile.activity_log_limit {
        config.activity_log_limit = limit;
    }
    if let Some(limit) = profile.energy_sample_limit {
        config.energy_sample_limit = limit;
    }
    if let Some(ref base) = profile.smartthings_base_url {
        config.smartthings_base_url.clone_from(base);
    }
    config.scan = profile.scan.to_scan_config();
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn token_profile() -> Profile {
        Profile {
            url: "https://abc.example.co".into(),
            anon_key: Some("anon".into()),
            auth_mode: "token".into(),
            access_token: Some("tok".into()),
            realtime: true,
            ..Profile::default()
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.active_profile_name(), "default");
        assert_eq!(cfg.defaults.output, "table");
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config {
            default_profile: Some("home".into()),
            ..Config::default()
        };
        cfg.profiles.insert("home".into(), token_profile());
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.active_profile_name(), "home");
        assert_eq!(loaded.profiles["home"].url, "https://abc.example.co");
        assert_eq!(loaded.profiles["home"].auth_mode, "token");
    }

    #[test]
    fn profile_fields_default_when_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[profiles.home]\nurl = \"https://abc.example.co\"\n\n[profiles.home.scan]\ntcp_probe_streaming = true\n",
        )
        .unwrap();
        let profile = &load_config_from(&path).unwrap().profiles["home"];
        assert_eq!(profile.auth_mode, "password");
        assert!(profile.realtime);
        assert!(profile.scan.tcp_probe_streaming);
    }

    #[test]
    fn token_profile_translates_to_hub_config() {
        let mut profile = token_profile();
        profile.command_dispatch = Some("local".into());
        profile.disconnect_scope = Some("platform".into());
        profile.scan.probe_timeout_ms = Some(750);

        let config = profile_to_hub_config(&profile, "hb-test-translate").unwrap();
        assert_eq!(config.url.as_str(), "https://abc.example.co/");
        assert_eq!(config.command_dispatch, CommandDispatch::Local);
        assert_eq!(config.disconnect_scope, DisconnectScope::PlatformOnly);
        assert_eq!(config.scan.probe_timeout, Duration::from_millis(750));
        assert_eq!(config.tls, TlsVerification::SystemDefaults);
        assert!(matches!(
            config.auth,
            AuthCredentials::AccessToken(ref t) if t.expose_secret() == "tok"
        ));
    }

    #[test]
    fn unknown_values_are_rejected() {
        let mut profile = token_profile();
        profile.auth_mode = "oauth".into();
        assert!(matches!(
            resolve_auth(&profile, "hb-test-mode"),
            Err(ConfigError::Validation { ref field, .. }) if field == "auth_mode"
        ));
        assert!(parse_dispatch("cloud").is_err());
        assert!(parse_disconnect_scope("some").is_err());
    }

    #[test]
    fn invalid_url_is_a_validation_error() {
        let mut profile = token_profile();
        profile.url = "not a url".into();
        let err = profile_to_hub_config(&profile, "hb-test-url").unwrap_err();
        assert!(err.to_string().contains("invalid url"));
    }
}
