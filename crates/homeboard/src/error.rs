//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use homeboard_config::ConfigError;
use homeboard_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the backend at {url}")]
    #[diagnostic(
        code(homeboard::connection_failed),
        help(
            "Check the project URL and your network connection.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(homeboard::auth_failed),
        help(
            "Verify the email and password (or access token) for this profile.\n\
             Store a password with: homeboard config set-secret password"
        )
    )]
    AuthFailed { message: String },

    #[error("No {secret} configured for profile '{profile}'")]
    #[diagnostic(
        code(homeboard::no_credentials),
        help(
            "Configure credentials with: homeboard config init\n\
             Or set HOMEBOARD_ANON_KEY and HOMEBOARD_ACCESS_TOKEN."
        )
    )]
    NoCredentials { profile: String, secret: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(homeboard::not_found),
        help("Run: homeboard {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{message}")]
    #[diagnostic(
        code(homeboard::busy),
        help("Wait for the previous command on this device to finish.")
    )]
    Busy { message: String },

    // ── Backend ──────────────────────────────────────────────────────

    #[error("Backend error ({code}): {message}")]
    #[diagnostic(code(homeboard::api_error))]
    ApiError { code: String, message: String },

    #[error("Operation '{operation}' is not supported: {reason}")]
    #[diagnostic(code(homeboard::unsupported))]
    Unsupported { operation: String, reason: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(homeboard::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(homeboard::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: homeboard config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No backend configured")]
    #[diagnostic(
        code(homeboard::no_config),
        help(
            "Create a profile with: homeboard config init\n\
             Or pass --url and --anon-key. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(homeboard::config))]
    Config(String),

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(homeboard::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(homeboard::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Busy { .. } => exit_code::CONFLICT,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::Disconnected => CliError::ConnectionFailed {
                url: "(disconnected)".into(),
                reason: "the hub is not connected".into(),
            },

            CoreError::NotAuthenticated => CliError::AuthFailed {
                message: "no signed-in user".into(),
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices list".into(),
            },

            CoreError::PlatformNotFound { name } => CliError::NotFound {
                resource_type: "platform".into(),
                identifier: name,
                list_command: "platforms list".into(),
            },

            err @ CoreError::DeviceBusy { .. } => CliError::Busy {
                message: err.to_string(),
            },

            CoreError::Unsupported { operation, reason } => {
                CliError::Unsupported { operation, reason }
            }

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Store { message, code, .. } => CliError::ApiError {
                code: code.unwrap_or_else(|| "store".into()),
                message,
            },

            CoreError::Function { name, message } => CliError::ApiError {
                code: name,
                message,
            },

            CoreError::Vendor { vendor, message } => CliError::ApiError {
                code: vendor,
                message,
            },

            CoreError::Config { message } => CliError::Config(message),

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile, secret } => {
                CliError::NoCredentials { profile, secret }
            }
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other.to_string()),
        }
    }
}
