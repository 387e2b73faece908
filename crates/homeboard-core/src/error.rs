// ── Core error types ──
//
// User-facing errors from homeboard-core. Consumers never see HTTP
// status codes or JSON parse failures directly. The
// `From<homeboard_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Identity ─────────────────────────────────────────────────────
    #[error("Not signed in -- a user identity is required")]
    NotAuthenticated,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Cannot reach backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Hub is not connected")]
    Disconnected,

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Platform not found: {name}")]
    PlatformNotFound { name: String },

    #[error("Device {identifier} is already being updated")]
    DeviceBusy { identifier: String },

    // ── Operation ────────────────────────────────────────────────────
    #[error("Operation not supported: {operation} ({reason})")]
    Unsupported { operation: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Remote failures (wrapped, not exposed raw) ───────────────────
    #[error("Store error: {message}")]
    Store {
        message: String,
        code: Option<String>,
        status: Option<u16>,
    },

    #[error("Server function '{name}' failed: {message}")]
    Function { name: String, message: String },

    #[error("{vendor} integration failed: {message}")]
    Vendor { vendor: String, message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn unsupported(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<homeboard_api::Error> for CoreError {
    fn from(err: homeboard_api::Error) -> Self {
        use homeboard_api::Error as Api;
        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::NotAuthenticated => CoreError::NotAuthenticated,
            Api::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- sign in again".into(),
            },
            Api::Transport(ref e) => {
                if e.is_connect() || e.is_timeout() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Store {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            Api::Store {
                message,
                code,
                status,
            } => CoreError::Store {
                message,
                code,
                status: Some(status),
            },
            Api::Function { name, message, .. } => CoreError::Function { name, message },
            Api::Vendor {
                vendor, message, ..
            } => CoreError::Vendor {
                vendor: vendor.to_owned(),
                message,
            },
            Api::RealtimeConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Realtime connection failed: {reason}"),
            },
            Api::RealtimeClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Realtime closed (code {code}): {reason}"),
            },
            Api::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
