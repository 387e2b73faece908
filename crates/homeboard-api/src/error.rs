use thiserror::Error;

/// Top-level error type for the `homeboard-api` crate.
///
/// Covers every failure mode across all API surfaces: backend auth, row
/// storage, serverless functions, the realtime socket, and vendor devices.
/// `homeboard-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Sign-in rejected (wrong password, unconfirmed email, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// A call needed a user identity but no session is held.
    #[error("Not authenticated -- sign in first")]
    NotAuthenticated,

    /// Access token expired or was revoked.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Row storage ─────────────────────────────────────────────────
    /// Structured error from the row API (`{code, message, details, hint}`).
    #[error("Store error (HTTP {status}): {message}")]
    Store {
        message: String,
        code: Option<String>,
        status: u16,
    },

    // ── Serverless functions ────────────────────────────────────────
    /// A server-side handler returned a failure.
    #[error("Function '{name}' failed (HTTP {status}): {message}")]
    Function {
        name: String,
        message: String,
        status: u16,
    },

    // ── Vendor APIs ─────────────────────────────────────────────────
    /// A vendor API or LAN device answered with an error.
    #[error("{vendor} error (HTTP {status}): {message}")]
    Vendor {
        vendor: &'static str,
        message: String,
        status: u16,
    },

    // ── Realtime ────────────────────────────────────────────────────
    /// Realtime socket could not be established.
    #[error("Realtime connection failed: {0}")]
    RealtimeConnect(String),

    /// Realtime socket closed unexpectedly.
    #[error("Realtime closed (code {code}): {reason}")]
    RealtimeClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates auth has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::SessionExpired | Self::NotAuthenticated
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::RealtimeConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Store { status: 404, .. }
            | Self::Function { status: 404, .. }
            | Self::Vendor { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the request never reached the remote end
    /// (refused connection, DNS failure, timeout).
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }

    /// Extract the store error code, if available.
    pub fn api_error_code(&self) -> Option<&str> {
        match self {
            Self::Store { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
