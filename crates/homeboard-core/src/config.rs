// ── Runtime hub configuration ──
//
// These types describe *how* to reach the backend and how the hub
// behaves. They carry credential data and tuning, but never touch disk.
// The CLI builds a `HubConfig` (usually via homeboard-config) and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// How to obtain a backend identity.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// Email + password sign-in.
    Password { email: String, password: SecretString },
    /// A previously issued access token.
    AccessToken(SecretString),
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict). Default: the backend is a public service.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-hosted backends with self-signed certs).
    DangerAcceptInvalid,
}

/// Where translated vendor commands run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommandDispatch {
    /// Invoke the backend's server-side handlers.
    #[default]
    Remote,
    /// Call the vendor API in-process with the platform's stored token.
    Local,
}

/// Which device rows a platform disconnect removes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisconnectScope {
    /// Every device row owned by the user, regardless of platform.
    #[default]
    AllDevices,
    /// Only devices belonging to the disconnected platform rows.
    PlatformOnly,
}

/// Port scanner tuning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Per-probe timeout for HTTP-family ports.
    pub probe_timeout: Duration,
    /// Fixed delay between consecutive probes.
    pub inter_probe_delay: Duration,
    /// Open a TCP connection to streaming ports instead of assuming open.
    pub tcp_probe_streaming: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(3),
            inter_probe_delay: Duration::from_millis(500),
            tcp_probe_streaming: false,
        }
    }
}

/// Configuration for one hub session against one backend project.
///
/// Built by the CLI, passed to `Hub`. Core never reads config files.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Backend project URL (e.g. `https://abcd.example.co`).
    pub url: Url,
    /// Public project key sent as `apikey`.
    pub anon_key: SecretString,
    pub auth: AuthCredentials,
    pub tls: TlsVerification,
    /// Request timeout for backend calls.
    pub timeout: Duration,
    /// Subscribe to row changes after connecting.
    pub realtime_enabled: bool,
    /// Number of recent activity logs mirrored.
    pub activity_log_limit: usize,
    /// Number of recent energy samples mirrored.
    pub energy_sample_limit: usize,
    pub command_dispatch: CommandDispatch,
    pub disconnect_scope: DisconnectScope,
    pub scan: ScanConfig,
    /// SmartThings REST base used by local dispatch and local sync.
    pub smartthings_base_url: String,
}

impl HubConfig {
    pub const DEFAULT_ACTIVITY_LOG_LIMIT: usize = 50;
    pub const DEFAULT_ENERGY_SAMPLE_LIMIT: usize = 24;

    /// Config with defaults for everything but the endpoint and identity.
    pub fn new(url: Url, anon_key: SecretString, auth: AuthCredentials) -> Self {
        Self {
            url,
            anon_key,
            auth,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            realtime_enabled: true,
            activity_log_limit: Self::DEFAULT_ACTIVITY_LOG_LIMIT,
            energy_sample_limit: Self::DEFAULT_ENERGY_SAMPLE_LIMIT,
            command_dispatch: CommandDispatch::default(),
            disconnect_scope: DisconnectScope::default(),
            scan: ScanConfig::default(),
            smartthings_base_url: homeboard_api::vendor::smartthings::DEFAULT_BASE_URL.to_owned(),
        }
    }
}
