//! Clap derive structures for the `homeboard` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// homeboard -- smart-home dashboard from the command line
#[derive(Debug, Parser)]
#[command(
    name = "homeboard",
    version,
    about = "Control and sync your smart-home dashboard from the command line",
    long_about = "Reads and writes the homeboard backend: platforms, devices,\n\
        activity history and energy samples. Runs platform syncs for\n\
        SmartThings, ReoLink, Konnected and Enphase Enlighten.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "HOMEBOARD_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Backend project URL (overrides profile)
    #[arg(long, short = 'u', env = "HOMEBOARD_URL", global = true)]
    pub url: Option<String>,

    /// Public anon key
    #[arg(long, env = "HOMEBOARD_ANON_KEY", global = true, hide_env_values = true)]
    pub anon_key: Option<String>,

    /// Access token (skips password sign-in)
    #[arg(long, env = "HOMEBOARD_ACCESS_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HOMEBOARD_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "HOMEBOARD_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (profile value, else 30)
    #[arg(long, env = "HOMEBOARD_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage connected platforms
    #[command(alias = "pl")]
    Platforms(PlatformsArgs),

    /// List and control devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Whole-house light controls
    Lights(LightsArgs),

    /// View the activity history
    Logs(LogsArgs),

    /// Show recent energy usage and solar generation
    Energy(EnergyArgs),

    /// Probe a camera's well-known ports
    Scan(ScanArgs),

    /// Stream notices and device changes until interrupted
    Watch,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared List Arguments ────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Max rows to show
    #[arg(long, short = 'l')]
    pub limit: Option<usize>,

    /// Case-insensitive substring match on the name
    #[arg(long, short = 'f')]
    pub filter: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PLATFORMS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PlatformsArgs {
    #[command(subcommand)]
    pub command: PlatformsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PlatformsCommand {
    /// List platform rows
    #[command(alias = "ls")]
    List(ListArgs),

    /// Connect a new platform
    Connect {
        /// Platform type: smartthings, reolink, konnected, enlighten
        #[arg(value_name = "TYPE")]
        kind: String,

        /// Display name (defaults to the platform's label)
        #[arg(long, short = 'n')]
        name: Option<String>,

        /// Credentials as a JSON object
        #[arg(long, short = 'c', value_name = "JSON", default_value = "{}")]
        credentials: String,
    },

    /// Remove all rows with this display name, and their devices
    Disconnect {
        /// Platform display name
        name: String,
    },

    /// Keep only the newest row with this display name
    Cleanup {
        /// Platform display name
        name: String,
    },

    /// Run a sync pass for one platform
    Sync {
        /// Platform id (UUID) or display name
        platform: String,
    },

    /// Delete every platform and device row
    Clear,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        list: ListArgs,

        /// Only devices of this platform
        #[arg(long)]
        platform: Option<String>,

        /// Only devices in this room
        #[arg(long)]
        room: Option<String>,

        /// Only devices that are on
        #[arg(long)]
        on: bool,
    },

    /// Show one device
    Get {
        /// Device id (UUID), external id, or name
        device: String,
    },

    /// Flip a light or switch
    Toggle {
        /// Device id (UUID), external id, or name
        device: String,
    },

    /// Set a light's brightness
    Brightness {
        device: String,

        /// 0-100
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        level: u8,
    },

    /// Set a light's color
    Color {
        device: String,

        /// Hue, 0-100
        hue: f64,

        /// Saturation, 0-100
        saturation: f64,
    },

    /// Change a thermostat's setpoint and/or mode
    Thermostat {
        device: String,

        /// Target temperature
        #[arg(long)]
        setpoint: Option<f64>,

        /// Mode (heat, cool, auto, off)
        #[arg(long)]
        mode: Option<String>,
    },

    /// Lock a lock
    Lock { device: String },

    /// Unlock a lock
    Unlock { device: String },

    /// Move a camera's PTZ control
    Ptz {
        device: String,

        /// up, down, left, right, zoom_in, zoom_out, home
        direction: String,
    },

    /// Set a camera's night-vision mode
    NightVision {
        device: String,

        /// auto, on, off
        mode: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LIGHTS / LOGS / ENERGY / SCAN
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LightsArgs {
    #[command(subcommand)]
    pub command: LightsCommand,
}

#[derive(Debug, Subcommand)]
pub enum LightsCommand {
    /// Turn off every light that is on
    Off,
}

#[derive(Debug, Args)]
pub struct LogsArgs {
    #[command(subcommand)]
    pub command: LogsCommand,
}

#[derive(Debug, Subcommand)]
pub enum LogsCommand {
    /// Most recent activity, newest first
    #[command(alias = "ls")]
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct EnergyArgs {
    /// Print the totals only
    #[arg(long, short = 's')]
    pub summary: bool,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Camera host or IP (a URL is accepted)
    pub host: String,

    /// Open TCP connections to streaming ports instead of assuming open
    #[arg(long)]
    pub tcp: bool,

    /// Per-probe timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub probe_timeout: Option<u64>,

    /// Delay between probes in milliseconds
    #[arg(long, value_name = "MS")]
    pub delay: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a secret in the system keyring
    SetSecret {
        /// Which secret: anon-key, password, access-token
        #[arg(value_name = "KIND")]
        kind: SecretArg,

        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SecretArg {
    AnonKey,
    Password,
    AccessToken,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
