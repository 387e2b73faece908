//! Port scan handler. Runs without a backend connection.

use std::time::Duration;

use tabled::Tabled;

use homeboard_core::{PortResult, PortScanner, ScanConfig};

use crate::cli::{GlobalOpts, ScanArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct PortRow {
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "Service")]
    label: &'static str,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&PortResult> for PortRow {
    fn from(r: &PortResult) -> Self {
        Self {
            port: r.port,
            label: r.label,
            status: r.status.to_string(),
        }
    }
}

pub async fn handle(args: ScanArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Profile scan settings, when present, seed the flag defaults.
    let cfg = config::load_config_or_default();
    let defaults = cfg
        .profiles
        .get(&config::active_profile_name(global, &cfg))
        .map_or_else(ScanConfig::default, |p| p.scan.to_scan_config());
    let config = ScanConfig {
        probe_timeout: args
            .probe_timeout
            .map_or(defaults.probe_timeout, Duration::from_millis),
        inter_probe_delay: args
            .delay
            .map_or(defaults.inter_probe_delay, Duration::from_millis),
        tcp_probe_streaming: args.tcp || defaults.tcp_probe_streaming,
    };
    let scanner = PortScanner::new(config)?;

    let spinner = (!global.quiet).then(|| {
        let bar = indicatif::ProgressBar::new_spinner();
        bar.set_message(format!("Scanning {}", args.host));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    });
    let results = scanner.scan(Some(&args.host)).await;
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    let out = output::render_list(
        &global.output,
        &results,
        |r| PortRow::from(r),
        |r| format!("{} {}", r.port, r.status),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
