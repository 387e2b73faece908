mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use homeboard_core::Hub;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Local-only commands never touch the backend
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "homeboard", &mut std::io::stdout());
            Ok(())
        }

        Command::Scan(args) => commands::scan::handle(args, &cli.global).await,

        // Long-running: keeps the realtime subscription if the profile enables it
        Command::Watch => {
            let hub_config = config::build_hub_config(&cli.global)?;
            let hub = Hub::new(hub_config)?;
            hub.connect().await?;
            let result = commands::watch::handle(&hub, &cli.global).await;
            hub.disconnect().await;
            result
        }

        cmd => {
            let mut hub_config = config::build_hub_config(&cli.global)?;
            hub_config.realtime_enabled = false;
            let hub = Hub::new(hub_config)?;
            hub.connect().await?;

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &hub, &cli.global).await;
            hub.disconnect().await;
            result
        }
    }
}
