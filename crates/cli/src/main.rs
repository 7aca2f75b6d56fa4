// containersync CLI entry point.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use containersync_engine::config::EngineConfig;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_code;
mod output;
mod session;

use exit_code::ExitCode;
use output::OutputFormat;
use session::CommandContext;

#[derive(Parser)]
#[command(
    name = "containersync",
    about = "Reconcile container identities and site assignments with sync storage"
)]
struct Cli {
    /// Config file (defaults to `~/.containersync/config.toml`).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Local state file (overrides the config).
    #[arg(long, global = true, value_name = "PATH")]
    local: Option<PathBuf>,

    /// Remote sync state file (overrides the config).
    #[arg(long, global = true, value_name = "PATH")]
    remote: Option<PathBuf>,

    /// Force JSON output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> process::ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return ExitCode::from_clap(&error).into();
        }
    };
    let format = OutputFormat::detect(cli.json);

    let config = match &cli.config {
        Some(path) => match EngineConfig::load_from(path) {
            Ok(config) => config,
            Err(error) => {
                let error = anyhow::Error::new(error);
                output::print_anyhow_error(format, &error);
                return ExitCode::from_error(&error).into();
            }
        },
        None => EngineConfig::load(),
    };
    init_tracing(&config);

    let cx = CommandContext { config, local: cli.local, remote: cli.remote, format };
    match commands::run(cli.command, &cx) {
        Ok(()) => ExitCode::Success.into(),
        Err(error) => {
            output::print_anyhow_error(format, &error);
            ExitCode::from_error(&error).into()
        }
    }
}

/// `RUST_LOG` wins; otherwise the config's `log_filter`, else warnings only.
fn init_tracing(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_filter.as_deref().unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
