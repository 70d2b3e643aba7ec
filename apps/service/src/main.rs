//! uppe-service - runs every configured monitor once and prints the results
//! as JSON lines on stdout.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use monitoring::CheckerRegistry;
use tracing::level_filters::LevelFilter;

mod config;
mod runner;

use config::Config;

#[derive(Debug, Parser)]
#[command(version, about = "Run Uppe monitors once and print the results")]
struct Cli {
    /// Monitor definitions, defaults to $XDG_CONFIG_HOME/uppe/monitors.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the catalog of supported monitor types and exit
    #[arg(long)]
    list_types: bool,

    /// Print the loaded monitors and exit
    #[arg(long)]
    show_config: bool,

    /// Only run the named monitors (repeatable, or comma separated)
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// Checks running at the same time
    #[arg(long, default_value_t = 16)]
    concurrency: usize,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logger::init_tracing_with_level(cli.log_level());

    let registry = CheckerRegistry::global();

    if cli.list_types {
        for info in registry.list_supported_types() {
            println!("{}", serde_json::to_string(&info)?);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::from_config(cli.config.as_ref()).context("Loading monitor config")?;
    if cli.show_config {
        print!("{config}");
        return Ok(ExitCode::SUCCESS);
    }

    let monitors = config.select(&cli.only)?;
    if monitors.is_empty() {
        tracing::warn!("No monitors to run");
        return Ok(ExitCode::SUCCESS);
    }

    let reports = runner::run_monitors(registry, monitors, cli.concurrency).await;

    let mut all_up = true;
    for report in &reports {
        all_up &= report.is_up();
        println!("{}", serde_json::to_string(report)?);
    }

    Ok(if all_up { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
