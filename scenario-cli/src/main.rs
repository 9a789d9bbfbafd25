//! Scenario command line tool
//!
//! ```text
//! scenario run tests/scenarios --exclude slow.scen.json
//! scenario fmt tests/scenarios --check
//! ```

mod cli;
mod commands;
mod logging;
mod settings;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use logging::LoggingFormat;
use settings::Settings;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every file passed
fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if cli.json_logs {
        settings.logging.format = LoggingFormat::Json;
    }
    logging::init(&settings.logging).context("failed to initialize logging")?;

    match cli.command {
        Commands::Run {
            paths,
            exclude,
            gas_schedule,
        } => {
            let mut config = settings.runner;
            config.exclude.extend(exclude);
            if gas_schedule.is_some() {
                config.gas_schedule_path = gas_schedule;
            }
            commands::run(config, &paths)
        }
        Commands::Fmt { paths, check } => commands::fmt(&settings.runner, &paths, check),
    }
}
