//! strata CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Configuration error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use strata_config::ConfigError;
use strata_topology::TopologyError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const CONFIG_ERROR: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("strata_cli={level},strata_topology={level},strata_config={level},warn"))
    });
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let result = match cli.command {
        Commands::Synth(args) => commands::synth::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Outputs(args) => commands::outputs::execute(args).await,
        Commands::Graph(args) => commands::graph::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let config_code = |err: &ConfigError| match err {
        ConfigError::InvalidMode(_) => ExitCodes::INVALID_ARGS,
        _ => ExitCodes::CONFIG_ERROR,
    };

    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<TopologyError>() {
            return match err {
                TopologyError::Config(inner) => config_code(inner),
                TopologyError::Serialization(_) => ExitCodes::GENERAL_ERROR,
                _ => ExitCodes::VALIDATION_FAILURE,
            };
        }
        if let Some(err) = cause.downcast_ref::<ConfigError>() {
            return config_code(err);
        }
    }
    ExitCodes::GENERAL_ERROR
}
