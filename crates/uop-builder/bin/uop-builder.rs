//! uop-builder binary entry point.
//!
//! Thin wrapper around the uop-builder library that parses arguments,
//! initializes logging, runs the command and maps failures to exit codes.

use std::process::ExitCode;

use clap::Parser;
use uop_builder::{BuilderConfig, run};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = BuilderConfig::parse();
    let failure = config.command.failure_code();

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code(failure);
            tracing::error!("{:#}", anyhow::Error::new(err));
            ExitCode::from(code)
        }
    }
}
