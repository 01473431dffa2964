//! Operator console pairing a language model with hexstrike tools.
//!
//! Usage:
//!
//! ```text
//! hexpilot [--provider anthropic|gemini] [--target <host>] [--verbose]
//! ```
//!
//! Settings fall back to environment variables, and a `.env` file in the
//! working directory is loaded first. Run `hexpilot --help` for the full
//! list.

use clap::Parser;
use hexpilot::session::{self, AppConfig, SessionError};
use std::io::Write;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is not an error.
    let _dotenv = dotenvy::dotenv();

    match start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let mut stderr = std::io::stderr().lock();
            // Nothing useful remains if stderr is gone.
            let _report = writeln!(stderr, "Error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn start() -> Result<(), SessionError> {
    let config = AppConfig::parse();
    session::init_telemetry(config.verbose)?;
    let settings = config.into_settings()?;
    session::run(settings).await
}
