//! ephem - one throwaway EC2 instance, configured over SSH, always torn down

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ephem_cli::cli::Cli;
use ephem_cli::output::json::{error_code, format_error};

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "EPHEM_LOG";

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json = cli.json;

    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            let message = format!("{e:#}");
            match format_error(&message, error_code(&e)) {
                Ok(out) if json => println!("{out}"),
                _ => eprintln!("Error: {message}"),
            }
            ExitCode::FAILURE
        }
    }
}
