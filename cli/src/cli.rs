//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags};
use crate::commands;

/// One throwaway EC2 instance, configured over SSH, always torn down
#[derive(Parser)]
#[command(
    name = "ephem",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Log provider calls and state transitions to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Launch an instance, run a workload on it, tear it down on release
    Up(commands::up::UpArgs),

    /// Release resources left behind by an earlier run
    Cleanup,

    /// Show the recorded session, if any
    Status,

    /// List available workloads
    Workloads,

    /// Manage settings
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            yes,
            command,
            ..
        } = self;
        let app = AppContext::new(AppFlags {
            json,
            quiet,
            no_color,
            yes,
        })?;

        match command {
            Command::Up(args) => commands::up::run(&app, args).await,
            Command::Cleanup => commands::cleanup::run(&app).await,
            Command::Status => commands::status::run(&app).await,
            Command::Workloads => commands::workloads::run(&app),
            Command::Config(cmd) => commands::config::run(&app, cmd),
            Command::Version => commands::version::run(&app),
        }
    }
}
