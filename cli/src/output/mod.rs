//! Output formatting module

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use std::path::Path;

use anyhow::Result;
use console::Term;
use owo_colors::OwoColorize as _;
pub use styles::Styles;

use crate::application::services::lifecycle::RunSummary;
use crate::domain::config::Settings;
use crate::domain::remote::CommandResult;
use crate::domain::session::{SessionRecord, TeardownReport};
use crate::domain::workload::Workload;
use crate::output::human::HumanRenderer;
use crate::output::json::JsonRenderer;

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let use_colors = !no_color && is_tty && std::env::var("NO_COLOR").is_err();

        let styles = if use_colors {
            Styles::colored()
        } else {
            Styles::default()
        };

        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Check if progress indicators should be shown.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    /// Print a success message prefixed with `✓`. Suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "✓".style(self.styles.success));
        }
    }

    /// Print a warning message prefixed with `⚠`. Suppressed when `quiet`.
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "⚠".style(self.styles.warning));
        }
    }

    /// Print an error message prefixed with `✗` to stderr. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    /// Print an info message prefixed with `ℹ`. Suppressed when `quiet`.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "ℹ".style(self.styles.info));
        }
    }

    /// Print a section header. Suppressed when `quiet`.
    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Print a key-value pair with the key dimmed. Suppressed when `quiet`.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.muted));
        }
    }
}

/// Dispatches each render call to the human or JSON renderer.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

impl Renderer<'_> {
    /// Render the workload catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_workloads(&self, catalog: &[Workload], custom_image: Option<&str>) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_workloads(catalog, custom_image);
                Ok(())
            }
            Self::Json(r) => r.render_workloads(catalog, custom_image),
        }
    }

    /// Render the effective settings and where they were loaded from.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_settings(&self, settings: &Settings, path: &Path) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_settings(settings, path);
                Ok(())
            }
            Self::Json(r) => r.render_settings(settings, path),
        }
    }

    /// Confirm a setting change.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_setting_updated(&self, key: &str, value: &str) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_setting_updated(key, value);
                Ok(())
            }
            Self::Json(r) => r.render_setting_updated(key, value),
        }
    }

    /// Render the persisted session, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_status(&self, record: Option<&SessionRecord>) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_status(record);
                Ok(())
            }
            Self::Json(r) => r.render_status(record),
        }
    }

    /// Render the remote command results as soon as configuration finishes.
    ///
    /// JSON mode reports them once, inside the run summary.
    pub fn render_commands(&self, results: &[CommandResult]) {
        if let Self::Human(r) = self {
            r.render_commands(results);
        }
    }

    /// Tell the operator how to release the workload.
    pub fn render_release_prompt(&self, hold_secs: Option<u64>) {
        if let Self::Human(r) = self {
            r.render_release_prompt(hold_secs);
        }
    }

    /// Render a finished run.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_run(&self, summary: &RunSummary) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_run(summary);
                Ok(())
            }
            Self::Json(r) => r.render_run(summary),
        }
    }

    /// Render the result of `ephem cleanup`.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_cleanup(&self, session_id: &str, report: &TeardownReport) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_cleanup(session_id, report);
                Ok(())
            }
            Self::Json(r) => r.render_cleanup(session_id, report),
        }
    }

    /// Render the CLI version.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_version(version);
                Ok(())
            }
            Self::Json(r) => r.render_version(version),
        }
    }
}
