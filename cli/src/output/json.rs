//! JSON output.
//!
//! Every `--json` code path prints exactly one pretty-printed document to
//! stdout. Failures use the error object from [`format_error`].

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::application::services::lifecycle::{RunSummary, failure_reason};
use crate::domain::config::Settings;
use crate::domain::error::{SessionError, SettingsError, WorkloadError};
use crate::domain::session::{SessionRecord, TeardownReport};
use crate::domain::workload::Workload;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Stable error code for a command failure.
#[must_use]
pub fn error_code(error: &anyhow::Error) -> &'static str {
    if let Some(e) = error.downcast_ref::<SettingsError>() {
        match e {
            SettingsError::UnknownKey { .. } => "unknown_setting",
            SettingsError::InvalidValue { .. } => "invalid_setting",
        }
    } else if let Some(e) = error.downcast_ref::<SessionError>() {
        match e {
            SessionError::Leftover { .. } => "leftover_session",
            SessionError::NothingRecorded => "nothing_recorded",
        }
    } else if let Some(e) = error.downcast_ref::<WorkloadError>() {
        match e {
            WorkloadError::Unknown(_) => "unknown_workload",
            WorkloadError::MissingImage => "missing_image",
            WorkloadError::InvalidImage(_) => "invalid_image",
            WorkloadError::NotSelected => "workload_not_selected",
        }
    } else {
        match failure_reason(error) {
            "error" => "command_failed",
            reason => reason,
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
    println!("{out}");
    Ok(())
}

#[derive(Serialize)]
struct WorkloadEntry {
    label: String,
    name: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
}

/// Renders domain types as JSON documents on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_workloads(&self, catalog: &[Workload], custom_image: Option<&str>) -> Result<()> {
        let entries: Vec<WorkloadEntry> = catalog
            .iter()
            .map(|w| WorkloadEntry {
                label: w.label().to_string(),
                name: w.name(),
                description: w.description(),
                image: match w {
                    Workload::Custom => custom_image.map(str::to_string),
                    _ => w.default_image().map(str::to_string),
                },
            })
            .collect();
        print_json(&serde_json::json!({ "workloads": entries }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_settings(&self, settings: &Settings, path: &Path) -> Result<()> {
        print_json(&serde_json::json!({
            "path": path.display().to_string(),
            "settings": settings,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_setting_updated(&self, key: &str, value: &str) -> Result<()> {
        print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": value,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_status(&self, record: Option<&SessionRecord>) -> Result<()> {
        print_json(&serde_json::json!({ "session": record }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_run(&self, summary: &RunSummary) -> Result<()> {
        print_json(summary)
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_cleanup(&self, session_id: &str, report: &TeardownReport) -> Result<()> {
        print_json(&serde_json::json!({
            "session_id": session_id,
            "clean": report.is_clean(),
            "teardown": report,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        print_json(&serde_json::json!({ "version": version }))
    }
}
