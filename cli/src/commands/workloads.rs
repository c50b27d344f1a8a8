//! `ephem workloads`: list the workload catalog.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::settings;
use crate::domain::workload::CATALOG;

/// Run the workloads command.
///
/// # Errors
///
/// Returns an error if the settings file cannot be loaded.
pub fn run(app: &AppContext) -> Result<ExitCode> {
    let settings = settings::load_settings(&app.settings_store)?;
    app.renderer()
        .render_workloads(&CATALOG, settings.workloads.custom_image.as_deref())?;
    Ok(ExitCode::SUCCESS)
}
