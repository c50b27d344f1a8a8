//! `ephem config`: show and set settings.

use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::ports::SettingsStore;
use crate::application::services::settings;

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current settings
    Show,
    /// Set a setting
    Set {
        /// Setting key, e.g. `instance.instance_type`
        key: String,
        /// New value
        value: String,
    },
}

/// Run the config command.
///
/// # Errors
///
/// Returns an error if the settings file cannot be read or written, or the
/// key or value is invalid.
pub fn run(app: &AppContext, cmd: ConfigCommand) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::Show => show_settings(app),
        ConfigCommand::Set { key, value } => set_setting(app, &key, &value),
    }
}

fn show_settings(app: &AppContext) -> Result<ExitCode> {
    let settings = settings::load_settings(&app.settings_store)?;
    let path = app.settings_store.path()?;
    app.renderer().render_settings(&settings, &path)?;
    Ok(ExitCode::SUCCESS)
}

fn set_setting(app: &AppContext, key: &str, value: &str) -> Result<ExitCode> {
    let updated = settings::set_setting(&app.settings_store, key, value)?;
    let shown = updated.get(key).unwrap_or_default();
    tracing::info!(%key, value = %shown, "setting updated");
    app.renderer().render_setting_updated(key, &shown)?;
    Ok(ExitCode::SUCCESS)
}
