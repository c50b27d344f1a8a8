//! Application service: settings use-cases.

use anyhow::Result;

use crate::application::ports::SettingsStore;
use crate::domain::config::Settings;

/// Load settings.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or fails validation.
pub fn load_settings(store: &impl SettingsStore) -> Result<Settings> {
    let settings = store.load()?;
    settings.validate()?;
    Ok(settings)
}

/// Validate and apply one `key = value` change, then save.
///
/// # Errors
///
/// Returns an error if the key or value is invalid, or saving fails.
pub fn set_setting(store: &impl SettingsStore, key: &str, value: &str) -> Result<Settings> {
    let mut settings = store.load()?;
    settings.set(key, value)?;
    store.save(&settings)?;
    Ok(settings)
}
