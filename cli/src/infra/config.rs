//! Infrastructure implementation of the `SettingsStore` port.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::SettingsStore;
use crate::domain::config::Settings;

/// Environment variable that overrides the settings file location.
pub const CONFIG_ENV: &str = "EPHEM_CONFIG";

/// Production implementation of `SettingsStore` that uses a YAML file on disk.
pub struct YamlSettingsStore;

impl SettingsStore for YamlSettingsStore {
    fn load(&self) -> Result<Settings> {
        let path = self.path()?;
        if !path.exists() {
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let path = self.path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let content = serde_yaml::to_string(settings).context("cannot serialize settings")?;
        std::fs::write(&path, content)
            .with_context(|| format!("cannot write {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("cannot set permissions on {}", path.display()))?;
        }
        Ok(())
    }

    fn path(&self) -> Result<PathBuf> {
        if let Ok(val) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(val));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join(".ephem").join("config.yaml"))
    }
}
