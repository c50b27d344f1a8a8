//! Infrastructure implementation of the `SessionStore` port.
//!
//! `JsonSessionStore` provides async load/save using
//! `tokio::task::spawn_blocking` with atomic write (temp file + rename) so a
//! crash mid-write never leaves a truncated record behind.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::SessionStore;
use crate::domain::resources::validate_resource_name;
use crate::domain::session::SessionRecord;

/// Session record file manager: implements `SessionStore` for the infra layer.
pub struct JsonSessionStore {
    path: PathBuf,
}

impl JsonSessionStore {
    /// Create a store using the default path (`~/.ephem/session.json`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(Self::with_path(home.join(".ephem").join("session.json")))
    }

    /// Create a store with an explicit path (used in tests).
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn load_sync(&self) -> Result<Option<SessionRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading session record {}", self.path.display()))?;
        let record: SessionRecord = serde_json::from_str(&content)
            .with_context(|| format!("parsing session record {}", self.path.display()))?;
        validate_resource_name(&record.session_id)?;
        Ok(Some(record))
    }

    fn save_sync(&self, record: &SessionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(record).context("serializing session record")?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
        }

        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("finalizing session record {}", self.path.display()))?;
        Ok(())
    }

    fn clear_sync(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("removing session record {}", self.path.display()))
            }
        }
    }
}

impl SessionStore for JsonSessionStore {
    async fn load_async(&self) -> Result<Option<SessionRecord>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || JsonSessionStore::with_path(path).load_sync())
            .await
            .context("session load task panicked")?
    }

    async fn save_async(&self, record: &SessionRecord) -> Result<()> {
        let path = self.path.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || JsonSessionStore::with_path(path).save_sync(&record))
            .await
            .context("session save task panicked")?
    }

    async fn clear_async(&self) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || JsonSessionStore::with_path(path).clear_sync())
            .await
            .context("session clear task panicked")?
    }
}
