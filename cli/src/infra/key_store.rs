//! Infrastructure implementation of the `KeyStore` port.
//!
//! Private keys live under `~/.ephem/keys/` (directory 0700), one
//! create-new file per credential with mode 0400.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::KeyStore;
use crate::domain::resources::{KeyMaterial, Removal};

pub struct FsKeyStore {
    dir: PathBuf,
}

impl FsKeyStore {
    /// Create a key store using the default directory (`~/.ephem/keys`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(Self::with_dir(home.join(".ephem").join("keys")))
    }

    /// Create a key store rooted at an explicit directory (used in tests).
    #[must_use]
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating directory {}", self.dir.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(0o700))
                .with_context(|| format!("setting permissions on {}", self.dir.display()))?;
        }
        Ok(())
    }
}

impl KeyStore for FsKeyStore {
    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.pem"))
    }

    fn persist(&self, name: &str, material: &KeyMaterial) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.path_for(name);

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o400);
        }
        let mut file = options
            .open(&path)
            .with_context(|| format!("creating key file {}", path.display()))?;

        let secret = material.expose();
        let write = file
            .write_all(secret.as_bytes())
            .and_then(|()| {
                if secret.ends_with('\n') {
                    Ok(())
                } else {
                    file.write_all(b"\n")
                }
            })
            .and_then(|()| file.sync_all());
        if let Err(e) = write {
            drop(file);
            let _ = std::fs::remove_file(&path);
            return Err(e).with_context(|| format!("writing key file {}", path.display()));
        }
        Ok(path)
    }

    fn remove(&self, path: &Path) -> Result<Removal> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(Removal::Removed),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Removal::AlreadyAbsent),
            Err(e) => Err(e).with_context(|| format!("removing key file {}", path.display())),
        }
    }
}
