//! Credential acquisition and release: a provider key pair plus its locally
//! stored private material, created together and deleted together.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use crate::application::ports::{CloudCompute, KeyStore};
use crate::domain::error::{ProvisionError, ReleaseWarning};
use crate::domain::resources::{CredentialHandle, Removal, ResourceKind, generate_resource_name};
use crate::domain::session::{ReleaseReport, ReleaseStatus};

pub struct CredentialProvisioner<'a, C, K> {
    compute: &'a C,
    keys: &'a K,
}

impl<'a, C: CloudCompute, K: KeyStore> CredentialProvisioner<'a, C, K> {
    #[must_use]
    pub fn new(compute: &'a C, keys: &'a K) -> Self {
        Self { compute, keys }
    }

    /// Create a uniquely named key pair and persist its private material.
    ///
    /// If the create call fails or the material cannot be written locally,
    /// the provider registration is deleted before returning.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::CreationRejected`] or
    /// [`ProvisionError::LocalWriteFailed`].
    pub async fn acquire(&self, session_id: &str) -> Result<CredentialHandle, ProvisionError> {
        let name = generate_resource_name();
        tracing::debug!(%name, "creating key pair");
        let material = match self.compute.create_key_pair(&name, session_id).await {
            Ok(material) => material,
            Err(e) => {
                // The reply may have been lost after the pair was registered.
                let mut detail = format!("{e:#}");
                match self.compute.delete_key_pair(&name).await {
                    Ok(Removal::Removed) => {
                        tracing::warn!(%name, "key pair registered despite failed create; deleted");
                    }
                    Ok(Removal::AlreadyAbsent) => {}
                    Err(del) => {
                        tracing::warn!(%name, error = %format!("{del:#}"), "could not clean up key pair");
                        detail.push_str(&format!(" (key pair {name} may still be registered: {del:#})"));
                    }
                }
                return Err(ProvisionError::CreationRejected {
                    resource: ResourceKind::Credential,
                    detail,
                });
            }
        };

        let persisted = if material.is_empty() {
            Err(anyhow::anyhow!("provider returned empty key material"))
        } else {
            self.keys.persist(&name, &material)
        };

        match persisted {
            Ok(path) => {
                tracing::info!(%name, path = %path.display(), "credential acquired");
                Ok(CredentialHandle::new(name, path))
            }
            Err(e) => {
                let mut detail = format!("{e:#}");
                if let Err(del) = self.compute.delete_key_pair(&name).await {
                    tracing::warn!(%name, error = %format!("{del:#}"), "could not roll back key pair");
                    detail.push_str(&format!(" (key pair {name} may still be registered: {del:#})"));
                }
                Err(ProvisionError::LocalWriteFailed {
                    path: self.keys.path_for(&name).display().to_string(),
                    detail,
                })
            }
        }
    }

    /// Delete the provider registration, then the local material.
    ///
    /// Both halves are attempted independently; either already being gone is
    /// fine. Never fails: problems come back as warnings in the report.
    pub async fn release(&self, handle: &mut CredentialHandle) -> ReleaseReport {
        let mut warnings = Vec::new();
        let mut absent = 0;

        if handle.is_registered() {
            match self.compute.delete_key_pair(handle.name()).await {
                Ok(removal) => {
                    if removal == Removal::AlreadyAbsent {
                        tracing::info!(name = handle.name(), "key pair already absent");
                        absent += 1;
                    }
                    handle.mark_deregistered();
                }
                Err(e) => warnings.push(warning(handle, format!("delete key pair: {e:#}"))),
            }
        } else {
            absent += 1;
        }

        match self.keys.remove(handle.key_path()) {
            Ok(Removal::Removed) => {}
            Ok(Removal::AlreadyAbsent) => {
                tracing::info!(path = %handle.key_path().display(), "private key file already absent");
                absent += 1;
            }
            Err(e) => warnings.push(warning(handle, format!("remove private key: {e:#}"))),
        }

        let status = if !warnings.is_empty() {
            ReleaseStatus::Failed
        } else if absent == 2 {
            ReleaseStatus::AlreadyAbsent
        } else {
            ReleaseStatus::Released
        };
        ReleaseReport {
            resource: ResourceKind::Credential,
            id: handle.name().to_string(),
            status,
            warnings,
        }
    }
}

fn warning(handle: &CredentialHandle, detail: String) -> ReleaseWarning {
    ReleaseWarning {
        resource: ResourceKind::Credential,
        id: handle.name().to_string(),
        detail,
    }
}
