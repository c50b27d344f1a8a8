//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, or `std::process`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

use crate::domain::resources::ResourceKind;

// ── Acquisition errors ────────────────────────────────────────────────────────

/// A credential or instance could not be acquired. Always fatal to the run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{resource} creation was rejected by the provider: {detail}")]
    CreationRejected {
        resource: ResourceKind,
        detail: String,
    },

    #[error("could not write private key to {path}: {detail}")]
    LocalWriteFailed { path: String, detail: String },

    #[error("instance {instance_id} did not become ready: {detail}")]
    InstanceNotReady { instance_id: String, detail: String },

    #[error("instance {instance_id} has no reachable address")]
    AddressUnavailable { instance_id: String },

    #[error("interrupted before provisioning finished")]
    Interrupted,
}

impl ProvisionError {
    /// Stable machine-readable reason, used in JSON error output.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::CreationRejected { .. } => "creation_rejected",
            Self::LocalWriteFailed { .. } => "local_write_failed",
            Self::InstanceNotReady { .. } => "instance_not_ready",
            Self::AddressUnavailable { .. } => "address_unavailable",
            Self::Interrupted => "interrupted",
        }
    }
}

// ── Remote configuration errors ───────────────────────────────────────────────

/// The remote session could not be established or was lost mid-sequence.
///
/// A command exiting non-zero is not an error at this layer.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("authentication to {address} failed: {detail}")]
    AuthFailed { address: String, detail: String },

    #[error("connection to {address} lost: {detail}")]
    ConnectionLost { address: String, detail: String },

    #[error("{address} did not accept SSH connections within {waited_secs}s: {detail}")]
    Unreachable {
        address: String,
        waited_secs: u64,
        detail: String,
    },

    #[error("interrupted during remote configuration")]
    Interrupted,
}

impl ConfigError {
    /// Stable machine-readable reason, used in JSON error output.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::AuthFailed { .. } => "auth_failed",
            Self::ConnectionLost { .. } => "connection_lost",
            Self::Unreachable { .. } => "unreachable",
            Self::Interrupted => "interrupted",
        }
    }
}

/// Failure classes reported by a secure-shell client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SshError {
    /// Nothing is listening yet, or the host cannot be reached. Retryable.
    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    #[error("session lost: {0}")]
    SessionLost(String),

    #[error("ssh client failed: {0}")]
    Client(String),
}

// ── Teardown ──────────────────────────────────────────────────────────────────

/// A teardown step failed. Logged and reported, never escalated.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize)]
#[error("could not release {resource} {id}: {detail}")]
pub struct ReleaseWarning {
    pub resource: ResourceKind,
    pub id: String,
    pub detail: String,
}

// ── Session / workload errors ─────────────────────────────────────────────────

/// Errors about the session as a whole rather than one resource.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(
        "Session {session_id} still has resources recorded.\n\nRun 'ephem cleanup' to release them first."
    )]
    Leftover { session_id: String },

    #[error("No recorded session. Nothing to clean up.")]
    NothingRecorded,
}

/// Errors resolving the workload to run.
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("Unknown workload '{0}'. Valid choices: a (nginx), b (mysql), c (custom)")]
    Unknown(String),

    #[error(
        "Workload 'custom' needs an image.\n\nPass --image <image> or run: ephem config set workloads.custom_image <image>"
    )]
    MissingImage,

    #[error("Invalid image reference '{0}'")]
    InvalidImage(String),

    #[error("No workload given and prompts are disabled. Pass one of: a, b, c")]
    NotSelected,
}

// ── Settings errors ───────────────────────────────────────────────────────────

/// Errors related to settings key/value validation.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nExpected: {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },
}
