//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::config::Settings;
use crate::domain::error::SshError;
use crate::domain::remote::{CommandOutput, SshTarget};
use crate::domain::resources::{InstanceObservation, KeyMaterial, Removal};
use crate::domain::session::{ReleaseCause, SessionRecord};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Launch parameters for exactly one instance.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    /// Key pair the instance is bound to.
    pub key_name: &'a str,
    pub image_id: &'a str,
    pub instance_type: &'a str,
    /// Empty means the provider default.
    pub security_group_ids: &'a [String],
    pub subnet_id: Option<&'a str>,
    /// Idempotency token; a retried request with the same token creates nothing new.
    pub client_token: &'a str,
    /// Value of the session tag.
    pub session_id: &'a str,
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
}

// ── Cloud Compute Port ────────────────────────────────────────────────────────

/// The provider's instance-management API.
///
/// Deletes and terminations report [`Removal::AlreadyAbsent`] instead of
/// failing when the target no longer exists.
#[allow(async_fn_in_trait)]
pub trait CloudCompute {
    /// Register a key pair and return its private material. The material is
    /// never available again.
    async fn create_key_pair(&self, name: &str, session_id: &str) -> Result<KeyMaterial>;
    async fn delete_key_pair(&self, name: &str) -> Result<Removal>;
    /// Request one instance and return its id.
    async fn run_instance(&self, request: &LaunchRequest<'_>) -> Result<String>;
    /// The id of a live instance launched with `client_token`, if any.
    async fn find_instance_by_token(&self, client_token: &str) -> Result<Option<String>>;
    /// Unknown ids are reported as [`InstanceObservation::absent`].
    async fn describe_instance(&self, instance_id: &str) -> Result<InstanceObservation>;
    async fn terminate_instance(&self, instance_id: &str) -> Result<Removal>;
}

// ── Secure Shell Ports ────────────────────────────────────────────────────────

/// Opens authenticated shell sessions.
#[allow(async_fn_in_trait)]
pub trait SecureShell {
    type Session: ShellSession;

    /// # Errors
    ///
    /// [`SshError::Unreachable`] is the only retryable failure.
    async fn connect(&self, target: &SshTarget) -> Result<Self::Session, SshError>;
}

/// One persistent session. Commands run strictly one at a time.
#[allow(async_fn_in_trait)]
pub trait ShellSession {
    /// Run a command to completion and capture all of its output.
    ///
    /// A non-zero exit is reported in the output, not as an error.
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, SshError>;
    async fn close(self) -> Result<()>;
}

// ── Local Persistence Ports ───────────────────────────────────────────────────

/// Stores private key material on the local filesystem.
pub trait KeyStore {
    /// Where the material for `name` is (or would be) stored.
    fn path_for(&self, name: &str) -> PathBuf;
    /// Write material to a freshly created, owner-read-only file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file already exists or cannot be written.
    fn persist(&self, name: &str, material: &KeyMaterial) -> Result<PathBuf>;
    fn remove(&self, path: &Path) -> Result<Removal>;
}

/// Abstracts session record persistence (load/save/clear).
#[allow(async_fn_in_trait)]
pub trait SessionStore {
    /// Load the recorded session, returning `None` if no record exists.
    async fn load_async(&self) -> Result<Option<SessionRecord>>;
    async fn save_async(&self, record: &SessionRecord) -> Result<()>;
    async fn clear_async(&self) -> Result<()>;
}

/// Abstracts settings persistence.
pub trait SettingsStore {
    /// Load settings, returning defaults when no file exists.
    fn load(&self) -> Result<Settings>;
    fn save(&self, settings: &Settings) -> Result<()>;
    fn path(&self) -> Result<PathBuf>;
}

// ── Time and Triggers ─────────────────────────────────────────────────────────

/// Monotonic time source for every bounded wait.
#[allow(async_fn_in_trait)]
pub trait Clock {
    /// Time since the clock was created.
    fn elapsed(&self) -> Duration;
    async fn sleep(&self, duration: Duration);
}

/// Something the operator does to end a configured session.
#[allow(async_fn_in_trait)]
pub trait ReleaseTrigger {
    async fn wait(&mut self) -> ReleaseCause;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait: no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
