//! The lifecycle controller: acquire a credential, then an instance, then
//! configure it; wait for release; tear everything down newest-first.
//!
//! The controller owns the [`SessionState`]. Every acquired handle is put
//! there before the next await, and the session record is persisted after
//! every change so a crashed run can be cleaned up later.

use anyhow::Result;
use serde::Serialize;

use crate::application::cancel::Cancellation;
use crate::application::ports::{
    Clock, CloudCompute, KeyStore, ProgressReporter, ReleaseTrigger, SecureShell, SessionStore,
};
use crate::application::services::credential::CredentialProvisioner;
use crate::application::services::instance::InstanceProvisioner;
use crate::application::services::remote::RemoteConfigurator;
use crate::domain::config::Settings;
use crate::domain::error::{ConfigError, ProvisionError};
use crate::domain::remote::{CommandResult, SshTarget};
use crate::domain::session::{
    LifecycleState, RecordContext, ReleaseCause, ReleaseStatus, Resource, SessionRecord,
    SessionState, TeardownReport,
};
use crate::domain::workload::WorkloadSelection;

/// Everything the controller talks to.
pub struct LifecyclePorts<'a, C, K, H, S, Cl> {
    pub compute: &'a C,
    pub keys: &'a K,
    pub shell: &'a H,
    pub store: &'a S,
    pub clock: &'a Cl,
}

/// How a run ended, before teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Configured, then released on request.
    Released { cause: ReleaseCause },
    /// An acquisition or configuration step failed.
    Failed { reason: String, message: String },
    /// A signal arrived before the workload was configured.
    Interrupted,
}

impl RunOutcome {
    /// Process exit code for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Released { .. } => 0,
            Self::Failed { .. } => 1,
            Self::Interrupted => 130,
        }
    }
}

/// Everything a finished run has to report.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub session_id: String,
    pub workload: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<std::net::IpAddr>,
    #[serde(flatten)]
    pub outcome: RunOutcome,
    pub commands: Vec<CommandResult>,
    pub teardown: TeardownReport,
}

impl RunSummary {
    /// Exit code for the whole run. A released workload whose teardown left
    /// something behind is a failure.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self.outcome.exit_code() {
            0 if !self.teardown.is_clean() => 1,
            code => code,
        }
    }
}

pub struct LifecycleController<'a, C, K, H, S, Cl> {
    ports: LifecyclePorts<'a, C, K, H, S, Cl>,
    settings: &'a Settings,
    cancel: Cancellation,
    session: SessionState,
    context: RecordContext,
}

impl<'a, C, K, H, S, Cl> LifecycleController<'a, C, K, H, S, Cl>
where
    C: CloudCompute,
    K: KeyStore,
    H: SecureShell,
    S: SessionStore,
    Cl: Clock,
{
    /// A controller for a fresh session.
    #[must_use]
    pub fn new(
        ports: LifecyclePorts<'a, C, K, H, S, Cl>,
        settings: &'a Settings,
        cancel: Cancellation,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            ports,
            settings,
            cancel,
            session: SessionState::new(session_id, chrono::Utc::now()),
            context: RecordContext {
                region: settings.region.clone(),
                profile: settings.profile.clone(),
                workload: None,
            },
        }
    }

    /// A controller over a persisted session, ready for teardown.
    #[must_use]
    pub fn resume(
        ports: LifecyclePorts<'a, C, K, H, S, Cl>,
        settings: &'a Settings,
        record: &SessionRecord,
    ) -> Self {
        Self {
            ports,
            settings,
            cancel: Cancellation::new(),
            session: SessionState::resume(record),
            context: RecordContext {
                region: record.region.clone(),
                profile: record.profile.clone(),
                workload: record.workload.clone(),
            },
        }
    }

    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Acquire and configure. On failure the session is left `Failing` with
    /// whatever was acquired still live; call [`Self::teardown`] next.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProvisionError`] or [`ConfigError`].
    pub async fn bring_up(
        &mut self,
        selection: &WorkloadSelection,
        reporter: &impl ProgressReporter,
    ) -> Result<Vec<CommandResult>> {
        self.context.workload = Some(selection.workload().name().to_string());
        let result = self.acquire_and_configure(selection, reporter).await;
        match &result {
            Ok(_) => {
                self.session.mark_configured();
                tracing::info!(session = self.session.session_id(), "configured");
            }
            Err(e) => {
                self.session.mark_failing();
                tracing::warn!(session = self.session.session_id(), error = %format!("{e:#}"), "bring-up failed");
            }
        }
        self.checkpoint().await;
        result
    }

    async fn acquire_and_configure(
        &mut self,
        selection: &WorkloadSelection,
        reporter: &impl ProgressReporter,
    ) -> Result<Vec<CommandResult>> {
        let session_id = self.session.session_id().to_string();
        let credentials = CredentialProvisioner::new(self.ports.compute, self.ports.keys);
        let instances =
            InstanceProvisioner::new(self.ports.compute, self.ports.clock, self.settings);

        self.ensure_not_cancelled()?;
        reporter.step("Creating key pair...");
        let credential = credentials.acquire(&session_id).await?;
        self.session.record_credential(credential.clone());
        self.checkpoint().await;
        reporter.success(&format!("Key pair {} created", credential.name()));

        self.ensure_not_cancelled()?;
        reporter.step("Launching instance...");
        let handle = instances.launch(&credential, &session_id).await?;
        self.session.record_instance(handle);
        self.checkpoint().await;

        let Some(handle) = self.session.instance_mut() else {
            anyhow::bail!("instance handle missing from session");
        };
        reporter.step(&format!("Waiting for instance {} to run...", handle.id()));
        let address = instances.await_running(handle, &self.cancel).await?;
        self.checkpoint().await;
        reporter.success(&format!("Instance running at {address}"));

        self.ensure_not_cancelled()?;
        let target = SshTarget {
            address,
            port: self.settings.ssh.port,
            user: self.settings.ssh.user.clone(),
            key_path: credential.key_path().to_path_buf(),
        };
        let configurator =
            RemoteConfigurator::new(self.ports.shell, self.ports.clock, &self.settings.timeouts);
        let results = configurator
            .configure(&target, &selection.commands(), &self.cancel, reporter)
            .await?;
        Ok(results)
    }

    fn ensure_not_cancelled(&self) -> Result<(), ProvisionError> {
        if self.cancel.is_cancelled() {
            return Err(ProvisionError::Interrupted);
        }
        Ok(())
    }

    /// Block until the operator releases the workload or a signal arrives.
    pub async fn await_release(&self, trigger: &mut impl ReleaseTrigger) -> ReleaseCause {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => ReleaseCause::Signal,
            cause = trigger.wait() => cause,
        }
    }

    /// Release every live handle, newest first.
    ///
    /// Each release is attempted regardless of earlier failures. Calling this
    /// again after it has finished makes no provider calls.
    pub async fn teardown(&mut self, reporter: &impl ProgressReporter) -> TeardownReport {
        let mut report = TeardownReport::default();
        if self.session.phase() == LifecycleState::Released && self.session.live().is_empty() {
            tracing::debug!("teardown already done");
            return report;
        }

        self.session.begin_release();
        let credentials = CredentialProvisioner::new(self.ports.compute, self.ports.keys);
        let instances =
            InstanceProvisioner::new(self.ports.compute, self.ports.clock, self.settings);

        while let Some(mut handle) = self.session.take_latest() {
            let kind = handle.resource.kind();
            let id = handle.resource.id().to_string();
            reporter.step(&format!("Releasing {kind} {id}..."));
            let release = match &mut handle.resource {
                Resource::Instance(h) => instances.release(h).await,
                Resource::Credential(h) => credentials.release(h).await,
            };
            match release.status {
                ReleaseStatus::Released => reporter.success(&format!("Released {kind} {id}")),
                ReleaseStatus::AlreadyAbsent => {
                    reporter.success(&format!("{kind} {id} was already gone"));
                }
                ReleaseStatus::Failed => {
                    for warning in &release.warnings {
                        tracing::warn!("{warning}");
                        reporter.warn(&warning.to_string());
                    }
                    self.session.remember_unreleased(handle);
                }
            }
            report.releases.push(release);
            self.checkpoint().await;
        }

        self.session.finish_release();
        if self.session.is_clear() {
            if let Err(e) = self.ports.store.clear_async().await {
                tracing::warn!(error = %format!("{e:#}"), "could not remove session record");
            }
        } else {
            self.checkpoint().await;
        }
        report
    }

    /// The whole run: bring up, wait for release, tear down.
    ///
    /// `on_configured` is called with the command results just before the
    /// controller starts waiting for a release trigger.
    pub async fn run(
        &mut self,
        selection: &WorkloadSelection,
        trigger: &mut impl ReleaseTrigger,
        reporter: &impl ProgressReporter,
        on_configured: impl FnOnce(&[CommandResult]),
    ) -> RunSummary {
        let (outcome, commands) = match self.bring_up(selection, reporter).await {
            Ok(results) => {
                on_configured(&results);
                let cause = self.await_release(trigger).await;
                tracing::info!(?cause, "release requested");
                (RunOutcome::Released { cause }, results)
            }
            Err(e) => {
                let reason = failure_reason(&e);
                if reason == "interrupted" || self.cancel.is_cancelled() {
                    (RunOutcome::Interrupted, Vec::new())
                } else {
                    let outcome = RunOutcome::Failed {
                        reason: reason.to_string(),
                        message: format!("{e:#}"),
                    };
                    (outcome, Vec::new())
                }
            }
        };
        let address = self.session.instance().and_then(|i| i.address());
        let teardown = self.teardown(reporter).await;
        RunSummary {
            session_id: self.session.session_id().to_string(),
            workload: selection.workload().name().to_string(),
            image: selection.image().to_string(),
            address,
            outcome,
            commands,
            teardown,
        }
    }

    async fn checkpoint(&self) {
        let record = self.session.to_record(&self.context);
        if let Err(e) = self.ports.store.save_async(&record).await {
            tracing::warn!(error = %format!("{e:#}"), "could not persist session record");
        }
    }
}

/// Stable reason string for a bring-up failure.
#[must_use]
pub fn failure_reason(error: &anyhow::Error) -> &'static str {
    if let Some(e) = error.downcast_ref::<ProvisionError>() {
        e.reason()
    } else if let Some(e) = error.downcast_ref::<ConfigError>() {
        e.reason()
    } else {
        "error"
    }
}
