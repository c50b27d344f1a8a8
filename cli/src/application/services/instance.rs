//! Instance acquisition and release.
//!
//! Acquisition is two calls so the controller can record the handle between
//! them: [`InstanceProvisioner::launch`] returns as soon as the provider has
//! assigned an id, and [`InstanceProvisioner::await_running`] blocks until
//! the instance is running and reachable.

use std::net::IpAddr;

use crate::application::cancel::Cancellation;
use crate::application::ports::{Clock, CloudCompute, LaunchRequest};
use crate::application::services::wait::{Probe, WaitOutcome, poll_until};
use crate::domain::config::{AddressKind, Settings};
use crate::domain::error::{ProvisionError, ReleaseWarning};
use crate::domain::resources::{
    CredentialHandle, InstanceHandle, InstanceObservation, InstanceState, ObservedState, Removal,
    ResourceKind,
};
use crate::domain::session::{ReleaseReport, ReleaseStatus};

pub struct InstanceProvisioner<'a, C, Cl> {
    compute: &'a C,
    clock: &'a Cl,
    settings: &'a Settings,
}

impl<'a, C: CloudCompute, Cl: Clock> InstanceProvisioner<'a, C, Cl> {
    #[must_use]
    pub fn new(compute: &'a C, clock: &'a Cl, settings: &'a Settings) -> Self {
        Self {
            compute,
            clock,
            settings,
        }
    }

    /// Request exactly one instance bound to `credential`.
    ///
    /// The returned handle is in the `requested` state and must be recorded
    /// by the caller before anything else is awaited.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::CreationRejected`] if the provider refuses
    /// and no instance carrying the session's client token exists.
    pub async fn launch(
        &self,
        credential: &CredentialHandle,
        session_id: &str,
    ) -> Result<InstanceHandle, ProvisionError> {
        let spec = &self.settings.instance;
        let request = LaunchRequest {
            key_name: credential.name(),
            image_id: &spec.image_id,
            instance_type: &spec.instance_type,
            security_group_ids: &spec.security_group_ids,
            subnet_id: spec.subnet_id.as_deref(),
            client_token: session_id,
            session_id,
        };
        tracing::debug!(image = %spec.image_id, kind = %spec.instance_type, "requesting instance");
        let id = match self.compute.run_instance(&request).await {
            Ok(id) => id,
            Err(e) => self.recover_launch(session_id, &e).await?,
        };
        tracing::info!(instance_id = %id, "instance requested");
        Ok(InstanceHandle::requested(id))
    }

    /// A failed or timed-out launch may still have created the instance.
    /// Look it up by client token so it is recorded and later terminated.
    async fn recover_launch(
        &self,
        client_token: &str,
        error: &anyhow::Error,
    ) -> Result<String, ProvisionError> {
        let mut detail = format!("{error:#}");
        match self.compute.find_instance_by_token(client_token).await {
            Ok(Some(id)) => {
                tracing::warn!(instance_id = %id, error = %detail, "launch reported failure but the instance exists");
                return Ok(id);
            }
            Ok(None) => {}
            Err(lookup) => {
                tracing::warn!(error = %format!("{lookup:#}"), "could not check for a launched instance");
                detail.push_str(&format!(
                    " (an instance with client token {client_token} may exist: {lookup:#})"
                ));
            }
        }
        Err(ProvisionError::CreationRejected {
            resource: ResourceKind::Instance,
            detail,
        })
    }

    /// Wait until the instance is running, then fix its reachable address.
    ///
    /// # Errors
    ///
    /// - [`ProvisionError::InstanceNotReady`] on timeout or if the instance
    ///   reaches a terminal state while waiting.
    /// - [`ProvisionError::AddressUnavailable`] if it runs without an address.
    /// - [`ProvisionError::Interrupted`] if `cancel` fires.
    pub async fn await_running(
        &self,
        handle: &mut InstanceHandle,
        cancel: &Cancellation,
    ) -> Result<IpAddr, ProvisionError> {
        let id = handle.id().to_string();
        let policy = self.settings.timeouts.instance_ready();
        let compute = self.compute;
        let probe_id = id.as_str();

        let outcome = poll_until(self.clock, cancel, &policy, || async move {
            let observation = match compute.describe_instance(probe_id).await {
                Ok(o) => o,
                // Transient API errors are retried until the deadline.
                Err(e) => return Ok(Probe::Pending(format!("describe failed: {e:#}"))),
            };
            match observation.state {
                ObservedState::Running => Ok(Probe::Ready(observation)),
                ObservedState::ShuttingDown | ObservedState::Terminated => {
                    Err(ProvisionError::InstanceNotReady {
                        instance_id: probe_id.to_string(),
                        detail: format!("entered {:?} while starting", observation.state),
                    })
                }
                // Fresh ids can be briefly unknown to describe calls.
                state => Ok(Probe::Pending(format!("{state:?}"))),
            }
        })
        .await?;

        let observation = match outcome {
            WaitOutcome::Ready(o) => o,
            WaitOutcome::TimedOut { waited, last } => {
                return Err(ProvisionError::InstanceNotReady {
                    instance_id: id,
                    detail: format!("not running after {}s (last seen: {last})", waited.as_secs()),
                });
            }
            WaitOutcome::Cancelled => return Err(ProvisionError::Interrupted),
        };

        let address = match self.pick_address(&observation) {
            Some(a) => Some(a),
            None => {
                tracing::debug!(instance_id = %id, "running without address, asking once more");
                self.compute
                    .describe_instance(&id)
                    .await
                    .ok()
                    .and_then(|o| self.pick_address(&o))
            }
        };
        let Some(address) = address else {
            return Err(ProvisionError::AddressUnavailable { instance_id: id });
        };

        handle.mark_running(address);
        tracing::info!(instance_id = %id, %address, "instance running");
        Ok(address)
    }

    fn pick_address(&self, observation: &InstanceObservation) -> Option<IpAddr> {
        match self.settings.ssh.address {
            AddressKind::Public => observation.public_address,
            AddressKind::Private => observation.private_address,
        }
    }

    /// Terminate the instance and wait (bounded) until it is gone.
    ///
    /// Never fails: a refused termination comes back as a warning; a slow
    /// one is logged and left to the provider.
    pub async fn release(&self, handle: &mut InstanceHandle) -> ReleaseReport {
        let id = handle.id().to_string();
        let report = |status, warnings| ReleaseReport {
            resource: ResourceKind::Instance,
            id: id.clone(),
            status,
            warnings,
        };

        if handle.state() == InstanceState::Terminated {
            return report(ReleaseStatus::AlreadyAbsent, Vec::new());
        }

        match self.compute.terminate_instance(&id).await {
            Ok(Removal::AlreadyAbsent) => {
                handle.mark_terminated();
                tracing::info!(instance_id = %id, "instance already terminated");
                report(ReleaseStatus::AlreadyAbsent, Vec::new())
            }
            Ok(Removal::Removed) => {
                handle.mark_terminated();
                self.await_terminated(&id).await;
                report(ReleaseStatus::Released, Vec::new())
            }
            Err(e) => {
                let warning = ReleaseWarning {
                    resource: ResourceKind::Instance,
                    id: id.clone(),
                    detail: format!("terminate: {e:#}"),
                };
                tracing::warn!("{warning}");
                report(ReleaseStatus::Failed, vec![warning])
            }
        }
    }

    async fn await_terminated(&self, id: &str) {
        let policy = self.settings.timeouts.instance_terminated();
        // Teardown runs after cancellation; its waits use their own token.
        let never = Cancellation::new();
        let compute = self.compute;

        let outcome: Result<WaitOutcome<()>, ()> =
            poll_until(self.clock, &never, &policy, || async move {
                Ok(match compute.describe_instance(id).await {
                    Ok(o) if matches!(o.state, ObservedState::Terminated | ObservedState::Absent) => {
                        Probe::Ready(())
                    }
                    Ok(o) => Probe::Pending(format!("{:?}", o.state)),
                    Err(e) => Probe::Pending(format!("describe failed: {e:#}")),
                })
            })
            .await;

        match outcome {
            Ok(WaitOutcome::Ready(())) => tracing::info!(instance_id = %id, "instance terminated"),
            Ok(WaitOutcome::TimedOut { waited, last }) => tracing::warn!(
                instance_id = %id,
                waited_secs = waited.as_secs(),
                %last,
                "termination requested but not confirmed"
            ),
            Ok(WaitOutcome::Cancelled) | Err(()) => {}
        }
    }
}
