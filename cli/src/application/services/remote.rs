//! Remote configuration: open one shell session, run the workload's
//! commands in order, close the session.

use crate::application::cancel::Cancellation;
use crate::application::ports::{Clock, ProgressReporter, SecureShell, ShellSession};
use crate::application::services::wait::{Probe, WaitOutcome, pause, poll_until};
use crate::domain::config::TimeoutSettings;
use crate::domain::error::{ConfigError, SshError};
use crate::domain::remote::{CommandResult, SshTarget};

pub struct RemoteConfigurator<'a, H, Cl> {
    shell: &'a H,
    clock: &'a Cl,
    timeouts: &'a TimeoutSettings,
}

impl<'a, H: SecureShell, Cl: Clock> RemoteConfigurator<'a, H, Cl> {
    #[must_use]
    pub fn new(shell: &'a H, clock: &'a Cl, timeouts: &'a TimeoutSettings) -> Self {
        Self {
            shell,
            clock,
            timeouts,
        }
    }

    /// Run `commands` in order over a single session.
    ///
    /// A command that exits non-zero is recorded and the sequence continues.
    /// The session is closed on every exit path once it has been opened.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the session cannot be opened, is lost, or
    /// `cancel` fires between commands.
    pub async fn configure(
        &self,
        target: &SshTarget,
        commands: &[String],
        cancel: &Cancellation,
        reporter: &impl ProgressReporter,
    ) -> Result<Vec<CommandResult>, ConfigError> {
        let mut session = self.connect(target, cancel, reporter).await?;
        let outcome = run_sequence(&mut session, target, commands, cancel, reporter).await;
        if let Err(e) = session.close().await {
            tracing::warn!(address = %target.address, error = %format!("{e:#}"), "closing session failed");
        }
        outcome
    }

    async fn connect(
        &self,
        target: &SshTarget,
        cancel: &Cancellation,
        reporter: &impl ProgressReporter,
    ) -> Result<H::Session, ConfigError> {
        let address = target.address.to_string();
        let grace = self.timeouts.grace_delay();
        reporter.step(&format!("Waiting for SSH on {address}..."));
        tracing::debug!(grace_secs = grace.as_secs(), "grace delay before first connection");
        if !pause(self.clock, cancel, grace).await {
            return Err(ConfigError::Interrupted);
        }

        let policy = self.timeouts.connect();
        let shell = self.shell;
        let outcome = poll_until(self.clock, cancel, &policy, || async move {
            match shell.connect(target).await {
                Ok(session) => Ok(Probe::Ready(session)),
                Err(SshError::Unreachable(detail)) => Ok(Probe::Pending(detail)),
                Err(SshError::AuthRejected(detail)) => Err(ConfigError::AuthFailed {
                    address: target.address.to_string(),
                    detail,
                }),
                Err(e @ (SshError::SessionLost(_) | SshError::Client(_))) => {
                    Err(ConfigError::ConnectionLost {
                        address: target.address.to_string(),
                        detail: e.to_string(),
                    })
                }
            }
        })
        .await?;

        match outcome {
            WaitOutcome::Ready(session) => {
                tracing::info!(%address, user = %target.user, "session established");
                reporter.success(&format!("Connected to {}", target.destination()));
                Ok(session)
            }
            WaitOutcome::TimedOut { waited, last } => Err(ConfigError::Unreachable {
                address,
                waited_secs: (grace + waited).as_secs(),
                detail: last,
            }),
            WaitOutcome::Cancelled => Err(ConfigError::Interrupted),
        }
    }
}

async fn run_sequence(
    session: &mut impl ShellSession,
    target: &SshTarget,
    commands: &[String],
    cancel: &Cancellation,
    reporter: &impl ProgressReporter,
) -> Result<Vec<CommandResult>, ConfigError> {
    let mut results = Vec::with_capacity(commands.len());
    for command in commands {
        if cancel.is_cancelled() {
            tracing::info!(completed = results.len(), "interrupted between commands");
            return Err(ConfigError::Interrupted);
        }
        reporter.step(&format!("Running: {command}"));
        let output = session.execute(command).await.map_err(|e| match e {
            SshError::AuthRejected(detail) => ConfigError::AuthFailed {
                address: target.address.to_string(),
                detail,
            },
            other => ConfigError::ConnectionLost {
                address: target.address.to_string(),
                detail: other.to_string(),
            },
        })?;
        let result = CommandResult::new(command, output);
        tracing::debug!(%command, exit_status = ?result.exit_status, "command finished");
        if result.succeeded() {
            reporter.success(command);
        } else {
            let status = result
                .exit_status
                .map_or_else(|| "no exit status".to_string(), |c| format!("exit {c}"));
            reporter.warn(&format!("{command} ({status})"));
        }
        results.push(result);
    }
    Ok(results)
}
