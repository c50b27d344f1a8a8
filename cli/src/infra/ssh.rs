//! Infrastructure implementation of the `SecureShell` port over OpenSSH.
//!
//! One session is one OpenSSH control master. `connect` authenticates and
//! backgrounds the master; every `execute` multiplexes over its socket, so
//! all commands share a single authenticated connection.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::application::ports::{CommandRunner, SecureShell, ShellSession};
use crate::domain::error::SshError;
use crate::domain::remote::{CommandOutput, SshTarget};

/// Upper bound for one connection attempt, including authentication.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for one remote command (image pulls can be slow).
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(900);

/// The master exits this long after its last client goes away.
const CONTROL_PERSIST_SECS: u32 = 120;

/// Classify an `ssh` failure from its stderr.
#[must_use]
pub fn classify_failure(stderr: &str) -> SshError {
    const RETRYABLE: &[&str] = &[
        "Connection refused",
        "timed out",
        "No route to host",
        "Network is unreachable",
        "Connection reset",
        "Connection closed",
        "kex_exchange_identification",
        "Could not resolve hostname",
        "Host is down",
    ];
    let detail = stderr.trim().to_string();
    if stderr.contains("Permission denied") {
        SshError::AuthRejected(detail)
    } else if RETRYABLE.iter().any(|needle| stderr.contains(needle)) {
        SshError::Unreachable(detail)
    } else {
        SshError::Client(detail)
    }
}

/// OpenSSH client adapter. Generic over `R: CommandRunner` so tests can
/// inject a mock runner without spawning real processes.
pub struct OpenSshClient<R> {
    runner: R,
    exec_timeout: Duration,
}

impl<R: CommandRunner + Clone> OpenSshClient<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = timeout;
        self
    }
}

impl<R: CommandRunner + Clone> SecureShell for OpenSshClient<R> {
    type Session = OpenSshSession<R>;

    async fn connect(&self, target: &SshTarget) -> Result<Self::Session, SshError> {
        let dir = tempfile::Builder::new()
            .prefix("ephem-ssh-")
            .tempdir()
            .map_err(|e| SshError::Client(format!("cannot create control directory: {e}")))?;
        let session = OpenSshSession {
            runner: self.runner.clone(),
            target: target.clone(),
            dir,
            exec_timeout: self.exec_timeout,
        };

        let persist = format!("ControlPersist={CONTROL_PERSIST_SECS}");
        let mut args = session.common_args();
        args.extend(
            [
                "-f",
                "-N",
                "-o",
                "ControlMaster=yes",
                "-o",
                persist.as_str(),
                "-o",
                "ConnectTimeout=10",
            ]
            .map(String::from),
        );
        args.push(target.destination());

        tracing::debug!(destination = %target.destination(), "opening ssh control master");
        let output = session
            .ssh(&args, CONNECT_TIMEOUT)
            .await
            .map_err(|e| SshError::Unreachable(format!("{e:#}")))?;
        if output.status.success() {
            Ok(session)
        } else {
            Err(classify_failure(&String::from_utf8_lossy(&output.stderr)))
        }
    }
}

/// A live control-master session.
pub struct OpenSshSession<R> {
    runner: R,
    target: SshTarget,
    dir: TempDir,
    exec_timeout: Duration,
}

impl<R: CommandRunner> OpenSshSession<R> {
    fn control_path(&self) -> PathBuf {
        self.dir.path().join("ctl")
    }

    /// Options shared by the master and every multiplexed client.
    fn common_args(&self) -> Vec<String> {
        let known_hosts = self.dir.path().join("known_hosts");
        vec![
            "-i".to_string(),
            self.target.key_path.display().to_string(),
            "-p".to_string(),
            self.target.port.to_string(),
            "-o".to_string(),
            "IdentitiesOnly=yes".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("UserKnownHostsFile={}", known_hosts.display()),
            "-o".to_string(),
            format!("ControlPath={}", self.control_path().display()),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
        ]
    }

    async fn ssh(&self, args: &[String], timeout: Duration) -> Result<std::process::Output> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner.run_with_timeout("ssh", &args, timeout).await
    }

    async fn control(&self, op: &str) -> Result<std::process::Output> {
        let mut args = self.common_args();
        args.extend(["-O".to_string(), op.to_string(), self.target.destination()]);
        self.ssh(&args, CONNECT_TIMEOUT).await
    }

    async fn master_alive(&self) -> bool {
        self.control("check")
            .await
            .is_ok_and(|o| o.status.success())
    }
}

impl<R: CommandRunner> ShellSession for OpenSshSession<R> {
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, SshError> {
        let mut args = self.common_args();
        args.extend([
            "-o".to_string(),
            "ControlMaster=no".to_string(),
            self.target.destination(),
            command.to_string(),
        ]);
        let output = self
            .ssh(&args, self.exec_timeout)
            .await
            .map_err(|e| SshError::SessionLost(format!("{e:#}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_status = output.status.code();
        // 255 is ssh's own failure code, but a remote command may use it too.
        if exit_status == Some(255) && !self.master_alive().await {
            return Err(SshError::SessionLost(stderr.trim().to_string()));
        }
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
            exit_status,
        })
    }

    async fn close(self) -> Result<()> {
        let output = self.control("exit").await.context("stopping ssh control master")?;
        anyhow::ensure!(
            output.status.success(),
            "ssh -O exit failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        tracing::debug!(destination = %self.target.destination(), "ssh session closed");
        Ok(())
    }
}
