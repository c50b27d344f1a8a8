//! Remote command execution types.

use std::net::IpAddr;
use std::path::PathBuf;

use serde::Serialize;

/// Where and as whom to open a shell session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub address: IpAddr,
    pub port: u16,
    pub user: String,
    pub key_path: PathBuf,
}

impl SshTarget {
    /// `user@address`, as passed to an SSH client.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }
}

/// Captured output of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the remote side reported no exit status.
    pub exit_status: Option<i32>,
}

/// One executed command with everything it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_status: Option<i32>,
}

impl CommandResult {
    #[must_use]
    pub fn new(command: &str, output: CommandOutput) -> Self {
        Self {
            command: command.to_string(),
            stdout: output.stdout,
            stderr: output.stderr,
            exit_status: output.exit_status,
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_status == Some(0)
    }
}
