//! Host prerequisite checks: the AWS CLI (v2) and an OpenSSH client.

use anyhow::Result;
use serde::Serialize;

use crate::application::ports::CommandRunner;

const AWS_CLI_MIN_VERSION: semver::Version = semver::Version::new(2, 0, 0);

/// Tool versions found on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prerequisites {
    pub aws_cli: String,
    pub ssh: String,
}

/// Verify both external tools are installed and usable.
///
/// # Errors
///
/// Returns an error naming the missing or outdated tool.
pub async fn check(runner: &impl CommandRunner) -> Result<Prerequisites> {
    let output = runner.run("aws", &["--version"]).await.map_err(|_| {
        anyhow::anyhow!("AWS CLI not found.\n\nInstall AWS CLI v2: https://aws.amazon.com/cli/")
    })?;
    // v1 prints its version to stderr.
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let Some(version) = parse_aws_cli_version(&text) else {
        anyhow::bail!("Could not determine AWS CLI version from: {}", text.trim());
    };
    if version < AWS_CLI_MIN_VERSION {
        anyhow::bail!(
            "AWS CLI {version} is too old.\n\nInstall AWS CLI v2: https://aws.amazon.com/cli/"
        );
    }

    let output = runner
        .run("ssh", &["-V"])
        .await
        .map_err(|_| anyhow::anyhow!("OpenSSH client not found.\n\nInstall an ssh client."))?;
    anyhow::ensure!(
        output.status.success(),
        "OpenSSH client is not usable: {}",
        String::from_utf8_lossy(&output.stderr).trim()
    );
    // `ssh -V` writes to stderr.
    let ssh = String::from_utf8_lossy(&output.stderr)
        .split([',', ' '])
        .next()
        .unwrap_or_default()
        .to_string();

    tracing::debug!(aws_cli = %version, %ssh, "prerequisites ok");
    Ok(Prerequisites {
        aws_cli: version.to_string(),
        ssh,
    })
}

/// Extract the version from `aws-cli/2.15.0 Python/3.11.6 ...`.
#[must_use]
pub fn parse_aws_cli_version(text: &str) -> Option<semver::Version> {
    text.split_whitespace()
        .find_map(|word| word.strip_prefix("aws-cli/"))
        .and_then(|v| semver::Version::parse(v).ok())
}
