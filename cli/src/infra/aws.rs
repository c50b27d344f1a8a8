//! Infrastructure implementation of the `CloudCompute` port over the AWS CLI.
//!
//! `AwsCliCompute<R>` routes every EC2 call through a `CommandRunner` as
//! `aws ec2 <operation> ... --output json` and parses the JSON response.

use std::net::IpAddr;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::application::ports::{CloudCompute, CommandRunner, LaunchRequest};
use crate::domain::resources::{
    InstanceObservation, KeyMaterial, ObservedState, Removal, SESSION_TAG,
};

/// A non-zero exit from the AWS CLI.
#[derive(Debug, Error)]
#[error("aws ec2 {operation} failed: {message}")]
pub struct AwsCliError {
    pub operation: String,
    /// Error code such as `InvalidInstanceID.NotFound`, when the CLI printed one.
    pub code: Option<String>,
    pub message: String,
}

impl AwsCliError {
    fn from_stderr(operation: &str, stderr: &str) -> Self {
        // "An error occurred (InvalidKeyPair.NotFound) when calling the ..."
        let code = stderr
            .split_once("An error occurred (")
            .and_then(|(_, rest)| rest.split_once(')'))
            .map(|(code, _)| code.to_string());
        Self {
            operation: operation.to_string(),
            code,
            message: stderr.trim().to_string(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code.as_deref().is_some_and(|c| c.ends_with(".NotFound"))
    }
}

fn is_not_found(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<AwsCliError>()
        .is_some_and(AwsCliError::is_not_found)
}

// ── Response shapes ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateKeyPairOutput {
    key_material: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RunInstancesOutput {
    instances: Vec<LaunchedInstance>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LaunchedInstance {
    instance_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesOutput {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<DescribedInstance>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribedInstance {
    #[serde(default)]
    instance_id: String,
    state: StateName,
    public_ip_address: Option<String>,
    private_ip_address: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StateName {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TerminateInstancesOutput {
    #[serde(default)]
    terminating_instances: Vec<StateChange>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StateChange {
    previous_state: StateName,
}

// ── Adapter ──────────────────────────────────────────────────────────────────

/// Infrastructure adapter that routes all EC2 calls through a `CommandRunner`.
///
/// Generic over `R: CommandRunner` so that tests can inject a mock runner
/// without spawning real processes.
pub struct AwsCliCompute<R: CommandRunner> {
    runner: R,
    region: String,
    profile: Option<String>,
}

impl<R: CommandRunner> AwsCliCompute<R> {
    pub fn new(runner: R, region: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            runner,
            region: region.into(),
            profile,
        }
    }

    async fn ec2(&self, operation: &str, args: &[&str]) -> Result<Vec<u8>> {
        let mut full = vec!["ec2", operation];
        full.extend_from_slice(args);
        full.extend_from_slice(&["--region", self.region.as_str(), "--output", "json"]);
        if let Some(profile) = &self.profile {
            full.extend_from_slice(&["--profile", profile.as_str()]);
        }
        tracing::debug!(%operation, region = %self.region, "aws ec2 call");
        let output = self
            .runner
            .run("aws", &full)
            .await
            .with_context(|| format!("aws ec2 {operation}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AwsCliError::from_stderr(operation, &stderr).into());
        }
        Ok(output.stdout)
    }
}

fn tag_spec(resource_type: &str, session_id: &str) -> String {
    format!("ResourceType={resource_type},Tags=[{{Key={SESSION_TAG},Value={session_id}}},{{Key=Name,Value={session_id}}}]")
}

fn parse_ip(raw: Option<&str>) -> Option<IpAddr> {
    raw.filter(|s| !s.is_empty()).and_then(|s| s.parse().ok())
}

impl<R: CommandRunner> CloudCompute for AwsCliCompute<R> {
    async fn create_key_pair(&self, name: &str, session_id: &str) -> Result<KeyMaterial> {
        let tags = tag_spec("key-pair", session_id);
        let stdout = self
            .ec2(
                "create-key-pair",
                &["--key-name", name, "--tag-specifications", tags.as_str()],
            )
            .await?;
        let parsed: CreateKeyPairOutput =
            serde_json::from_slice(&stdout).context("parsing create-key-pair output")?;
        Ok(KeyMaterial::new(parsed.key_material))
    }

    async fn delete_key_pair(&self, name: &str) -> Result<Removal> {
        match self.ec2("delete-key-pair", &["--key-name", name]).await {
            Ok(_) => Ok(Removal::Removed),
            Err(e) if is_not_found(&e) => Ok(Removal::AlreadyAbsent),
            Err(e) => Err(e),
        }
    }

    async fn run_instance(&self, request: &LaunchRequest<'_>) -> Result<String> {
        let tags = tag_spec("instance", request.session_id);
        let mut args = vec![
            "--image-id",
            request.image_id,
            "--instance-type",
            request.instance_type,
            "--key-name",
            request.key_name,
            "--count",
            "1",
            "--client-token",
            request.client_token,
            "--tag-specifications",
            tags.as_str(),
        ];
        if !request.security_group_ids.is_empty() {
            args.push("--security-group-ids");
            args.extend(request.security_group_ids.iter().map(String::as_str));
        }
        if let Some(subnet) = request.subnet_id {
            args.push("--subnet-id");
            args.push(subnet);
        }
        let stdout = self.ec2("run-instances", &args).await?;
        let parsed: RunInstancesOutput =
            serde_json::from_slice(&stdout).context("parsing run-instances output")?;
        parsed
            .instances
            .into_iter()
            .next()
            .map(|i| i.instance_id)
            .ok_or_else(|| anyhow::anyhow!("run-instances returned no instance"))
    }

    async fn find_instance_by_token(&self, client_token: &str) -> Result<Option<String>> {
        let filter = format!("Name=client-token,Values={client_token}");
        let stdout = self
            .ec2("describe-instances", &["--filters", filter.as_str()])
            .await?;
        let parsed: DescribeInstancesOutput =
            serde_json::from_slice(&stdout).context("parsing describe-instances output")?;
        Ok(parsed
            .reservations
            .into_iter()
            .flat_map(|r| r.instances)
            .find(|i| {
                !matches!(
                    ObservedState::from_ec2(&i.state.name),
                    ObservedState::ShuttingDown | ObservedState::Terminated
                )
            })
            .map(|i| i.instance_id)
            .filter(|id| !id.is_empty()))
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<InstanceObservation> {
        let stdout = match self
            .ec2("describe-instances", &["--instance-ids", instance_id])
            .await
        {
            Ok(out) => out,
            Err(e) if is_not_found(&e) => return Ok(InstanceObservation::absent()),
            Err(e) => return Err(e),
        };
        let parsed: DescribeInstancesOutput =
            serde_json::from_slice(&stdout).context("parsing describe-instances output")?;
        let Some(instance) = parsed
            .reservations
            .into_iter()
            .flat_map(|r| r.instances)
            .next()
        else {
            return Ok(InstanceObservation::absent());
        };
        Ok(InstanceObservation {
            state: ObservedState::from_ec2(&instance.state.name),
            public_address: parse_ip(instance.public_ip_address.as_deref()),
            private_address: parse_ip(instance.private_ip_address.as_deref()),
        })
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<Removal> {
        let stdout = match self
            .ec2("terminate-instances", &["--instance-ids", instance_id])
            .await
        {
            Ok(out) => out,
            Err(e) if is_not_found(&e) => return Ok(Removal::AlreadyAbsent),
            Err(e) => return Err(e),
        };
        let parsed: TerminateInstancesOutput =
            serde_json::from_slice(&stdout).context("parsing terminate-instances output")?;
        let already = parsed
            .terminating_instances
            .first()
            .is_some_and(|c| c.previous_state.name == "terminated");
        Ok(if already {
            Removal::AlreadyAbsent
        } else {
            Removal::Removed
        })
    }
}
