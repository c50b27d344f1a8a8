//! Domain types and validators for ephem settings.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::SettingsError;
use crate::domain::wait::{Backoff, WaitPolicy};
use crate::domain::workload::IMAGE_REF_RE;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_SETTING_KEYS: &[&str] = &[
    "region",
    "profile",
    "instance.image_id",
    "instance.instance_type",
    "instance.security_group_ids",
    "instance.subnet_id",
    "ssh.user",
    "ssh.port",
    "ssh.address",
    "timeouts.instance_ready_secs",
    "timeouts.instance_terminated_secs",
    "timeouts.grace_delay_secs",
    "timeouts.connect_secs",
    "workloads.custom_image",
];

macro_rules! pattern {
    ($name:ident, $re:literal) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new($re).expect("valid regex")
        });
    };
}

pattern!(REGION_RE, r"^[a-z]{2}(-gov)?-[a-z]+-\d$");
pattern!(AMI_RE, r"^ami-([0-9a-f]{8}|[0-9a-f]{17})$");
pattern!(INSTANCE_TYPE_RE, r"^[a-z][a-z0-9-]*\.[a-z0-9]+$");
pattern!(SECURITY_GROUP_RE, r"^sg-([0-9a-f]{8}|[0-9a-f]{17})$");
pattern!(SUBNET_RE, r"^subnet-([0-9a-f]{8}|[0-9a-f]{17})$");
pattern!(SSH_USER_RE, r"^[a-z_][a-z0-9_-]{0,31}$");
pattern!(PROFILE_RE, r"^[A-Za-z0-9_.-]{1,64}$");

// ── Settings schema ──────────────────────────────────────────────────────────

/// Top-level settings stored in `~/.ephem/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// AWS region, e.g. `ap-south-1`.
    pub region: String,
    /// Named AWS CLI profile. Uses the CLI's default chain when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub instance: InstanceSettings,
    pub ssh: SshSettings,
    pub timeouts: TimeoutSettings,
    pub workloads: WorkloadSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region: "ap-south-1".to_string(),
            profile: None,
            instance: InstanceSettings::default(),
            ssh: SshSettings::default(),
            timeouts: TimeoutSettings::default(),
            workloads: WorkloadSettings::default(),
        }
    }
}

/// Machine, image and network placement for the instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceSettings {
    pub image_id: String,
    pub instance_type: String,
    /// Empty means the VPC's default security group.
    pub security_group_ids: Vec<String>,
    /// Unset means the default subnet of the default VPC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            image_id: "ami-0a4408457f9a03be3".to_string(),
            instance_type: "t2.micro".to_string(),
            security_group_ids: Vec::new(),
            subnet_id: None,
        }
    }
}

/// Which instance address the SSH client connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    #[default]
    Public,
    /// For runs from inside the same VPC.
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub user: String,
    pub port: u16,
    pub address: AddressKind,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: "ec2-user".to_string(),
            port: 22,
            address: AddressKind::Public,
        }
    }
}

/// Upper bounds for every blocking wait, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub instance_ready_secs: u64,
    pub instance_terminated_secs: u64,
    /// Pause between "running" and the first connection attempt.
    pub grace_delay_secs: u64,
    /// Total budget for SSH connection attempts after the grace delay.
    pub connect_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            instance_ready_secs: 300,
            instance_terminated_secs: 300,
            grace_delay_secs: 10,
            connect_secs: 180,
        }
    }
}

impl TimeoutSettings {
    #[must_use]
    pub fn instance_ready(&self) -> WaitPolicy {
        WaitPolicy::new(Duration::from_secs(self.instance_ready_secs))
    }

    #[must_use]
    pub fn instance_terminated(&self) -> WaitPolicy {
        WaitPolicy::new(Duration::from_secs(self.instance_terminated_secs))
    }

    #[must_use]
    pub fn grace_delay(&self) -> Duration {
        Duration::from_secs(self.grace_delay_secs)
    }

    #[must_use]
    pub fn connect(&self) -> WaitPolicy {
        WaitPolicy::new(Duration::from_secs(self.connect_secs)).with_backoff(Backoff {
            initial: Duration::from_secs(3),
            max: Duration::from_secs(20),
            factor: 2,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadSettings {
    /// Image for workload C.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_image: Option<String>,
}

// ── Key/value access ─────────────────────────────────────────────────────────

impl Settings {
    /// Every whitelisted key with its current display value.
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        VALID_SETTING_KEYS
            .iter()
            .map(|key| (*key, self.get(key).unwrap_or_default()))
            .collect()
    }

    /// Display value for `key`; `None` for unknown keys.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "(unset)".to_string());
        Some(match key {
            "region" => self.region.clone(),
            "profile" => opt(&self.profile),
            "instance.image_id" => self.instance.image_id.clone(),
            "instance.instance_type" => self.instance.instance_type.clone(),
            "instance.security_group_ids" => {
                if self.instance.security_group_ids.is_empty() {
                    "(default)".to_string()
                } else {
                    self.instance.security_group_ids.join(",")
                }
            }
            "instance.subnet_id" => opt(&self.instance.subnet_id),
            "ssh.user" => self.ssh.user.clone(),
            "ssh.port" => self.ssh.port.to_string(),
            "ssh.address" => match self.ssh.address {
                AddressKind::Public => "public".to_string(),
                AddressKind::Private => "private".to_string(),
            },
            "timeouts.instance_ready_secs" => self.timeouts.instance_ready_secs.to_string(),
            "timeouts.instance_terminated_secs" => {
                self.timeouts.instance_terminated_secs.to_string()
            }
            "timeouts.grace_delay_secs" => self.timeouts.grace_delay_secs.to_string(),
            "timeouts.connect_secs" => self.timeouts.connect_secs.to_string(),
            "workloads.custom_image" => opt(&self.workloads.custom_image),
            _ => return None,
        })
    }

    /// Validate and apply `key = value`.
    ///
    /// An empty value clears optional keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid for it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        validate_setting_key(key)?;
        validate_setting_value(key, value)?;
        let value = value.trim();
        let optional = || (!value.is_empty()).then(|| value.to_string());
        match key {
            "region" => self.region = value.to_string(),
            "profile" => self.profile = optional(),
            "instance.image_id" => self.instance.image_id = value.to_string(),
            "instance.instance_type" => self.instance.instance_type = value.to_string(),
            "instance.security_group_ids" => {
                self.instance.security_group_ids = split_list(value);
            }
            "instance.subnet_id" => self.instance.subnet_id = optional(),
            "ssh.user" => self.ssh.user = value.to_string(),
            "ssh.port" => self.ssh.port = parse_number(key, value)?,
            "ssh.address" => {
                self.ssh.address = if value == "private" {
                    AddressKind::Private
                } else {
                    AddressKind::Public
                };
            }
            "timeouts.instance_ready_secs" => {
                self.timeouts.instance_ready_secs = parse_number(key, value)?;
            }
            "timeouts.instance_terminated_secs" => {
                self.timeouts.instance_terminated_secs = parse_number(key, value)?;
            }
            "timeouts.grace_delay_secs" => {
                self.timeouts.grace_delay_secs = parse_number(key, value)?;
            }
            "timeouts.connect_secs" => self.timeouts.connect_secs = parse_number(key, value)?,
            "workloads.custom_image" => self.workloads.custom_image = optional(),
            other => return Err(unknown_key(other)),
        }
        Ok(())
    }

    /// Validate every field, e.g. after loading a hand-edited file.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for key in VALID_SETTING_KEYS {
            let value = match *key {
                "instance.security_group_ids" => self.instance.security_group_ids.join(","),
                "profile" => self.profile.clone().unwrap_or_default(),
                "instance.subnet_id" => self.instance.subnet_id.clone().unwrap_or_default(),
                "workloads.custom_image" => {
                    self.workloads.custom_image.clone().unwrap_or_default()
                }
                _ => self.get(key).unwrap_or_default(),
            };
            validate_setting_value(key, &value)?;
        }
        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SettingsError> {
    value.parse().map_err(|_| SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: "a whole number".to_string(),
    })
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a settings key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_setting_key(key: &str) -> Result<(), SettingsError> {
    if !VALID_SETTING_KEYS.contains(&key) {
        return Err(unknown_key(key));
    }
    Ok(())
}

fn unknown_key(key: &str) -> SettingsError {
    SettingsError::UnknownKey {
        key: key.to_string(),
        valid: VALID_SETTING_KEYS.join(", "),
    }
}

/// Validates a settings value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_setting_value(key: &str, value: &str) -> Result<(), SettingsError> {
    let value = value.trim();
    let matches = |re: &Regex| re.is_match(value);
    let (ok, expected) = match key {
        "region" => (matches(&REGION_RE), "an AWS region such as ap-south-1"),
        "profile" => (
            value.is_empty() || matches(&PROFILE_RE),
            "an AWS CLI profile name (empty to unset)",
        ),
        "instance.image_id" => (matches(&AMI_RE), "an AMI id such as ami-0a4408457f9a03be3"),
        "instance.instance_type" => (
            matches(&INSTANCE_TYPE_RE),
            "an instance type such as t2.micro",
        ),
        "instance.security_group_ids" => (
            split_list(value)
                .iter()
                .all(|id| SECURITY_GROUP_RE.is_match(id)),
            "comma-separated security group ids (sg-...), empty for the default",
        ),
        "instance.subnet_id" => (
            value.is_empty() || matches(&SUBNET_RE),
            "a subnet id such as subnet-0c6dd7426c8cefa3f (empty to unset)",
        ),
        "ssh.user" => (matches(&SSH_USER_RE), "a unix user name"),
        "ssh.port" => (
            value.parse::<u16>().is_ok_and(|p| p > 0),
            "a port number between 1 and 65535",
        ),
        "ssh.address" => (
            matches!(value, "public" | "private"),
            "public or private",
        ),
        "timeouts.instance_ready_secs"
        | "timeouts.instance_terminated_secs"
        | "timeouts.connect_secs" => (
            value.parse::<u64>().is_ok_and(|s| (1..=3600).contains(&s)),
            "seconds between 1 and 3600",
        ),
        "timeouts.grace_delay_secs" => (
            value.parse::<u64>().is_ok_and(|s| s <= 600),
            "seconds between 0 and 600",
        ),
        "workloads.custom_image" => (
            value.is_empty() || IMAGE_REF_RE.is_match(value),
            "a Docker image reference (empty to unset)",
        ),
        _ => return validate_setting_key(key),
    };
    if ok {
        Ok(())
    } else {
        Err(SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        })
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
