//! Resource handles: the credential and the instance a session acquires.
//!
//! Pure data and state transitions. No I/O.

use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Prefix shared by every name this tool generates on the provider.
pub const NAME_PREFIX: &str = "ephem-";

/// Tag key attached to provider resources so a session can be traced back.
pub const SESSION_TAG: &str = "ephem:session";

// ── Kinds and removal outcomes ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Credential,
    Instance,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credential => f.write_str("credential"),
            Self::Instance => f.write_str("instance"),
        }
    }
}

/// Outcome of deleting something that may already be gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    AlreadyAbsent,
}

// ── Credential ────────────────────────────────────────────────────────────────

/// Private key material. The provider hands it out exactly once.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    #[must_use]
    pub fn new(material: impl Into<String>) -> Self {
        Self(material.into())
    }

    /// Borrow the secret. Callers must not log it.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

/// A provider-registered key pair plus its locally stored private material.
///
/// Both halves are created together and released together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialHandle {
    name: String,
    key_path: PathBuf,
    registered: bool,
}

impl CredentialHandle {
    #[must_use]
    pub fn new(name: impl Into<String>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            registered: true,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Whether the provider side is still believed to exist.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn mark_deregistered(&mut self) {
        self.registered = false;
    }
}

// ── Instance ──────────────────────────────────────────────────────────────────

/// Lifecycle of an instance as tracked by this tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Requested,
    Running,
    Terminated,
}

/// A provider-assigned compute instance.
///
/// The address is fixed the first time the instance is seen running and
/// never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceHandle {
    id: String,
    state: InstanceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<IpAddr>,
}

impl InstanceHandle {
    /// A freshly created instance that has not been confirmed running.
    #[must_use]
    pub fn requested(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: InstanceState::Requested,
            address: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn state(&self) -> InstanceState {
        self.state
    }

    #[must_use]
    pub fn address(&self) -> Option<IpAddr> {
        self.address
    }

    /// Record the running state and its address.
    ///
    /// Returns `false` and leaves the handle untouched if an address was
    /// already recorded.
    pub fn mark_running(&mut self, address: IpAddr) -> bool {
        if self.address.is_some() || self.state == InstanceState::Terminated {
            return false;
        }
        self.state = InstanceState::Running;
        self.address = Some(address);
        true
    }

    pub fn mark_terminated(&mut self) {
        self.state = InstanceState::Terminated;
    }
}

/// Instance state as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
    /// The provider no longer knows the instance id.
    Absent,
}

impl ObservedState {
    /// Map an EC2 state name (`pending`, `running`, ...).
    #[must_use]
    pub fn from_ec2(name: &str) -> Self {
        match name {
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "shutting-down" => Self::ShuttingDown,
            "terminated" => Self::Terminated,
            _ => Self::Pending,
        }
    }

    /// The instance can never become running again.
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Terminated | Self::Absent)
    }
}

/// One `describe` answer from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceObservation {
    pub state: ObservedState,
    pub public_address: Option<IpAddr>,
    pub private_address: Option<IpAddr>,
}

impl InstanceObservation {
    #[must_use]
    pub fn absent() -> Self {
        Self {
            state: ObservedState::Absent,
            public_address: None,
            private_address: None,
        }
    }
}

// ── Names ─────────────────────────────────────────────────────────────────────

/// Generate a unique resource name: `ephem-` followed by 16 lowercase hex chars.
///
/// Entropy sources: nanosecond timestamp, process id and two independent
/// `RandomState` hashes.
#[must_use]
pub fn generate_resource_name() -> String {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u128(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    );
    hasher.write_u32(std::process::id());
    hasher.write_u64(RandomState::new().build_hasher().finish());
    hasher.write_u64(RandomState::new().build_hasher().finish());
    format!("{NAME_PREFIX}{:016x}", hasher.finish())
}

/// Validates a generated resource name (`ephem-` + 16 hex chars).
///
/// # Errors
///
/// Returns an error if the name doesn't match the expected format.
pub fn validate_resource_name(name: &str) -> Result<()> {
    let Some(suffix) = name.strip_prefix(NAME_PREFIX) else {
        anyhow::bail!("invalid resource name: {name}");
    };
    anyhow::ensure!(
        suffix.len() == 16 && suffix.chars().all(|c| c.is_ascii_hexdigit()),
        "invalid resource name: {name}"
    );
    Ok(())
}
