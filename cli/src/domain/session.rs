//! Session state: which resources are live, in what order they were
//! acquired, and where the lifecycle currently stands.
//!
//! `SessionState` is owned by the lifecycle controller and is the only
//! place handles live. Teardown drains it newest-first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::ReleaseWarning;
use crate::domain::resources::{CredentialHandle, InstanceHandle, ResourceKind};

/// Lifecycle phases of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    CredentialAcquired,
    InstanceAcquired,
    Configured,
    /// An acquisition step failed or was interrupted; teardown follows.
    Failing,
    Releasing,
    Released,
}

/// A resource the session owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    Credential(CredentialHandle),
    Instance(InstanceHandle),
}

impl Resource {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Credential(_) => ResourceKind::Credential,
            Self::Instance(_) => ResourceKind::Instance,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Credential(h) => h.name(),
            Self::Instance(h) => h.id(),
        }
    }
}

/// A live resource tagged with its acquisition order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveHandle {
    pub order: u32,
    pub resource: Resource,
}

/// The controller's record of everything that currently exists.
#[derive(Debug, Clone)]
pub struct SessionState {
    session_id: String,
    created_at: DateTime<Utc>,
    phase: LifecycleState,
    live: Vec<LiveHandle>,
    unreleased: Vec<LiveHandle>,
    next_order: u32,
}

impl SessionState {
    #[must_use]
    pub fn new(session_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at,
            phase: LifecycleState::Idle,
            live: Vec::new(),
            unreleased: Vec::new(),
            next_order: 0,
        }
    }

    /// Rebuild a session from a persisted record so leftovers can be released.
    ///
    /// Handles whose release previously failed are live again.
    #[must_use]
    pub fn resume(record: &SessionRecord) -> Self {
        let mut live: Vec<LiveHandle> = record
            .live
            .iter()
            .chain(record.unreleased.iter())
            .cloned()
            .collect();
        live.sort_by_key(|h| h.order);
        let next_order = live.last().map_or(0, |h| h.order + 1);
        Self {
            session_id: record.session_id.clone(),
            created_at: record.created_at,
            phase: LifecycleState::Failing,
            live,
            unreleased: Vec::new(),
            next_order,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn phase(&self) -> LifecycleState {
        self.phase
    }

    #[must_use]
    pub fn live(&self) -> &[LiveHandle] {
        &self.live
    }

    #[must_use]
    pub fn unreleased(&self) -> &[LiveHandle] {
        &self.unreleased
    }

    /// Nothing live and nothing left behind.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.live.is_empty() && self.unreleased.is_empty()
    }

    fn push(&mut self, resource: Resource) {
        let order = self.next_order;
        self.next_order += 1;
        self.live.push(LiveHandle { order, resource });
    }

    fn advance(&mut self, to: LifecycleState) {
        if !matches!(
            self.phase,
            LifecycleState::Failing | LifecycleState::Releasing | LifecycleState::Released
        ) {
            self.phase = to;
        }
    }

    /// Record an acquired credential as live.
    pub fn record_credential(&mut self, handle: CredentialHandle) {
        self.push(Resource::Credential(handle));
        self.advance(LifecycleState::CredentialAcquired);
    }

    /// Record a created instance as live. Readiness is recorded in place
    /// later through [`Self::instance_mut`].
    pub fn record_instance(&mut self, handle: InstanceHandle) {
        self.push(Resource::Instance(handle));
        self.advance(LifecycleState::InstanceAcquired);
    }

    #[must_use]
    pub fn credential(&self) -> Option<&CredentialHandle> {
        self.live.iter().find_map(|h| match &h.resource {
            Resource::Credential(c) => Some(c),
            Resource::Instance(_) => None,
        })
    }

    #[must_use]
    pub fn instance(&self) -> Option<&InstanceHandle> {
        self.live.iter().find_map(|h| match &h.resource {
            Resource::Instance(i) => Some(i),
            Resource::Credential(_) => None,
        })
    }

    pub fn instance_mut(&mut self) -> Option<&mut InstanceHandle> {
        self.live.iter_mut().find_map(|h| match &mut h.resource {
            Resource::Instance(i) => Some(i),
            Resource::Credential(_) => None,
        })
    }

    pub fn mark_configured(&mut self) {
        self.advance(LifecycleState::Configured);
    }

    pub fn mark_failing(&mut self) {
        self.advance(LifecycleState::Failing);
    }

    pub fn begin_release(&mut self) {
        if self.phase != LifecycleState::Released {
            self.phase = LifecycleState::Releasing;
        }
    }

    /// Remove and return the most recently acquired live handle.
    pub fn take_latest(&mut self) -> Option<LiveHandle> {
        let idx = self
            .live
            .iter()
            .enumerate()
            .max_by_key(|(_, h)| h.order)
            .map(|(i, _)| i)?;
        Some(self.live.remove(idx))
    }

    /// Keep a handle whose release failed so it can be retried later.
    pub fn remember_unreleased(&mut self, handle: LiveHandle) {
        self.unreleased.push(handle);
    }

    pub fn finish_release(&mut self) {
        self.phase = LifecycleState::Released;
    }

    /// Snapshot for persistence.
    #[must_use]
    pub fn to_record(&self, context: &RecordContext) -> SessionRecord {
        SessionRecord {
            session_id: self.session_id.clone(),
            created_at: self.created_at,
            updated_at: Utc::now(),
            phase: self.phase,
            region: context.region.clone(),
            profile: context.profile.clone(),
            workload: context.workload.clone(),
            live: self.live.clone(),
            unreleased: self.unreleased.clone(),
        }
    }
}

/// Run-level facts stored next to the handles.
#[derive(Debug, Clone, Default)]
pub struct RecordContext {
    pub region: String,
    pub profile: Option<String>,
    pub workload: Option<String>,
}

/// Session snapshot persisted to `~/.ephem/session.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub phase: LifecycleState,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload: Option<String>,
    #[serde(default)]
    pub live: Vec<LiveHandle>,
    #[serde(default)]
    pub unreleased: Vec<LiveHandle>,
}

impl SessionRecord {
    /// Whether anything in this record may still exist on the provider.
    #[must_use]
    pub fn has_resources(&self) -> bool {
        !self.live.is_empty() || !self.unreleased.is_empty()
    }
}

// ── Teardown reporting ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    Released,
    AlreadyAbsent,
    Failed,
}

/// What happened to one resource during teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    pub resource: ResourceKind,
    pub id: String,
    pub status: ReleaseStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ReleaseWarning>,
}

/// Per-resource outcome of one teardown pass, in release order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub releases: Vec<ReleaseReport>,
}

impl TeardownReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.releases
            .iter()
            .all(|r| r.status != ReleaseStatus::Failed && r.warnings.is_empty())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ReleaseWarning> {
        self.releases.iter().flat_map(|r| r.warnings.iter())
    }
}

/// Why the configured workload was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseCause {
    /// The operator asked for it (Enter, or stdin closed).
    Operator,
    /// The `--hold` timer elapsed.
    HoldElapsed,
    /// A termination signal arrived.
    Signal,
}
