//! Domain layer: pure types, state transitions, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, or `std::process`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod remote;
pub mod resources;
pub mod session;
pub mod wait;
pub mod workload;

#[allow(unused_imports)]
pub use config::{Settings, validate_setting_key, validate_setting_value};
#[allow(unused_imports)]
pub use error::{
    ConfigError, ProvisionError, ReleaseWarning, SessionError, SettingsError, SshError,
    WorkloadError,
};
#[allow(unused_imports)]
pub use resources::{CredentialHandle, InstanceHandle, ResourceKind};
#[allow(unused_imports)]
pub use session::{LifecycleState, SessionRecord, SessionState, TeardownReport};
#[allow(unused_imports)]
pub use workload::{Workload, WorkloadSelection};
