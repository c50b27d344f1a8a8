//! Application layer: port trait definitions and use-case orchestration.
//!
//! This module depends only on `crate::domain`, never on `crate::infra`,
//! `crate::commands`, or `crate::output`.

pub mod cancel;
pub mod ports;
pub mod services;

#[allow(unused_imports)]
pub use cancel::Cancellation;
#[allow(unused_imports)]
pub use ports::{
    CloudCompute, Clock, CommandRunner, KeyStore, LaunchRequest, ProgressReporter,
    ReleaseTrigger, SecureShell, SessionStore, SettingsStore, ShellSession,
};
