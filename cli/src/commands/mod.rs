//! Command implementations

pub mod cleanup;
pub mod config;
pub mod status;
pub mod up;
pub mod version;
pub mod workloads;
