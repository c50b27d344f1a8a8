//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, the AWS
//! CLI and OpenSSH adapters, filesystem persistence, time and signals.
//!
//! Imports from `crate::domain` and `crate::application` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod aws;
pub mod clock;
pub mod command_runner;
pub mod config;
pub mod key_store;
pub mod signals;
pub mod ssh;
pub mod state;
pub mod trigger;
