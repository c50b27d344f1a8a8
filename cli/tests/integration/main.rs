//! Integration tests for the ephem CLI
//!
//! These tests spawn the actual binary. None of them reach a cloud provider:
//! they cover argument parsing, settings and the local session record.

mod cli_tests;
