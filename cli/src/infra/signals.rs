//! Termination signal listener.
//!
//! The listener only flips the cancellation token. It keeps running after
//! the first signal so later ones are absorbed instead of killing the
//! process in the middle of teardown.

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use crate::application::cancel::Cancellation;

/// Listen for SIGINT, SIGTERM and SIGHUP on a background task.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be registered.
#[cfg(unix)]
pub fn spawn_listener(cancel: Cancellation) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt()).context("registering SIGINT handler")?;
    let mut terminate = signal(SignalKind::terminate()).context("registering SIGTERM handler")?;
    let mut hangup = signal(SignalKind::hangup()).context("registering SIGHUP handler")?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                Some(()) = interrupt.recv() => "SIGINT",
                Some(()) = terminate.recv() => "SIGTERM",
                Some(()) = hangup.recv() => "SIGHUP",
                else => break,
            };
            note(&cancel, name);
        }
    }))
}

/// Listen for Ctrl-C on a background task.
///
/// # Errors
///
/// Never fails on this platform.
#[cfg(not(unix))]
pub fn spawn_listener(cancel: Cancellation) -> Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            note(&cancel, "Ctrl-C");
        }
    }))
}

fn note(cancel: &Cancellation, name: &str) {
    if cancel.is_cancelled() {
        tracing::info!(signal = name, "teardown already in progress, ignoring");
    } else {
        tracing::info!(signal = name, "termination requested");
        cancel.cancel();
    }
}
