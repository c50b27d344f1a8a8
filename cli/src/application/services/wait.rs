//! Bounded polling with backoff over an injectable clock.
//!
//! Every wait in the lifecycle goes through here, so every wait is bounded
//! and every wait observes cancellation.

use std::future::Future;
use std::time::Duration;

use crate::application::cancel::Cancellation;
use crate::application::ports::Clock;
use crate::domain::wait::WaitPolicy;

/// One probe result.
#[derive(Debug)]
pub enum Probe<T> {
    Ready(T),
    /// Not yet; the string describes what was seen.
    Pending(String),
}

/// How a wait ended.
#[derive(Debug)]
pub enum WaitOutcome<T> {
    Ready(T),
    TimedOut { waited: Duration, last: String },
    Cancelled,
}

/// Sleep for `duration` unless cancelled first.
///
/// Returns `false` if the wait was cut short by cancellation.
pub async fn pause(clock: &impl Clock, cancel: &Cancellation, duration: Duration) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = clock.sleep(duration) => true,
    }
}

/// Call `probe` until it is ready, the policy's timeout elapses, or the
/// token is cancelled.
///
/// The probe always runs at least once. Delays between probes follow the
/// policy's backoff and never overshoot the deadline.
///
/// # Errors
///
/// Returns the first error the probe reports; errors are never retried.
pub async fn poll_until<T, E, F, Fut>(
    clock: &impl Clock,
    cancel: &Cancellation,
    policy: &WaitPolicy,
    mut probe: F,
) -> Result<WaitOutcome<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>, E>>,
{
    let started = clock.elapsed();
    let mut delays = policy.backoff.delays();
    loop {
        if cancel.is_cancelled() {
            return Ok(WaitOutcome::Cancelled);
        }
        let last = match probe().await? {
            Probe::Ready(value) => return Ok(WaitOutcome::Ready(value)),
            Probe::Pending(last) => last,
        };
        let waited = clock.elapsed().saturating_sub(started);
        if waited >= policy.timeout {
            return Ok(WaitOutcome::TimedOut { waited, last });
        }
        let delay = delays
            .next()
            .unwrap_or(policy.backoff.max)
            .min(policy.timeout - waited);
        tracing::debug!(?delay, %last, "not ready, backing off");
        if !pause(clock, cancel, delay).await {
            return Ok(WaitOutcome::Cancelled);
        }
    }
}
