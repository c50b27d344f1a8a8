//! Release trigger on standard input, with an optional hold timer.
//!
//! The line is read on a detached OS thread: a read that never completes
//! must not hold up runtime shutdown after a signal or the hold timer wins.

use std::io::{self, BufRead, BufReader};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::application::ports::ReleaseTrigger;
use crate::domain::session::ReleaseCause;

type LineSource = Box<dyn BufRead + Send>;
type LineRead = oneshot::Receiver<io::Result<usize>>;

/// Releases on Enter, on end of input, or when the hold timer elapses.
///
/// With a hold timer set, end of input is not a release: the timer alone
/// decides, so `ephem up --hold 600 < /dev/null` runs for ten minutes.
pub struct StdinTrigger {
    hold: Option<Duration>,
    source: Option<LineSource>,
    pending: Option<LineRead>,
}

impl StdinTrigger {
    #[must_use]
    pub fn new(hold: Option<Duration>) -> Self {
        Self::with_source(hold, BufReader::new(io::stdin()))
    }

    /// A trigger reading its release line from `source` instead of stdin.
    #[must_use]
    pub fn with_source(hold: Option<Duration>, source: impl BufRead + Send + 'static) -> Self {
        Self {
            hold,
            source: Some(Box::new(source)),
            pending: None,
        }
    }

    /// Start the reader thread on first use; later waits share its result.
    fn line_read(&mut self) -> &mut Option<LineRead> {
        if self.pending.is_some() {
            return &mut self.pending;
        }
        if let Some(mut source) = self.source.take() {
            let (tx, rx) = oneshot::channel();
            let spawned = std::thread::Builder::new()
                .name("ephem-release-line".to_string())
                .spawn(move || {
                    let mut line = String::new();
                    let _ = tx.send(source.read_line(&mut line));
                });
            match spawned {
                Ok(_) => self.pending = Some(rx),
                Err(e) => tracing::warn!(error = %e, "cannot watch stdin; waiting for signal or timer"),
            }
        }
        &mut self.pending
    }
}

impl ReleaseTrigger for StdinTrigger {
    async fn wait(&mut self) -> ReleaseCause {
        let hold = self.hold;
        let timer = async {
            match hold {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending().await,
            }
        };
        let slot = self.line_read();
        let operator = async move {
            let Some(rx) = slot.as_mut() else {
                return std::future::pending().await;
            };
            let read = rx.await;
            *slot = None;
            match read {
                Ok(Ok(0) | Err(_)) | Err(_) if hold.is_some() => std::future::pending().await,
                _ => ReleaseCause::Operator,
            }
        };
        tokio::select! {
            cause = operator => cause,
            () = timer => ReleaseCause::HoldElapsed,
        }
    }
}
