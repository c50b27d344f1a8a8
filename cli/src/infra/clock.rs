//! Wall-clock implementation of the `Clock` port.

use std::time::Duration;

use tokio::time::Instant;

use crate::application::ports::Clock;

pub struct TokioClock {
    started: Instant,
}

impl TokioClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
