//! The service run loop: idle in fixed intervals until shutdown is requested.

use crate::config::SLEEP_INTERVAL;
use crate::signals::Shutdown;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Run loop states. `Stopping` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopping,
}

/// What the run loop reports after it stops.
#[derive(Debug)]
pub struct RunSummary {
    /// Number of full sleep intervals completed.
    pub ticks: u64,
    /// Wall-clock time spent in the loop.
    pub elapsed: Duration,
}

pub struct ServiceRunner {
    shutdown: Arc<Shutdown>,
    interval: Duration,
}

impl ServiceRunner {
    pub fn new(shutdown: Arc<Shutdown>) -> Self {
        Self {
            shutdown,
            interval: SLEEP_INTERVAL,
        }
    }

    /// Override the sleep interval.
    #[cfg(test)]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Idle until shutdown is requested, then return.
    ///
    /// A shutdown request interrupts the current sleep, so the loop stops at
    /// most one interval after the request. A request made before the call
    /// stops the loop before its first sleep.
    #[tracing::instrument(skip_all)]
    pub async fn run(&self) -> RunSummary {
        info!("Starting pylftpd");
        let started = Instant::now();
        let mut ticks = 0u64;
        let mut state = RunState::Running;

        // Worker tasks get started here once the service has any.
        while state == RunState::Running {
            tokio::select! {
                biased;
                _ = self.shutdown.wait() => {
                    state = RunState::Stopping;
                    debug!(ticks, "shutdown requested, stopping");
                }
                _ = tokio::time::sleep(self.interval) => {
                    ticks += 1;
                }
            }
        }
        // ...and joined here.

        info!("Finished pylftpd");
        RunSummary {
            ticks,
            elapsed: started.elapsed(),
        }
    }
}
