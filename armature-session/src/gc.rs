//! Periodic garbage collection of session drivers.

use crate::driver::Driver;
use crate::error::{SessionError, SessionResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type SweepJob = JoinHandle<SessionResult<()>>;

/// Background task sweeping one driver on a fixed period.
///
/// The first sweep runs one full period after the task is spawned. A failed
/// sweep is logged and the schedule carries on. A sweep that outlives the
/// timeout keeps running on the blocking pool; ticks are skipped until it
/// finishes, so at most one sweep per driver is ever in flight.
#[derive(Debug)]
pub struct GcTask {
    driver: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl GcTask {
    /// Spawn the sweep loop on the current Tokio runtime.
    ///
    /// Each sweep calls `driver.gc(max_lifetime_secs)` on the blocking pool,
    /// bounded by `timeout` when given.
    pub fn spawn(
        name: impl Into<String>,
        driver: Arc<dyn Driver>,
        period: Duration,
        max_lifetime_secs: u64,
        timeout: Option<Duration>,
    ) -> SessionResult<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            SessionError::Runtime(format!("session GC requires a Tokio runtime: {}", e))
        })?;

        if period.is_zero() {
            return Err(SessionError::Config("GC period must be non-zero".to_string()));
        }

        let start = Instant::now()
            .checked_add(period)
            .ok_or_else(|| SessionError::Config(format!("GC period {:?} is too large", period)))?;

        let name = name.into();
        let token = CancellationToken::new();

        let task_name = name.clone();
        let task_token = token.clone();
        let handle = runtime.spawn(async move {
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut in_flight: Option<SweepJob> = None;

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Some(job) = in_flight.take() {
                            if !job.is_finished() {
                                warn!(driver = %task_name, "Previous session GC sweep still running; skipping this cycle");
                                in_flight = Some(job);
                                continue;
                            }
                            log_outcome(&task_name, job.await);
                        }

                        in_flight = sweep(&task_name, &driver, max_lifetime_secs, timeout).await;
                    }
                }
            }

            if let Some(job) = in_flight {
                debug!(driver = %task_name, "Waiting for running session GC sweep");
                log_outcome(&task_name, job.await);
            }

            debug!(driver = %task_name, "Session GC stopped");
        });

        info!(driver = %name, period = ?period, "Scheduled session GC");

        Ok(Self {
            driver: name,
            token,
            handle,
        })
    }

    /// Name of the swept driver.
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Request the loop to stop after the current sweep.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the loop has been asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the loop and wait for it to finish, including a sweep that is
    /// still running past its timeout.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                error!(driver = %self.driver, error = %e, "Session GC task failed");
            }
        }
    }
}

/// Run one sweep. Returns the job if it is still running when the timeout
/// expires.
async fn sweep(
    name: &str,
    driver: &Arc<dyn Driver>,
    max_lifetime_secs: u64,
    timeout: Option<Duration>,
) -> Option<SweepJob> {
    let driver = driver.clone();
    let mut job = tokio::task::spawn_blocking(move || driver.gc(max_lifetime_secs));

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut job).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(driver = %name, timeout = ?limit, "Session GC timed out; sweep continues in the background");
                return Some(job);
            }
        },
        None => job.await,
    };

    log_outcome(name, outcome);
    None
}

fn log_outcome(name: &str, outcome: Result<SessionResult<()>, tokio::task::JoinError>) {
    match outcome {
        Ok(Ok(())) => debug!(driver = %name, "Session GC sweep completed"),
        Ok(Err(e)) => error!(driver = %name, error = %e, "Session GC sweep failed"),
        Err(e) => error!(driver = %name, error = %e, "Session GC sweep panicked"),
    }
}
