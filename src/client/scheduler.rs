//! Periodic re-execution of test runs, outside the measurement core

use std::fmt::Display;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// When to run a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Run once and return
    Once,
    /// Run immediately, then after every interval until stopped
    Every(Duration),
}

/// Cancellation handle shared between the scheduler and whoever stops it
#[derive(Debug, Clone, Default)]
pub struct Stopper {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Stopper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake any waiting scheduler
    pub fn stop(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for up to `timeout`; returns true if a stop was requested
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Run `job` according to `schedule` until `stopper` fires
///
/// Runs start at a fixed rate: each one is due `interval` after the previous
/// one started, not after it finished. A run that overruns its interval is
/// followed by the next one straight away. A failing run is logged and the
/// schedule carries on. Returns the number of runs that completed successfully.
pub fn run_scheduled<F, E>(schedule: Schedule, stopper: &Stopper, mut job: F) -> usize
where
    F: FnMut() -> Result<(), E>,
    E: Display,
{
    let mut succeeded = 0usize;
    let mut attempt = 0usize;

    loop {
        if stopper.is_stopped() {
            debug!("Scheduler stopped before next run");
            break;
        }

        attempt += 1;
        let started = Instant::now();
        match job() {
            Ok(()) => succeeded += 1,
            Err(e) => error!(attempt = attempt, error = %e, "Test run failed"),
        }

        match schedule {
            Schedule::Once => break,
            Schedule::Every(interval) => {
                let wait = (started + interval).saturating_duration_since(Instant::now());
                debug!(wait_ms = wait.as_millis() as u64, "Waiting for next run");
                if stopper.wait_timeout(wait) {
                    info!("Scheduler stopped");
                    break;
                }
            }
        }
    }

    succeeded
}
