//! Cron-driven sweep scheduling
//!
//! Sweeps run inline on the scheduling task, so two never overlap. Fire
//! times that pass while a sweep is running are skipped, not queued.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Parse a cron expression.
///
/// Six or seven fields (seconds first). Classic five-field expressions are
/// accepted and fire at second zero.
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    let trimmed = expr.trim();
    let normalized = match trimmed.split_whitespace().count() {
        5 => format!("0 {}", trimmed),
        _ => trimmed.to_string(),
    };
    Schedule::from_str(&normalized).map_err(|e| Error::Schedule(format!("'{}': {}", expr, e)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

const IDLE: u8 = 0;
const RUNNING: u8 = 1;

pub struct Scheduler {
    schedule: Schedule,
    state: AtomicU8,
}

impl Scheduler {
    pub fn new(expr: &str) -> Result<Self> {
        Ok(Self {
            schedule: parse_schedule(expr)?,
            state: AtomicU8::new(IDLE),
        })
    }

    /// First fire time strictly after `t`
    pub fn next_after(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&t).next()
    }

    pub fn state(&self) -> SchedulerState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => SchedulerState::Running,
            _ => SchedulerState::Idle,
        }
    }

    /// Run `job` immediately unless a run is already in progress.
    ///
    /// Returns false when the job was skipped.
    pub async fn try_run_now<F, Fut>(&self, job: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        if !self.enter() {
            return false;
        }
        job().await;
        self.leave();
        true
    }

    /// Fire `job` on every schedule tick until `cancel` is triggered.
    ///
    /// A job in flight always completes. Returns the number of completed runs.
    pub async fn run<F, Fut>(&self, cancel: CancellationToken, mut job: F) -> Result<u64>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut runs = 0u64;

        loop {
            let now = Utc::now();
            let Some(next) = self.next_after(now) else {
                warn!("Schedule has no future fire times, stopping");
                return Ok(runs);
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!("Next sweep at {} (in {:?})", next, wait);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Scheduler cancelled after {} runs", runs);
                    return Ok(runs);
                }
                _ = tokio::time::sleep(wait) => {}
            }

            if !self.enter() {
                warn!("Trigger at {} skipped: previous sweep still running", next);
                continue;
            }
            job().await;
            self.leave();
            runs += 1;

            let finished = Utc::now();
            let skipped = self
                .schedule
                .after(&next)
                .take_while(|t| *t <= finished)
                .count();
            if skipped > 0 {
                warn!("Skipped {} triggers that fired during the sweep", skipped);
            }

            if cancel.is_cancelled() {
                info!("Scheduler cancelled after {} runs", runs);
                return Ok(runs);
            }
        }
    }

    fn enter(&self) -> bool {
        self.state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn leave(&self) {
        self.state.store(IDLE, Ordering::Release);
    }
}
