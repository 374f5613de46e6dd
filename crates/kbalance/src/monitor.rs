//! Completion monitoring of submitted reassignments.

use crate::{
    error::BalanceError,
    executor::ReassignmentHandle,
    traits::{PartitionProgress, ReassignmentTool},
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);
pub const DEFAULT_FAILURE_CONFIRMATIONS: u32 = 5;

/// Overall status of a reassignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReassignmentStatus {
    InProgress,
    Completed,
    Failed,
}

impl ReassignmentStatus {
    pub(crate) fn as_progress(&self) -> PartitionProgress {
        match self {
            ReassignmentStatus::InProgress => PartitionProgress::InProgress,
            ReassignmentStatus::Completed => PartitionProgress::Completed,
            ReassignmentStatus::Failed => {
                PartitionProgress::Failed("reassignment reported failed".to_string())
            }
        }
    }
}

impl fmt::Display for ReassignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReassignmentStatus::InProgress => "in progress",
            ReassignmentStatus::Completed => "completed",
            ReassignmentStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Consecutive failed polls required before a failure is reported.
    pub failure_confirmations: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_WAIT_TIMEOUT,
            failure_confirmations: DEFAULT_FAILURE_CONFIRMATIONS,
        }
    }
}

/// Polls the reassignment mechanism and advances the handle's moves.
pub struct CompletionMonitor {
    tool: Arc<dyn ReassignmentTool>,
    failure_confirmations: u32,
}

impl CompletionMonitor {
    pub fn new(tool: Arc<dyn ReassignmentTool>, failure_confirmations: u32) -> Self {
        Self {
            tool,
            failure_confirmations: failure_confirmations.max(1),
        }
    }

    /// Query the current status of `handle` once.
    ///
    /// The mechanism occasionally reports a failure before it settles, so a
    /// failure is only returned after `failure_confirmations` consecutive
    /// failed polls; earlier ones are reported as in progress.
    pub async fn poll(
        &self,
        handle: &ReassignmentHandle,
    ) -> Result<ReassignmentStatus, BalanceError> {
        if handle.is_dry_run() {
            return Err(BalanceError::NotSubmitted {
                handle: handle.id().to_string(),
            });
        }

        let report = self
            .tool
            .verify(handle.request())
            .await
            .map_err(|e| BalanceError::from_connectivity_error(e, "reassignment verify"))?;

        let status = match report.status() {
            ReassignmentStatus::Failed => {
                let seen = handle.record_failed_poll();
                if seen >= self.failure_confirmations {
                    handle.apply_report(&report, true);
                    ReassignmentStatus::Failed
                } else {
                    warn!(
                        "Reassignment {} reported failed ({seen}/{}), waiting for confirmation: {}",
                        handle.id(),
                        self.failure_confirmations,
                        report.failures().join("; ")
                    );
                    handle.apply_report(&report, false);
                    ReassignmentStatus::InProgress
                }
            }
            other => {
                handle.reset_failed_polls();
                handle.apply_report(&report, false);
                other
            }
        };
        debug!("Reassignment {} status: {status}", handle.id());
        Ok(status)
    }

    /// Poll every `poll_interval` until the reassignment completes, fails or
    /// `timeout` elapses. A timeout does not cancel the reassignment.
    pub async fn await_completion(
        &self,
        handle: &ReassignmentHandle,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<(), BalanceError> {
        if poll_interval.is_zero() {
            return Err(BalanceError::invalid_config(
                "poll_interval",
                "must be greater than zero",
            ));
        }
        let started = Instant::now();
        let deadline = started + timeout;
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = ReassignmentStatus::InProgress;

        info!(
            "Waiting for reassignment {} (poll every {}s, timeout {}s)",
            handle.id(),
            poll_interval.as_secs(),
            timeout.as_secs()
        );

        loop {
            if tokio::time::timeout_at(deadline, ticker.tick()).await.is_err() {
                return Err(timed_out(handle, started, last));
            }
            let status = match tokio::time::timeout_at(deadline, self.poll(handle)).await {
                Ok(status) => status?,
                Err(_) => return Err(timed_out(handle, started, last)),
            };
            last = status;
            match status {
                ReassignmentStatus::Completed => {
                    info!(
                        "Reassignment {} completed after {}s",
                        handle.id(),
                        started.elapsed().as_secs()
                    );
                    return Ok(());
                }
                ReassignmentStatus::Failed => {
                    return Err(BalanceError::ReassignmentFailed {
                        handle: handle.id().to_string(),
                        failures: handle.failures(),
                    });
                }
                ReassignmentStatus::InProgress => {
                    info!("Reassignment {} still in progress", handle.id());
                }
            }
        }
    }
}

fn timed_out(
    handle: &ReassignmentHandle,
    started: Instant,
    last: ReassignmentStatus,
) -> BalanceError {
    warn!(
        "Gave up waiting for reassignment {}; it may still be running",
        handle.id()
    );
    BalanceError::Timeout {
        handle: handle.id().to_string(),
        waited_secs: started.elapsed().as_secs(),
        last_status: last.to_string(),
    }
}
