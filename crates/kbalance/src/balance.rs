//! One balancing pass: snapshot, plan, submit and optionally wait.

use crate::{
    error::BalanceError,
    executor::{ReassignmentExecutor, ReassignmentHandle},
    format::format_bytes,
    monitor::{CompletionMonitor, MonitorSettings, ReassignmentStatus},
    planner::{self, MovePlan, PlanSettings},
    snapshot::SnapshotBuilder,
    throttle::{self, DEFAULT_DISK_THROTTLE, DEFAULT_NET_THROTTLE},
    traits::{DiskUsageProbe, MetadataClient, ReassignmentTool},
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything one balancing pass needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceConfig {
    pub plan: PlanSettings,
    pub net_throttle: u64,
    pub disk_throttle: u64,
    pub monitor: MonitorSettings,
    pub dry_run: bool,
    pub wait: bool,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            plan: PlanSettings::default(),
            net_throttle: DEFAULT_NET_THROTTLE,
            disk_throttle: DEFAULT_DISK_THROTTLE,
            monitor: MonitorSettings::default(),
            dry_run: false,
            wait: false,
        }
    }
}

impl BalanceConfig {
    pub fn validate(&self) -> Result<(), BalanceError> {
        self.plan.validate()?;
        if self.monitor.poll_interval.is_zero() {
            return Err(BalanceError::invalid_config(
                "poll_interval",
                "must be greater than zero",
            ));
        }
        if self.monitor.timeout < self.monitor.poll_interval {
            return Err(BalanceError::invalid_config(
                "wait_timeout",
                "must not be shorter than the poll interval",
            ));
        }
        if self.monitor.failure_confirmations == 0 {
            return Err(BalanceError::invalid_config(
                "failure_confirmations",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// How a balancing pass ended.
#[derive(Debug)]
pub enum BalanceOutcome {
    /// The planner found no move worth making.
    NothingToDo { snapshot_version: u64 },
    /// The plan was computed and logged but not submitted.
    DryRun {
        plan: MovePlan,
        handle: ReassignmentHandle,
    },
    /// Submitted without waiting. `status` is the result of one follow-up poll.
    Submitted {
        handle: ReassignmentHandle,
        status: Option<ReassignmentStatus>,
    },
    Completed { handle: ReassignmentHandle },
}

/// Drives snapshot → plan → submit → monitor once per invocation.
pub struct BalanceLoop {
    builder: SnapshotBuilder,
    executor: ReassignmentExecutor,
    monitor: CompletionMonitor,
    config: BalanceConfig,
}

impl BalanceLoop {
    pub fn new(
        metadata: Arc<dyn MetadataClient>,
        probe: Arc<dyn DiskUsageProbe>,
        tool: Arc<dyn ReassignmentTool>,
        config: BalanceConfig,
    ) -> Self {
        Self {
            builder: SnapshotBuilder::new(metadata, probe),
            executor: ReassignmentExecutor::new(tool.clone()),
            monitor: CompletionMonitor::new(tool, config.monitor.failure_confirmations),
            config,
        }
    }

    pub fn config(&self) -> &BalanceConfig {
        &self.config
    }

    pub fn executor(&self) -> &ReassignmentExecutor {
        &self.executor
    }

    pub fn monitor(&self) -> &CompletionMonitor {
        &self.monitor
    }

    pub async fn run(&self) -> Result<BalanceOutcome, BalanceError> {
        self.config.validate()?;
        if !self.config.dry_run {
            self.executor.ensure_idle().await?;
        }

        let snapshot = self.builder.build_snapshot().await?;
        for disk in snapshot.disks() {
            debug!(
                "{}: {} used, {} replica(s)",
                disk.location,
                format_bytes(disk.used_bytes),
                disk.replicas.len()
            );
        }

        let plan = planner::plan(&snapshot, &self.config.plan);
        if plan.is_empty() {
            info!("Cluster is balanced within the configured thresholds, nothing to do");
            return Ok(BalanceOutcome::NothingToDo {
                snapshot_version: snapshot.version(),
            });
        }

        info!(
            "Planned {} move(s), {} in total, imbalance score {:.0} -> {:.0}",
            plan.len(),
            format_bytes(plan.total_bytes()),
            plan.score_before(),
            plan.score_after()
        );
        for (i, mv) in plan.iter().enumerate() {
            info!("  {}. {mv}", i + 1);
        }

        let throttle =
            throttle::compute_throttles(self.config.net_throttle, self.config.disk_throttle);
        if self.config.dry_run {
            let handle = self.executor.submit(&plan, &throttle, true).await?;
            info!("Reassignment request: {}", handle.request().to_json()?);
            return Ok(BalanceOutcome::DryRun { plan, handle });
        }

        throttle.validate_for(&plan)?;
        let handle = self.executor.submit(&plan, &throttle, false).await?;
        debug!("Reassignment request: {}", handle.request().to_json()?);

        if self.config.wait {
            self.monitor
                .await_completion(
                    &handle,
                    self.config.monitor.poll_interval,
                    self.config.monitor.timeout,
                )
                .await?;
            return Ok(BalanceOutcome::Completed { handle });
        }

        let status = match self.monitor.poll(&handle).await {
            Ok(status) => {
                info!("Reassignment {} is {status}", handle.id());
                Some(status)
            }
            Err(e) => {
                warn!("Could not query reassignment {}: {e}", handle.id());
                None
            }
        };
        Ok(BalanceOutcome::Submitted { handle, status })
    }
}
