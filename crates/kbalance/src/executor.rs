//! Reassignment submission and move lifecycle tracking.
//!
//! The executor owns every move's state machine. A [`ReassignmentHandle`]
//! shares its ledger with the executor so that the completion monitor can
//! advance states from polled status without owning the moves itself.

use crate::{
    error::BalanceError,
    planner::{Move, MovePlan},
    reassignment::ReassignmentRequest,
    throttle::ThrottleConfig,
    traits::{PartitionProgress, ReassignmentTool, VerifyReport},
};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle of a single planned move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveState {
    Planned,
    Submitted,
    InProgress,
    Completed,
    Failed,
}

impl MoveState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MoveState::Completed | MoveState::Failed)
    }

    /// Allowed edges: Planned → Submitted → InProgress → Completed | Failed,
    /// plus Planned/Submitted → Failed for rejected submissions.
    pub fn can_transition_to(&self, next: MoveState) -> bool {
        use MoveState::*;
        matches!(
            (self, next),
            (Planned, Submitted)
                | (Planned, Failed)
                | (Submitted, InProgress)
                | (Submitted, Failed)
                | (InProgress, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
        )
    }
}

impl fmt::Display for MoveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MoveState::Planned => "planned",
            MoveState::Submitted => "submitted",
            MoveState::InProgress => "in progress",
            MoveState::Completed => "completed",
            MoveState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A move together with its current lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedMove {
    pub planned: Move,
    pub state: MoveState,
    /// Failure detail, when the move failed.
    pub detail: Option<String>,
}

#[derive(Debug)]
struct Ledger {
    moves: Vec<TrackedMove>,
    submitted_at: Option<DateTime<Utc>>,
    /// Consecutive polls that reported a failure.
    failed_polls: u32,
}

/// Opaque reference to one submitted (or dry-run) reassignment.
#[derive(Debug, Clone)]
pub struct ReassignmentHandle {
    id: Uuid,
    dry_run: bool,
    request: ReassignmentRequest,
    ledger: Arc<RwLock<Ledger>>,
}

impl ReassignmentHandle {
    fn new(plan: &MovePlan, request: ReassignmentRequest, dry_run: bool) -> Self {
        let moves = plan
            .iter()
            .map(|mv| TrackedMove {
                planned: mv.clone(),
                state: MoveState::Planned,
                detail: None,
            })
            .collect();
        Self {
            id: Uuid::new_v4(),
            dry_run,
            request,
            ledger: Arc::new(RwLock::new(Ledger {
                moves,
                submitted_at: None,
                failed_polls: 0,
            })),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn request(&self) -> &ReassignmentRequest {
        &self.request
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.ledger.read().submitted_at
    }

    pub fn moves(&self) -> Vec<TrackedMove> {
        self.ledger.read().moves.clone()
    }

    pub fn states(&self) -> Vec<MoveState> {
        self.ledger.read().moves.iter().map(|m| m.state).collect()
    }

    /// True while a submitted move has not reached a terminal state.
    pub fn is_active(&self) -> bool {
        !self.dry_run
            && self
                .ledger
                .read()
                .moves
                .iter()
                .any(|m| matches!(m.state, MoveState::Submitted | MoveState::InProgress))
    }

    pub fn failures(&self) -> Vec<String> {
        self.ledger
            .read()
            .moves
            .iter()
            .filter(|m| m.state == MoveState::Failed)
            .map(|m| match &m.detail {
                Some(detail) => format!("{}: {detail}", m.planned),
                None => m.planned.to_string(),
            })
            .collect()
    }

    /// Move every non-terminal move to `next`. Illegal edges are refused and logged.
    pub(crate) fn transition_all(&self, next: MoveState, detail: Option<&str>) {
        let mut ledger = self.ledger.write();
        if next == MoveState::Submitted {
            ledger.submitted_at = Some(Utc::now());
        }
        for tracked in ledger.moves.iter_mut() {
            if tracked.state.is_terminal() {
                continue;
            }
            apply_transition(self.id, tracked, next, detail);
        }
    }

    /// Advance moves from a verification report. Failures only become terminal
    /// once `confirmed` is set; until then the moves stay in progress.
    pub(crate) fn apply_report(&self, report: &VerifyReport, confirmed: bool) {
        let overall = report.status();
        let mut ledger = self.ledger.write();
        for tracked in ledger.moves.iter_mut() {
            let progress = report
                .partitions
                .get(tracked.planned.partition())
                .cloned()
                .unwrap_or_else(|| overall.as_progress());
            match progress {
                PartitionProgress::InProgress => {}
                PartitionProgress::Completed => {
                    apply_transition(self.id, tracked, MoveState::Completed, None)
                }
                PartitionProgress::Failed(detail) if confirmed => {
                    apply_transition(self.id, tracked, MoveState::Failed, Some(&detail))
                }
                PartitionProgress::Failed(_) => {}
            }
        }
    }

    /// Record one more failed poll and return the consecutive count.
    pub(crate) fn record_failed_poll(&self) -> u32 {
        let mut ledger = self.ledger.write();
        ledger.failed_polls += 1;
        ledger.failed_polls
    }

    pub(crate) fn reset_failed_polls(&self) {
        self.ledger.write().failed_polls = 0;
    }
}

fn apply_transition(id: Uuid, tracked: &mut TrackedMove, next: MoveState, detail: Option<&str>) {
    if tracked.state == next {
        return;
    }
    if !tracked.state.can_transition_to(next) {
        warn!(
            "Reassignment {id}: refusing transition {} -> {next} for {}",
            tracked.state, tracked.planned
        );
        return;
    }
    debug!(
        "Reassignment {id}: {} {} -> {next}",
        tracked.planned, tracked.state
    );
    tracked.state = next;
    if let Some(detail) = detail {
        tracked.detail = Some(detail.to_string());
    }
}

#[derive(Debug, Default)]
struct Slot {
    current: Option<ReassignmentHandle>,
    /// Set while a submission is between its busy check and the tool's answer.
    submitting: bool,
}

impl Slot {
    fn busy_reason(&self) -> Option<String> {
        if self.submitting {
            return Some("another submission is in progress".to_string());
        }
        self.current
            .as_ref()
            .filter(|handle| handle.is_active())
            .map(|handle| format!("reassignment {} is still active", handle.id()))
    }
}

/// Clears the submitting flag when a submission finishes, fails or is dropped.
struct Reservation<'a> {
    slot: &'a Mutex<Slot>,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.slot.lock().submitting = false;
    }
}

/// Submits move plans through the external reassignment mechanism.
///
/// At most one submitted reassignment is tracked per executor; a second
/// submission while the first is still active, or still being submitted,
/// is refused.
pub struct ReassignmentExecutor {
    tool: Arc<dyn ReassignmentTool>,
    slot: Mutex<Slot>,
}

impl ReassignmentExecutor {
    pub fn new(tool: Arc<dyn ReassignmentTool>) -> Self {
        Self {
            tool,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// The most recently submitted handle, if any.
    pub fn current(&self) -> Option<ReassignmentHandle> {
        self.slot.lock().current.clone()
    }

    /// Fail with [`BalanceError::ReassignmentBusy`] if a reassignment is running.
    pub async fn ensure_idle(&self) -> Result<(), BalanceError> {
        let busy = self.slot.lock().busy_reason();
        if let Some(reason) = busy {
            return Err(BalanceError::ReassignmentBusy { reason });
        }
        let running = self
            .tool
            .in_progress()
            .await
            .map_err(|e| BalanceError::from_connectivity_error(e, "reassignment status check"))?;
        if running {
            return Err(BalanceError::ReassignmentBusy {
                reason: "the cluster reports a reassignment in progress".to_string(),
            });
        }
        Ok(())
    }

    /// Submit `plan` as one reassignment.
    ///
    /// In dry-run mode the mechanism is never contacted and every move stays
    /// `Planned`. Otherwise the submission is atomic: either every move ends
    /// up `InProgress`, or every move is `Failed` and an error is returned.
    pub async fn submit(
        &self,
        plan: &MovePlan,
        throttle: &ThrottleConfig,
        dry_run: bool,
    ) -> Result<ReassignmentHandle, BalanceError> {
        let request = ReassignmentRequest::from_plan(plan)?;
        let handle = ReassignmentHandle::new(plan, request, dry_run);

        if dry_run {
            info!(
                "Dry run: reassignment {} with {} move(s) not submitted",
                handle.id(),
                plan.len()
            );
            return Ok(handle);
        }

        let _reservation = match self.reserve(&handle) {
            Ok(reservation) => reservation,
            Err(reason) => {
                handle.transition_all(MoveState::Failed, Some(&reason));
                return Err(BalanceError::ReassignmentBusy { reason });
            }
        };

        match self.tool.in_progress().await {
            Ok(false) => {}
            Ok(true) => {
                handle.transition_all(MoveState::Failed, Some("cluster reassignment in progress"));
                return Err(BalanceError::ReassignmentBusy {
                    reason: "the cluster reports a reassignment in progress".to_string(),
                });
            }
            Err(e) => {
                handle.transition_all(MoveState::Failed, Some(&e.to_string()));
                return Err(BalanceError::from_submission_error(
                    e,
                    "reassignment status check",
                ));
            }
        }

        handle.transition_all(MoveState::Submitted, None);
        if let Err(e) = self.tool.execute(handle.request(), throttle).await {
            error!("Reassignment {} rejected: {e}", handle.id());
            handle.transition_all(MoveState::Failed, Some(&e.to_string()));
            return Err(BalanceError::from_submission_error(e, "reassignment execute"));
        }
        handle.transition_all(MoveState::InProgress, None);

        info!(
            "Submitted reassignment {} with {} move(s) across {} partition(s)",
            handle.id(),
            plan.len(),
            handle.request().partitions.len()
        );
        Ok(handle)
    }

    /// Check and claim the slot under one lock so concurrent submissions
    /// cannot both pass the busy check.
    fn reserve(&self, handle: &ReassignmentHandle) -> Result<Reservation<'_>, String> {
        let mut slot = self.slot.lock();
        if let Some(reason) = slot.busy_reason() {
            return Err(reason);
        }
        slot.submitting = true;
        slot.current = Some(handle.clone());
        Ok(Reservation { slot: &self.slot })
    }
}
