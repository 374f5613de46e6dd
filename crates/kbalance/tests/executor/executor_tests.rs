use crate::test_utilities::*;
use kbalance::planner::{self, MovePlan, PlanSettings};
use kbalance::{BalanceError, MoveState, ReassignmentExecutor, ThrottleConfig, compute_throttles};
use std::sync::Arc;
use std::time::Duration;
use test_log::test;

fn two_move_plan() -> MovePlan {
    let disks = vec![
        disk(
            1,
            "/kafka/0",
            100,
            vec![follower("orders", 0, 40), follower("orders", 1, 30)],
        ),
        disk(2, "/kafka/0", 0, vec![]),
        disk(3, "/kafka/0", 0, vec![]),
    ];
    let plan = planner::plan(&build_snapshot(&disks), &PlanSettings::default());
    assert_eq!(plan.len(), 2);
    plan
}

#[tokio::test]
async fn test_dry_run_never_contacts_mechanism() {
    let tool = Arc::new(MockReassignTool::new());
    let executor = ReassignmentExecutor::new(tool.clone());
    let plan = two_move_plan();

    let handle = executor
        .submit(&plan, &ThrottleConfig::default(), true)
        .await
        .unwrap();

    assert!(handle.is_dry_run());
    assert_eq!(handle.states(), vec![MoveState::Planned, MoveState::Planned]);
    assert_eq!(handle.request().partitions.len(), 2);
    assert_eq!(tool.total_calls(), 0);
    assert!(handle.submitted_at().is_none());
}

#[tokio::test]
async fn test_submit_moves_everything_in_progress() {
    let tool = Arc::new(MockReassignTool::new());
    let executor = ReassignmentExecutor::new(tool.clone());
    let plan = two_move_plan();
    let throttle = compute_throttles(1_000, 2_000);

    let handle = executor.submit(&plan, &throttle, false).await.unwrap();

    assert_eq!(
        handle.states(),
        vec![MoveState::InProgress, MoveState::InProgress]
    );
    assert!(handle.is_active());
    assert!(handle.submitted_at().is_some());

    let executed = tool.executed.lock().unwrap();
    assert_eq!(executed.len(), 1);
    assert_eq!(&executed[0].0, handle.request());
    assert_eq!(executed[0].1, throttle);
}

#[tokio::test]
async fn test_rejected_submission_fails_every_move() {
    let tool = Arc::new(MockReassignTool::new());
    tool.set_should_error(true);
    let executor = ReassignmentExecutor::new(tool.clone());

    let result = executor
        .submit(&two_move_plan(), &ThrottleConfig::default(), false)
        .await;

    match result {
        Err(BalanceError::Submission { reason, .. }) => {
            assert!(reason.contains("reassignment failed"));
        }
        other => panic!("expected submission error, got {other:?}"),
    }
    let handle = executor.current().unwrap();
    assert_eq!(handle.states(), vec![MoveState::Failed, MoveState::Failed]);
    assert!(!handle.is_active());
    assert_eq!(handle.failures().len(), 2);
}

#[tokio::test]
async fn test_cluster_reassignment_in_progress_is_refused() {
    let tool = Arc::new(MockReassignTool::new());
    tool.set_running(true);
    let executor = ReassignmentExecutor::new(tool.clone());

    let result = executor.ensure_idle().await;
    assert!(matches!(result, Err(BalanceError::ReassignmentBusy { .. })));

    let result = executor
        .submit(&two_move_plan(), &ThrottleConfig::default(), false)
        .await;
    assert!(matches!(result, Err(BalanceError::ReassignmentBusy { .. })));
    assert!(tool.executed.lock().unwrap().is_empty());
    assert_eq!(
        executor.current().unwrap().states(),
        vec![MoveState::Failed, MoveState::Failed]
    );
}

#[tokio::test]
async fn test_second_submission_refused_while_first_active() {
    let tool = Arc::new(MockReassignTool::new());
    let executor = ReassignmentExecutor::new(tool.clone());
    let plan = two_move_plan();

    let first = executor
        .submit(&plan, &ThrottleConfig::default(), false)
        .await
        .unwrap();
    let result = executor
        .submit(&plan, &ThrottleConfig::default(), false)
        .await;

    assert!(matches!(result, Err(BalanceError::ReassignmentBusy { .. })));
    assert!(result.unwrap_err().is_submission_error());
    assert_eq!(tool.executed.lock().unwrap().len(), 1);
    // The first reassignment is untouched.
    assert_eq!(executor.current().unwrap().id(), first.id());
    assert!(first.is_active());
    assert!(matches!(
        executor.ensure_idle().await,
        Err(BalanceError::ReassignmentBusy { .. })
    ));
}

#[tokio::test]
async fn test_empty_plan_is_not_submitted() {
    let tool = Arc::new(MockReassignTool::new());
    let executor = ReassignmentExecutor::new(tool.clone());

    let result = executor
        .submit(&MovePlan::empty(1, 0.0), &ThrottleConfig::default(), false)
        .await;
    assert!(matches!(result, Err(BalanceError::Submission { .. })));
    assert_eq!(tool.total_calls(), 0);
}

#[test]
fn test_zero_throttle_rejected_for_cross_broker_plan() {
    let plan = two_move_plan();
    let result = compute_throttles(0, 200_000_000).validate_for(&plan);
    assert!(matches!(result, Err(BalanceError::InvalidConfig { .. })));
    assert!(compute_throttles(20_000_000, 0).validate_for(&plan).is_ok());
}

#[tokio::test]
async fn test_concurrent_submissions_admit_only_one() {
    let tool = Arc::new(MockReassignTool::new());
    tool.set_latency(Duration::from_millis(20));
    let executor = ReassignmentExecutor::new(tool.clone());
    let plan = two_move_plan();
    let throttle = ThrottleConfig::default();

    let (first, second) = tokio::join!(
        executor.submit(&plan, &throttle, false),
        executor.submit(&plan, &throttle, false)
    );

    let (accepted, refused) = match (first, second) {
        (Ok(handle), Err(error)) | (Err(error), Ok(handle)) => (handle, error),
        (first, second) => panic!("expected exactly one submission, got {first:?} and {second:?}"),
    };
    assert!(accepted.is_active());
    assert!(matches!(refused, BalanceError::ReassignmentBusy { .. }));
    assert_eq!(tool.executed.lock().unwrap().len(), 1);
    assert_eq!(executor.current().unwrap().id(), accepted.id());
}

#[tokio::test]
async fn test_failed_submission_releases_the_slot() {
    let tool = Arc::new(MockReassignTool::new());
    tool.set_should_error(true);
    let executor = ReassignmentExecutor::new(tool.clone());
    let plan = two_move_plan();

    assert!(
        executor
            .submit(&plan, &ThrottleConfig::default(), false)
            .await
            .is_err()
    );

    tool.set_should_error(false);
    executor.ensure_idle().await.unwrap();
    let handle = executor
        .submit(&plan, &ThrottleConfig::default(), false)
        .await
        .unwrap();
    assert!(handle.is_active());
}
