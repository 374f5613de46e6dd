use crate::test_utilities::*;
use kbalance::planner::{self, PlanSettings};
use kbalance::{
    BalanceError, CompletionMonitor, MoveState, PartitionProgress, ReassignmentExecutor,
    ReassignmentHandle, ReassignmentStatus, ThrottleConfig, TopicPartition, VerifyReport,
};
use std::sync::Arc;
use std::time::Duration;

fn orders(partition: u32) -> TopicPartition {
    TopicPartition::new("orders", partition)
}

fn report(progress: &[(u32, PartitionProgress)]) -> VerifyReport {
    progress
        .iter()
        .fold(VerifyReport::default(), |report, (partition, progress)| {
            report.with_partition(orders(*partition), progress.clone())
        })
}

fn failed(detail: &str) -> PartitionProgress {
    PartitionProgress::Failed(detail.to_string())
}

async fn submitted(tool: Arc<MockReassignTool>) -> ReassignmentHandle {
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
    ReassignmentExecutor::new(tool)
        .submit(&plan, &ThrottleConfig::default(), false)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_poll_tracks_partition_progress() {
    let tool = Arc::new(MockReassignTool::with_reports(vec![
        report(&[
            (0, PartitionProgress::Completed),
            (1, PartitionProgress::InProgress),
        ]),
        report(&[
            (0, PartitionProgress::Completed),
            (1, PartitionProgress::Completed),
        ]),
    ]));
    let handle = submitted(tool.clone()).await;
    let monitor = CompletionMonitor::new(tool.clone(), 5);

    assert_eq!(
        monitor.poll(&handle).await.unwrap(),
        ReassignmentStatus::InProgress
    );
    assert_eq!(
        handle.states(),
        vec![MoveState::Completed, MoveState::InProgress]
    );

    assert_eq!(
        monitor.poll(&handle).await.unwrap(),
        ReassignmentStatus::Completed
    );
    assert_eq!(
        handle.states(),
        vec![MoveState::Completed, MoveState::Completed]
    );
    assert!(!handle.is_active());
}

#[tokio::test]
async fn test_poll_of_dry_run_handle_is_refused() {
    let tool = Arc::new(MockReassignTool::new());
    let disks = vec![
        disk(1, "/kafka/0", 100, vec![follower("orders", 0, 40)]),
        disk(2, "/kafka/0", 0, vec![]),
    ];
    let plan = planner::plan(&build_snapshot(&disks), &PlanSettings::default());
    let handle = ReassignmentExecutor::new(tool.clone())
        .submit(&plan, &ThrottleConfig::default(), true)
        .await
        .unwrap();

    let monitor = CompletionMonitor::new(tool.clone(), 5);
    assert!(matches!(
        monitor.poll(&handle).await,
        Err(BalanceError::NotSubmitted { .. })
    ));
    assert_eq!(tool.total_calls(), 0);
}

#[tokio::test]
async fn test_transient_failure_is_not_reported() {
    let tool = Arc::new(MockReassignTool::with_reports(vec![
        report(&[(0, failed("leader not available")), (1, PartitionProgress::Completed)]),
        report(&[(0, failed("leader not available")), (1, PartitionProgress::Completed)]),
        report(&[
            (0, PartitionProgress::Completed),
            (1, PartitionProgress::Completed),
        ]),
    ]));
    let handle = submitted(tool.clone()).await;
    let monitor = CompletionMonitor::new(tool.clone(), 3);

    for _ in 0..2 {
        assert_eq!(
            monitor.poll(&handle).await.unwrap(),
            ReassignmentStatus::InProgress
        );
        assert_eq!(handle.states()[0], MoveState::InProgress);
    }
    assert_eq!(
        monitor.poll(&handle).await.unwrap(),
        ReassignmentStatus::Completed
    );
    assert_eq!(
        handle.states(),
        vec![MoveState::Completed, MoveState::Completed]
    );
}

#[tokio::test]
async fn test_await_completion_reports_confirmed_failure() {
    let tool = Arc::new(MockReassignTool::with_reports(vec![report(&[
        (0, failed("replica fetcher stopped")),
        (1, PartitionProgress::Completed),
    ])]));
    let handle = submitted(tool.clone()).await;
    let monitor = CompletionMonitor::new(tool.clone(), 3);

    let result = monitor
        .await_completion(&handle, Duration::from_millis(5), Duration::from_secs(5))
        .await;

    match result {
        Err(BalanceError::ReassignmentFailed { handle: id, failures }) => {
            assert_eq!(id, handle.id().to_string());
            assert_eq!(failures.len(), 1);
            assert!(failures[0].contains("replica fetcher stopped"));
        }
        other => panic!("expected reassignment failure, got {other:?}"),
    }
    assert_eq!(*tool.verify_calls.lock().unwrap(), 3);
    assert_eq!(handle.states(), vec![MoveState::Failed, MoveState::Completed]);
}

#[tokio::test]
async fn test_await_completion_returns_once_complete() {
    let tool = Arc::new(MockReassignTool::with_reports(vec![
        report(&[(0, PartitionProgress::InProgress), (1, PartitionProgress::InProgress)]),
        report(&[(0, PartitionProgress::Completed), (1, PartitionProgress::InProgress)]),
        report(&[(0, PartitionProgress::Completed), (1, PartitionProgress::Completed)]),
    ]));
    let handle = submitted(tool.clone()).await;
    let monitor = CompletionMonitor::new(tool.clone(), 5);

    monitor
        .await_completion(&handle, Duration::from_millis(5), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(*tool.verify_calls.lock().unwrap(), 3);
}

#[tokio::test]
async fn test_timeout_leaves_reassignment_pollable() {
    // No scripted reports: the mechanism keeps answering "in progress".
    let tool = Arc::new(MockReassignTool::new());
    let handle = submitted(tool.clone()).await;
    let monitor = CompletionMonitor::new(tool.clone(), 5);

    let result = monitor
        .await_completion(&handle, Duration::from_millis(10), Duration::from_millis(35))
        .await;

    let error = result.unwrap_err();
    assert!(matches!(error, BalanceError::Timeout { .. }));
    assert!(error.is_retryable_by_repoll());
    assert_eq!(error.exit_code(), 6);

    let status = monitor.poll(&handle).await.unwrap();
    assert!(matches!(
        status,
        ReassignmentStatus::InProgress | ReassignmentStatus::Completed
    ));
    assert!(handle.is_active());
}

#[tokio::test]
async fn test_zero_poll_interval_is_a_config_error() {
    let tool = Arc::new(MockReassignTool::new());
    let handle = submitted(tool.clone()).await;
    let monitor = CompletionMonitor::new(tool.clone(), 5);

    let error = monitor
        .await_completion(&handle, Duration::ZERO, Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(matches!(error, BalanceError::InvalidConfig { .. }));
    assert_eq!(*tool.verify_calls.lock().unwrap(), 0);
}
