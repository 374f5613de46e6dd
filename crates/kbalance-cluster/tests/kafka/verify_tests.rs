use kbalance::{PartitionProgress, ReassignmentStatus, TopicPartition};
use kbalance_cluster::kafka::parse_verify_output;

fn requested() -> Vec<TopicPartition> {
    vec![
        TopicPartition::new("orders", 0),
        TopicPartition::new("orders", 1),
        TopicPartition::new("payments", 0),
    ]
}

#[test]
fn test_modern_verify_output() {
    let output = "\
Status of partition reassignment:
Reassignment of partition orders-0 is complete.
Reassignment of partition orders-1 is still in progress.
Reassignment of partition payments-0 is complete.

Clearing broker-level throttles on brokers 1,2,3
";
    let report = parse_verify_output(output, &requested());

    assert_eq!(report.status(), ReassignmentStatus::InProgress);
    assert_eq!(
        report.partitions[&TopicPartition::new("orders", 0)],
        PartitionProgress::Completed
    );
    assert_eq!(
        report.partitions[&TopicPartition::new("orders", 1)],
        PartitionProgress::InProgress
    );
}

#[test]
fn test_legacy_verify_output_with_failure() {
    let output = "\
Status of partition reassignment:
ERROR: Assigned replicas (1,2) don't match the list of replicas for reassignment (1,3) for partition [orders,1]
Reassignment of partition [orders,0] completed successfully
Reassignment of partition [orders,1] failed
Reassignment of partition [payments,0] completed successfully
";
    let report = parse_verify_output(output, &requested());

    assert_eq!(report.status(), ReassignmentStatus::Failed);
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("orders-1: ERROR: Assigned replicas"));
}

#[test]
fn test_log_dir_moves_report_per_replica() {
    let output = "\
Reassignment of partition orders-0 is complete.
Reassignment of replica orders-0-3 is still in progress.
";
    let report = parse_verify_output(output, &requested()[..1]);

    assert_eq!(
        report.partitions[&TopicPartition::new("orders", 0)],
        PartitionProgress::InProgress
    );
}

#[test]
fn test_unmentioned_partitions() {
    // Nothing names the partitions: they count as complete.
    let report = parse_verify_output("Status of partition reassignment:\n", &requested());
    assert_eq!(report.partitions.len(), 3);
    assert_eq!(report.status(), ReassignmentStatus::Completed);

    // A status line naming no requested partition applies to the rest.
    let output = "\
Reassignment of partition orders-0 is complete.
There are partitions still in progress
";
    let report = parse_verify_output(output, &requested());
    assert_eq!(
        report.partitions[&TopicPartition::new("orders", 0)],
        PartitionProgress::Completed
    );
    assert_eq!(
        report.partitions[&TopicPartition::new("payments", 0)],
        PartitionProgress::InProgress
    );
}
