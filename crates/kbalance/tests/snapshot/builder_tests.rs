use crate::test_utilities::*;
use kbalance::{
    BalanceError, BrokerId, DiskLocation, PartitionInfo, ReplicaRole, SnapshotBuilder,
    TopicPartition,
};
use std::sync::Arc;

fn cluster() -> Vec<DiskSpec> {
    vec![
        disk(
            1,
            "/kafka/0",
            500,
            vec![leader("orders", 0, 200), follower("orders", 1, 150)],
        ),
        disk(1, "/kafka/1", 100, vec![follower("payments", 0, 80)]),
        disk(2, "/kafka/0", 300, vec![follower("orders", 0, 200)]),
        disk(
            3,
            "/kafka/0",
            260,
            vec![leader("orders", 1, 150), leader("payments", 0, 80)],
        ),
    ]
}

fn fixture(disks: &[DiskSpec]) -> (Arc<MockMetadataClient>, Arc<MockDiskProbe>, SnapshotBuilder) {
    let metadata = Arc::new(MockMetadataClient::from_disks(disks));
    let probe = Arc::new(MockDiskProbe::from_disks(disks));
    let builder = SnapshotBuilder::new(metadata.clone(), probe.clone());
    (metadata, probe, builder)
}

#[tokio::test]
async fn test_build_snapshot_merges_every_broker() {
    let disks = cluster();
    let (_metadata, _probe, builder) = fixture(&disks);

    let snapshot = builder.build_snapshot().await.unwrap();

    assert_eq!(snapshot.brokers().len(), 3);
    assert_eq!(snapshot.disk_count(), 4);
    assert_eq!(snapshot.total_used_bytes(), 1160);

    let expected = build_snapshot(&disks);
    assert_eq!(snapshot.brokers(), expected.brokers());
    assert_eq!(snapshot.assignments(), expected.assignments());

    let disk = snapshot
        .disk(&DiskLocation::new(BrokerId(3), "/kafka/0"))
        .unwrap();
    assert_eq!(disk.replicas.len(), 2);
    assert!(disk.replicas.iter().all(|r| r.role == ReplicaRole::Leader));
    assert_eq!(
        snapshot.assignment(&TopicPartition::new("orders", 1)),
        Some(&[BrokerId(1), BrokerId(3)][..])
    );
}

#[tokio::test]
async fn test_versions_increase_per_snapshot() {
    let (_metadata, _probe, builder) = fixture(&cluster());

    let first = builder.build_snapshot().await.unwrap();
    let second = builder.build_snapshot().await.unwrap();
    assert!(second.version() > first.version());
    assert!(second.taken_at() >= first.taken_at());
}

#[tokio::test]
async fn test_one_failing_broker_fails_the_snapshot() {
    let (_metadata, probe, builder) = fixture(&cluster());
    probe.fail_broker(2);

    let result = builder.build_snapshot().await;
    match result {
        Err(BalanceError::Connectivity { context, reason }) => {
            assert!(context.contains("broker-2"));
            assert!(reason.contains("timed out"));
        }
        other => panic!("expected connectivity error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_metadata_fails_the_snapshot() {
    let (metadata, _probe, builder) = fixture(&cluster());
    metadata.set_should_error(true);

    let error = builder.build_snapshot().await.unwrap_err();
    assert!(matches!(error, BalanceError::Connectivity { .. }));
    assert_eq!(error.exit_code(), 3);
}

#[tokio::test]
async fn test_internal_topics_and_stray_directories_are_ignored() {
    let disks = cluster();
    let (metadata, probe, builder) = fixture(&disks);
    let mut offsets = PartitionInfo::new(
        TopicPartition::new("__consumer_offsets", 0),
        Some(BrokerId(1)),
        vec![BrokerId(1)],
    );
    offsets.internal = true;
    metadata.add_partition(offsets);
    probe.add_directory(1, "/kafka/0", "__consumer_offsets-0", 5);
    // Leftover copy on a broker outside the replica list.
    probe.add_directory(2, "/kafka/0", "orders-1", 150);
    // Directories that are not partition logs.
    probe.add_directory(1, "/kafka/1", "payments-0.abc123-future", 40);
    probe.add_directory(1, "/kafka/1", "lost+found", 0);

    let snapshot = builder.build_snapshot().await.unwrap();

    assert!(
        snapshot
            .assignment(&TopicPartition::new("__consumer_offsets", 0))
            .is_none()
    );
    let broker_two = snapshot
        .disk(&DiskLocation::new(BrokerId(2), "/kafka/0"))
        .unwrap();
    assert_eq!(broker_two.replicas.len(), 1);
    assert_eq!(snapshot.replicas().count(), 6);
}

#[tokio::test]
async fn test_partition_error_fails_the_snapshot() {
    let (metadata, _probe, builder) = fixture(&cluster());
    let mut broken = PartitionInfo::new(TopicPartition::new("orders", 9), None, vec![BrokerId(1)]);
    broken.error = Some("LEADER_NOT_AVAILABLE".to_string());
    metadata.add_partition(broken);

    let result = builder.build_snapshot().await;
    assert!(matches!(result, Err(BalanceError::Connectivity { .. })));
}

#[tokio::test]
async fn test_replicas_larger_than_disk_usage_are_rejected() {
    let disks = vec![
        disk(1, "/kafka/0", 10, vec![follower("orders", 0, 40)]),
        disk(2, "/kafka/0", 0, vec![]),
    ];
    let (_metadata, _probe, builder) = fixture(&disks);

    let error = builder.build_snapshot().await.unwrap_err();
    assert!(matches!(error, BalanceError::InvalidSnapshot { .. }));
}

#[tokio::test]
async fn test_assignment_to_unlisted_broker_fails_the_snapshot() {
    let (metadata, _probe, builder) = fixture(&cluster());
    // Broker 4 is offline and absent from the broker list.
    metadata.add_partition(PartitionInfo::new(
        TopicPartition::new("audit", 0),
        Some(BrokerId(1)),
        vec![BrokerId(1), BrokerId(4)],
    ));

    let error = builder.build_snapshot().await.unwrap_err();
    assert!(matches!(error, BalanceError::Connectivity { .. }));
    assert_eq!(error.exit_code(), 3);
}

#[tokio::test]
async fn test_replica_outside_probed_disks_is_kept_in_assignment() {
    let disks = vec![
        disk(1, "/kafka/0", 100, vec![leader("logs", 0, 40)]),
        disk(2, "/kafka/0", 0, vec![]),
    ];
    let (metadata, _probe, builder) = fixture(&disks);
    *metadata.partitions.lock().unwrap() = vec![PartitionInfo::new(
        TopicPartition::new("logs", 0),
        Some(BrokerId(1)),
        vec![BrokerId(1), BrokerId(2)],
    )];

    let snapshot = builder.build_snapshot().await.unwrap();

    assert_eq!(
        snapshot.unplaced_replicas(),
        vec![(TopicPartition::new("logs", 0), BrokerId(2))]
    );
    assert_eq!(
        snapshot.assignment(&TopicPartition::new("logs", 0)),
        Some(&[BrokerId(1), BrokerId(2)][..])
    );
}
