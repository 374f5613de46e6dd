use crate::test_utilities::*;
use kbalance::{BrokerInfo, ClientError, DiskId, DiskUsageProbe};
use kbalance_cluster::ClusterError;
use kbalance_cluster::disk_probe::{
    DEFAULT_DISK_GLOB, DF_COMMAND, RemoteDiskProbe, glob_to_regex, parse_df, parse_du,
};
use std::sync::Arc;
use test_log::test;

const DF_OUTPUT: &str = "\
Mounted on       1B-blocks        Used
/            105089261568 20436500480
/boot          1020702720   219127808
/kafka/0    3936770859008 2917364523008
/kafka/1    3936770859008 1211224461312
/dev/shm      33664446464           0
";

const DU_OUTPUT: &str = "\
1524989440\t/kafka/0/orders-0
912261120\t/kafka/0/orders-1
16384\t/kafka/0/lost+found
";

#[test]
fn test_parse_df_filters_by_glob() {
    let disks = parse_df(DF_OUTPUT, &glob_to_regex(DEFAULT_DISK_GLOB).unwrap()).unwrap();

    assert_eq!(disks.len(), 2);
    assert_eq!(disks[0].mount_point, DiskId::new("/kafka/0"));
    assert_eq!(disks[0].capacity_bytes, Some(3_936_770_859_008));
    assert_eq!(disks[0].used_bytes, 2_917_364_523_008);
    assert_eq!(disks[1].mount_point, DiskId::new("/kafka/1"));
}

#[test]
fn test_parse_df_rejects_garbage() {
    let mounts = glob_to_regex(DEFAULT_DISK_GLOB).unwrap();

    let error = parse_df("Mounted on 1B-blocks Used\n/kafka/0 lots 12\n", &mounts).unwrap_err();
    assert!(matches!(error, ClusterError::UnexpectedOutput { .. }));

    let error = parse_df("header\n/kafka/0\n", &mounts).unwrap_err();
    assert!(matches!(error, ClusterError::UnexpectedOutput { .. }));

    // Header only.
    assert!(parse_df("Mounted on 1B-blocks Used\n", &mounts).unwrap().is_empty());
}

#[test]
fn test_parse_du_strips_mount_prefix() {
    let sizes = parse_du(DU_OUTPUT, &DiskId::new("/kafka/0")).unwrap();

    assert_eq!(sizes.len(), 3);
    assert_eq!(sizes.get("orders-0"), Some(&1_524_989_440));
    assert_eq!(sizes.get("orders-1"), Some(&912_261_120));
    assert_eq!(sizes.get("lost+found"), Some(&16_384));
}

#[test]
fn test_parse_du_skips_mount_and_rejects_foreign_paths() {
    let output = "4096\t/kafka/0/\n100\t/kafka/0/audit-0\n";
    let sizes = parse_du(output, &DiskId::new("/kafka/0")).unwrap();
    assert_eq!(sizes.len(), 1);

    let error = parse_du("100\t/kafka/1/audit-0\n", &DiskId::new("/kafka/0")).unwrap_err();
    assert!(error.to_string().contains("is not under"));

    // A sibling mount sharing the prefix is not under the disk.
    assert!(parse_du("100\t/kafka/00/audit-0\n", &DiskId::new("/kafka/0")).is_err());
}

#[test(tokio::test)]
async fn test_remote_probe_runs_df_and_du_on_the_broker_host() {
    let connector = Arc::new(FakeConnector::default());
    let host = connector.host("kafka-1");
    host.respond("df -l", vec![ok(DF_OUTPUT)]);
    host.respond("find /kafka/0/", vec![ok(DU_OUTPUT)]);
    let probe = RemoteDiskProbe::new(connector.clone(), DEFAULT_DISK_GLOB).unwrap();
    let broker = BrokerInfo::new(1, "kafka-1", 9092);

    let disks = probe.disk_usage(&broker).await.unwrap();
    let sizes = probe
        .directory_sizes(&broker, &disks[0].mount_point)
        .await
        .unwrap();

    assert_eq!(disks.len(), 2);
    assert_eq!(sizes.len(), 3);
    let commands = host.commands();
    assert_eq!(commands[0], DF_COMMAND);
    assert!(commands[1].contains("du -x -s --block-size=1"));
    assert!(connector.host("kafka-2").commands().is_empty());
}

#[test(tokio::test)]
async fn test_remote_probe_errors() {
    let connector = Arc::new(FakeConnector::default());
    let probe = RemoteDiskProbe::new(connector.clone(), "/data/*").unwrap();
    let broker = BrokerInfo::new(1, "kafka-1", 9092);

    // No mount matches the glob.
    connector.host("kafka-1").respond("df -l", vec![ok(DF_OUTPUT)]);
    let error = probe.disk_usage(&broker).await.unwrap_err();
    assert!(matches!(error, ClientError::Malformed { .. }));

    // ssh exits non-zero.
    let broker = BrokerInfo::new(2, "kafka-2", 9092);
    connector
        .host("kafka-2")
        .respond("df -l", vec![failed(255, "", "Permission denied (publickey).")]);
    match probe.disk_usage(&broker).await.unwrap_err() {
        ClientError::CommandFailed { status, stderr, .. } => {
            assert_eq!(status, Some(255));
            assert_eq!(stderr, "Permission denied (publickey).");
        }
        other => panic!("expected command failure, got {other:?}"),
    }

    // Host unreachable.
    let broker = BrokerInfo::new(3, "kafka-3", 9092);
    connector.host("kafka-3").set_unreachable(true);
    let error = probe.disk_usage(&broker).await.unwrap_err();
    assert!(matches!(error, ClientError::Unreachable { .. }));
}
