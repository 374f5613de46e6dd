//! Cluster snapshot construction from metadata and disk probes.

use crate::{
    error::BalanceError,
    model::{Broker, ClusterSnapshot, Disk},
    traits::{BrokerInfo, DiskUsageProbe, MetadataClient, PartitionInfo},
    types::{BrokerId, ReplicaRole, TopicPartition},
};
use chrono::Utc;
use futures_util::future::try_join_all;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Builds immutable [`ClusterSnapshot`]s. Every snapshot gets a version one
/// higher than the previous one built by the same builder.
pub struct SnapshotBuilder {
    metadata: Arc<dyn MetadataClient>,
    probe: Arc<dyn DiskUsageProbe>,
    last_version: AtomicU64,
}

impl SnapshotBuilder {
    pub fn new(metadata: Arc<dyn MetadataClient>, probe: Arc<dyn DiskUsageProbe>) -> Self {
        Self {
            metadata,
            probe,
            last_version: AtomicU64::new(0),
        }
    }

    /// Query every broker and partition and assemble a snapshot.
    ///
    /// Brokers are probed concurrently. Any failure fails the whole snapshot;
    /// a partial view is never returned.
    pub async fn build_snapshot(&self) -> Result<ClusterSnapshot, BalanceError> {
        let brokers = self
            .metadata
            .describe_brokers()
            .await
            .map_err(|e| BalanceError::from_connectivity_error(e, "describe brokers"))?;
        let partitions = self
            .metadata
            .describe_partitions()
            .await
            .map_err(|e| BalanceError::from_connectivity_error(e, "describe partitions"))?;

        let mut assignments: BTreeMap<TopicPartition, Vec<BrokerId>> = BTreeMap::new();
        let mut by_dir: HashMap<String, &PartitionInfo> = HashMap::new();
        for info in &partitions {
            if info.internal {
                debug!("Skipping internal partition {}", info.partition);
                continue;
            }
            if let Some(error) = &info.error {
                return Err(BalanceError::from_connectivity_error(
                    error,
                    &format!("metadata for {}", info.partition),
                ));
            }
            assignments.insert(info.partition.clone(), info.replicas.clone());
            by_dir.insert(info.partition.dir_name(), info);
        }

        let known: HashSet<BrokerId> = brokers.iter().map(|b| b.id).collect();
        for (partition, replicas) in &assignments {
            if let Some(missing) = replicas.iter().find(|id| !known.contains(id)) {
                return Err(BalanceError::Connectivity {
                    context: format!("metadata for {partition}"),
                    reason: format!("assigned {missing} is not among the reachable brokers"),
                });
            }
        }

        let probes = brokers.iter().map(|b| self.probe_broker(b, &by_dir));
        let probed = try_join_all(probes).await?;

        let version = self.last_version.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = ClusterSnapshot::new(version, Utc::now(), probed, assignments)?;
        let unplaced = snapshot.unplaced_replicas();
        if !unplaced.is_empty() {
            warn!(
                "{} assigned replica(s) not found on any probed disk: {}",
                unplaced.len(),
                unplaced
                    .iter()
                    .map(|(partition, broker)| format!("{partition}@{broker}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        info!(
            "Snapshot v{version}: {} broker(s), {} disk(s), {} partition(s)",
            snapshot.brokers().len(),
            snapshot.disk_count(),
            snapshot.assignments().len()
        );
        Ok(snapshot)
    }

    async fn probe_broker(
        &self,
        info: &BrokerInfo,
        by_dir: &HashMap<String, &PartitionInfo>,
    ) -> Result<Broker, BalanceError> {
        let usages = self
            .probe
            .disk_usage(info)
            .await
            .map_err(|e| {
                BalanceError::from_connectivity_error(e, &format!("disk usage on {info}"))
            })?;

        let mut broker = Broker::new(info.id, info.host.clone(), info.port);
        for usage in usages {
            let sizes = self
                .probe
                .directory_sizes(info, &usage.mount_point)
                .await
                .map_err(|e| {
                    BalanceError::from_connectivity_error(
                        e,
                        &format!("directory sizes of {} on {info}", usage.mount_point),
                    )
                })?;

            let mut disk = Disk::new(info.id, usage.mount_point.clone(), usage.used_bytes);
            disk.capacity_bytes = usage.capacity_bytes;
            for (dir, size) in sizes {
                let Some(partition) = by_dir.get(&dir) else {
                    continue;
                };
                let Some(index) = partition.replicas.iter().position(|b| *b == info.id) else {
                    warn!(
                        "{} holds {dir} on {} but is not in its replica list {:?}",
                        info.id, usage.mount_point, partition.replicas
                    );
                    continue;
                };
                let role = if partition.leader == Some(info.id) {
                    ReplicaRole::Leader
                } else {
                    ReplicaRole::Follower
                };
                disk.push_replica(partition.partition.clone(), role, index, size);
            }
            debug!(
                "{}: {} replica(s), {} used bytes",
                disk.location,
                disk.replicas.len(),
                disk.used_bytes
            );
            broker = broker.with_disk(disk);
        }
        Ok(broker)
    }
}
