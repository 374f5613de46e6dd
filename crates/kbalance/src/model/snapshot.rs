//! Cluster snapshot data structures.

use crate::{
    error::BalanceError,
    types::{BrokerId, DiskId, DiskLocation, ReplicaRole, TopicPartition},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One copy of a topic-partition's log, resident on exactly one disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionReplica {
    pub partition: TopicPartition,
    pub role: ReplicaRole,
    /// Position of the hosting broker in the partition's replica list.
    pub replica_index: usize,
    pub size_bytes: u64,
    pub location: DiskLocation,
}

/// A storage volume on a broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub location: DiskLocation,
    /// Used bytes as reported by the filesystem. May include non-replica data.
    pub used_bytes: u64,
    pub capacity_bytes: Option<u64>,
    pub replicas: Vec<PartitionReplica>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broker {
    pub id: BrokerId,
    pub host: String,
    pub port: u16,
    pub disks: BTreeMap<DiskId, Disk>,
}

/// Immutable mapping broker → disk → replicas, plus the partition assignment
/// table it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    version: u64,
    taken_at: DateTime<Utc>,
    brokers: BTreeMap<BrokerId, Broker>,
    assignments: BTreeMap<TopicPartition, Vec<BrokerId>>,
}

impl PartitionReplica {
    pub fn is_leader(&self) -> bool {
        self.role.is_leader()
    }
}

impl Disk {
    pub fn new(broker: BrokerId, mount_point: impl Into<DiskId>, used_bytes: u64) -> Self {
        Self {
            location: DiskLocation::new(broker, mount_point),
            used_bytes,
            capacity_bytes: None,
            replicas: Vec::new(),
        }
    }

    pub fn with_capacity(mut self, capacity_bytes: u64) -> Self {
        self.capacity_bytes = Some(capacity_bytes);
        self
    }

    /// Add a replica resident on this disk.
    pub fn with_replica(
        mut self,
        partition: TopicPartition,
        role: ReplicaRole,
        replica_index: usize,
        size_bytes: u64,
    ) -> Self {
        self.push_replica(partition, role, replica_index, size_bytes);
        self
    }

    pub fn push_replica(
        &mut self,
        partition: TopicPartition,
        role: ReplicaRole,
        replica_index: usize,
        size_bytes: u64,
    ) {
        self.replicas.push(PartitionReplica {
            partition,
            role,
            replica_index,
            size_bytes,
            location: self.location.clone(),
        });
    }

    pub fn id(&self) -> &DiskId {
        &self.location.disk
    }

    pub fn broker(&self) -> BrokerId {
        self.location.broker
    }

    pub fn replica_bytes(&self) -> u64 {
        self.replicas.iter().map(|r| r.size_bytes).sum()
    }

    pub fn hosts_partition(&self, partition: &TopicPartition) -> bool {
        self.replicas.iter().any(|r| &r.partition == partition)
    }
}

impl Broker {
    pub fn new(id: BrokerId, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
            disks: BTreeMap::new(),
        }
    }

    pub fn with_disk(mut self, disk: Disk) -> Self {
        self.disks.insert(disk.id().clone(), disk);
        self
    }

    pub fn used_bytes(&self) -> u64 {
        self.disks.values().map(|d| d.used_bytes).sum()
    }

    pub fn hosts_partition(&self, partition: &TopicPartition) -> bool {
        self.disks.values().any(|d| d.hosts_partition(partition))
    }

    /// `host:port` form accepted by Kafka tooling.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ClusterSnapshot {
    /// Build a snapshot, checking the structural invariants:
    /// every disk belongs to the broker that lists it, each partition has at
    /// most one replica per broker, every replica's broker appears in the
    /// partition's assignment at the recorded index, and the replicas on a
    /// disk never add up to more than the disk's used bytes.
    pub fn new(
        version: u64,
        taken_at: DateTime<Utc>,
        brokers: impl IntoIterator<Item = Broker>,
        assignments: BTreeMap<TopicPartition, Vec<BrokerId>>,
    ) -> Result<Self, BalanceError> {
        let mut by_id = BTreeMap::new();
        for mut broker in brokers {
            for disk in broker.disks.values_mut() {
                // Largest first, then by partition, so iteration order is stable.
                disk.replicas.sort_by(|a, b| {
                    b.size_bytes
                        .cmp(&a.size_bytes)
                        .then_with(|| a.partition.cmp(&b.partition))
                });
            }
            if by_id.insert(broker.id, broker).is_some() {
                return Err(BalanceError::InvalidSnapshot {
                    reason: "duplicate broker id".to_string(),
                });
            }
        }

        let mut seen: HashSet<(TopicPartition, BrokerId)> = HashSet::new();
        for broker in by_id.values() {
            for (disk_id, disk) in &broker.disks {
                if disk.location.broker != broker.id || disk.id() != disk_id {
                    return Err(BalanceError::InvalidSnapshot {
                        reason: format!(
                            "disk {} is filed under {}:{}",
                            disk.location, broker.id, disk_id
                        ),
                    });
                }

                let replica_bytes = disk.replica_bytes();
                if replica_bytes > disk.used_bytes {
                    return Err(BalanceError::InvalidSnapshot {
                        reason: format!(
                            "replicas on {} total {replica_bytes} bytes, more than the {} used bytes",
                            disk.location, disk.used_bytes
                        ),
                    });
                }

                for replica in &disk.replicas {
                    if replica.location != disk.location {
                        return Err(BalanceError::InvalidSnapshot {
                            reason: format!(
                                "replica {} claims {} but sits on {}",
                                replica.partition, replica.location, disk.location
                            ),
                        });
                    }
                    if !seen.insert((replica.partition.clone(), broker.id)) {
                        return Err(BalanceError::InvalidSnapshot {
                            reason: format!(
                                "replica {} appears more than once on {}",
                                replica.partition, broker.id
                            ),
                        });
                    }
                    let assigned = assignments
                        .get(&replica.partition)
                        .and_then(|replicas| replicas.get(replica.replica_index));
                    if assigned != Some(&broker.id) {
                        return Err(BalanceError::InvalidSnapshot {
                            reason: format!(
                                "replica {} on {} does not match assignment slot {}",
                                replica.partition, broker.id, replica.replica_index
                            ),
                        });
                    }
                }
            }
        }

        Ok(Self {
            version,
            taken_at,
            brokers: by_id,
            assignments,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn brokers(&self) -> &BTreeMap<BrokerId, Broker> {
        &self.brokers
    }

    pub fn broker(&self, id: BrokerId) -> Option<&Broker> {
        self.brokers.get(&id)
    }

    pub fn disk(&self, location: &DiskLocation) -> Option<&Disk> {
        self.brokers
            .get(&location.broker)
            .and_then(|b| b.disks.get(&location.disk))
    }

    /// All disks in (broker id, disk id) order.
    pub fn disks(&self) -> impl Iterator<Item = &Disk> {
        self.brokers.values().flat_map(|b| b.disks.values())
    }

    pub fn replicas(&self) -> impl Iterator<Item = &PartitionReplica> {
        self.disks().flat_map(|d| d.replicas.iter())
    }

    pub fn assignments(&self) -> &BTreeMap<TopicPartition, Vec<BrokerId>> {
        &self.assignments
    }

    pub fn assignment(&self, partition: &TopicPartition) -> Option<&[BrokerId]> {
        self.assignments.get(partition).map(Vec::as_slice)
    }

    /// Assigned `(partition, broker)` pairs with no replica on any disk of
    /// the snapshot, e.g. logs on mounts outside the probed set.
    pub fn unplaced_replicas(&self) -> Vec<(TopicPartition, BrokerId)> {
        let placed: HashSet<(&TopicPartition, BrokerId)> = self
            .replicas()
            .map(|r| (&r.partition, r.location.broker))
            .collect();
        self.assignments
            .iter()
            .flat_map(|(partition, replicas)| {
                replicas
                    .iter()
                    .filter(|broker| !placed.contains(&(partition, **broker)))
                    .map(move |broker| (partition.clone(), *broker))
            })
            .collect()
    }

    pub fn disk_count(&self) -> usize {
        self.brokers.values().map(|b| b.disks.len()).sum()
    }

    pub fn total_used_bytes(&self) -> u64 {
        self.brokers.values().map(Broker::used_bytes).sum()
    }

    /// Used bytes of the fullest disk, zero when there are no disks.
    pub fn max_disk_used_bytes(&self) -> u64 {
        self.disks().map(|d| d.used_bytes).max().unwrap_or(0)
    }
}
