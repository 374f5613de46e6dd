//! Cluster manifest data structures.
//!
//! A manifest describes a cluster offline: brokers with their data disks and
//! the sizes of the partition directories on each disk, plus the replica
//! assignment of every topic.

use crate::ClusterError;
use kbalance::{BrokerId, DiskId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSpec {
    pub mount_point: DiskId,
    pub used_bytes: u64,
    #[serde(default)]
    pub capacity_bytes: Option<u64>,
    /// Directory name (`<topic>-<partition>`) → size in bytes.
    #[serde(default)]
    pub directories: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerSpec {
    pub id: BrokerId,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub disks: Vec<DiskSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionAssignment {
    pub id: u32,
    #[serde(default)]
    pub leader: Option<BrokerId>,
    pub replicas: Vec<BrokerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAssignment {
    pub partitions: Vec<PartitionAssignment>,
    #[serde(default)]
    pub internal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterManifest {
    pub brokers: Vec<BrokerSpec>,
    pub topics: BTreeMap<String, TopicAssignment>,
}

impl ClusterManifest {
    pub fn new() -> Self {
        Self {
            brokers: Vec::new(),
            topics: BTreeMap::new(),
        }
    }

    pub fn get_broker(&self, broker_id: BrokerId) -> Result<&BrokerSpec, ClusterError> {
        self.brokers
            .iter()
            .find(|broker| broker.id == broker_id)
            .ok_or(ClusterError::BrokerNotFound {
                broker_id: broker_id.into(),
            })
    }

    pub fn get_topic(&self, topic: &str) -> Result<&TopicAssignment, ClusterError> {
        self.topics.get(topic).ok_or(ClusterError::TopicNotFound {
            topic: topic.to_string(),
        })
    }

    pub fn get_partition(
        &self,
        topic: &str,
        partition_id: u32,
    ) -> Result<&PartitionAssignment, ClusterError> {
        let topic_assignment = self.get_topic(topic)?;
        topic_assignment
            .partitions
            .iter()
            .find(|partition| partition.id == partition_id)
            .ok_or(ClusterError::PartitionNotFound {
                topic: topic.to_string(),
                partition_id,
            })
    }

    /// Check that broker ids and mount points are unique and that every
    /// replica and leader refers to a known broker.
    pub fn validate(&self) -> Result<(), ClusterError> {
        let mut broker_ids = HashSet::new();
        for broker in &self.brokers {
            if !broker_ids.insert(broker.id) {
                return Err(invalid("brokers", format!("{} listed twice", broker.id)));
            }
            let mut mounts = HashSet::new();
            for disk in &broker.disks {
                if !mounts.insert(&disk.mount_point) {
                    return Err(invalid(
                        "disks",
                        format!("{} lists {} twice", broker.id, disk.mount_point),
                    ));
                }
            }
        }

        for (topic, assignment) in &self.topics {
            for partition in &assignment.partitions {
                let mut seen = HashSet::new();
                for replica in &partition.replicas {
                    if !broker_ids.contains(replica) {
                        return Err(invalid(
                            "topics",
                            format!("{topic}-{} references unknown {replica}", partition.id),
                        ));
                    }
                    if !seen.insert(replica) {
                        return Err(invalid(
                            "topics",
                            format!("{topic}-{} lists {replica} twice", partition.id),
                        ));
                    }
                }
                if let Some(leader) = partition.leader {
                    if !partition.replicas.contains(&leader) {
                        return Err(invalid(
                            "topics",
                            format!("{topic}-{} leader {leader} is not a replica", partition.id),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for ClusterManifest {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(context: &str, reason: String) -> ClusterError {
    ClusterError::InvalidManifest {
        context: context.to_string(),
        reason,
    }
}
