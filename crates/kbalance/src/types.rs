//! Identifier types shared by the snapshot model, the planner and the executor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a broker in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrokerId(pub u32);

/// Disk identifier, unique within a broker. This is the mount point, normalised
/// to carry no trailing slash (except for the root mount).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct DiskId(String);

/// Topic-partition pair, ordered by topic then partition index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: u32,
}

/// Physical location of a replica: a disk on a broker.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DiskLocation {
    pub broker: BrokerId,
    pub disk: DiskId,
}

/// Role a replica plays for its partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaRole {
    Leader,
    Follower,
}

impl From<u32> for BrokerId {
    fn from(id: u32) -> Self {
        BrokerId(id)
    }
}

impl From<BrokerId> for u32 {
    fn from(broker_id: BrokerId) -> Self {
        broker_id.0
    }
}

impl DiskId {
    pub fn new(mount_point: impl Into<String>) -> Self {
        let mount_point = mount_point.into();
        let trimmed = mount_point.trim_end_matches('/');
        if trimmed.is_empty() {
            DiskId("/".to_string())
        } else {
            DiskId(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Mount point with a trailing slash, the form used as a directory prefix.
    pub fn as_dir_prefix(&self) -> String {
        if self.0.ends_with('/') {
            self.0.clone()
        } else {
            format!("{}/", self.0)
        }
    }
}

impl From<&str> for DiskId {
    fn from(mount_point: &str) -> Self {
        DiskId::new(mount_point)
    }
}

impl From<String> for DiskId {
    fn from(mount_point: String) -> Self {
        DiskId::new(mount_point)
    }
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }

    /// Name of the partition's log directory, `<topic>-<partition>`.
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.topic, self.partition)
    }
}

impl DiskLocation {
    pub fn new(broker: BrokerId, disk: impl Into<DiskId>) -> Self {
        Self {
            broker,
            disk: disk.into(),
        }
    }
}

impl ReplicaRole {
    pub fn is_leader(&self) -> bool {
        matches!(self, ReplicaRole::Leader)
    }
}

impl fmt::Display for BrokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "broker-{}", self.0)
    }
}

impl fmt::Display for DiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

impl fmt::Display for DiskLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.broker, self.disk)
    }
}
