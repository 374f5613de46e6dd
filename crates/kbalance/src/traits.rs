//! Collaborator interfaces consumed by the balancing pipeline.
//!
//! The core never talks to brokers, hosts or the reassignment executable
//! directly. Concrete adapters (cluster manifest, `df`/`du` over ssh,
//! `kafka-reassign-partitions`) live outside this crate and implement these
//! traits.

use crate::{
    error::ClientError,
    monitor::ReassignmentStatus,
    reassignment::ReassignmentRequest,
    throttle::ThrottleConfig,
    types::{BrokerId, DiskId, TopicPartition},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Broker endpoint as reported by cluster metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerInfo {
    pub id: BrokerId,
    pub host: String,
    pub port: u16,
}

/// Replica assignment and leadership of one topic-partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    pub partition: TopicPartition,
    pub leader: Option<BrokerId>,
    pub replicas: Vec<BrokerId>,
    #[serde(default)]
    pub internal: bool,
    /// Error reported by the cluster for this partition, if any.
    #[serde(default)]
    pub error: Option<String>,
}

/// Usage of one mounted disk on a broker host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub mount_point: DiskId,
    pub capacity_bytes: Option<u64>,
    pub used_bytes: u64,
}

/// Verification progress of one partition in a reassignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionProgress {
    InProgress,
    Completed,
    Failed(String),
}

/// Result of one verification run of the reassignment mechanism.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub partitions: BTreeMap<TopicPartition, PartitionProgress>,
}

impl BrokerInfo {
    pub fn new(id: impl Into<BrokerId>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for BrokerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.id, self.host, self.port)
    }
}

impl PartitionInfo {
    pub fn new(
        partition: TopicPartition,
        leader: Option<BrokerId>,
        replicas: Vec<BrokerId>,
    ) -> Self {
        Self {
            partition,
            leader,
            replicas,
            internal: false,
            error: None,
        }
    }
}

impl VerifyReport {
    pub fn with_partition(
        mut self,
        partition: TopicPartition,
        progress: PartitionProgress,
    ) -> Self {
        self.partitions.insert(partition, progress);
        self
    }

    /// Any partition in progress wins over failures; failures win over completion.
    pub fn status(&self) -> ReassignmentStatus {
        if self
            .partitions
            .values()
            .any(|p| matches!(p, PartitionProgress::InProgress))
        {
            ReassignmentStatus::InProgress
        } else if self
            .partitions
            .values()
            .any(|p| matches!(p, PartitionProgress::Failed(_)))
        {
            ReassignmentStatus::Failed
        } else {
            ReassignmentStatus::Completed
        }
    }

    pub fn failures(&self) -> Vec<String> {
        self.partitions
            .iter()
            .filter_map(|(partition, progress)| match progress {
                PartitionProgress::Failed(detail) => Some(format!("{partition}: {detail}")),
                _ => None,
            })
            .collect()
    }
}

/// Source of broker and partition metadata.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Every live broker of the cluster.
    async fn describe_brokers(&self) -> Result<Vec<BrokerInfo>, ClientError>;

    /// Every topic-partition with its replica list, internal topics included.
    async fn describe_partitions(&self) -> Result<Vec<PartitionInfo>, ClientError>;
}

/// Reads disk usage on broker hosts.
#[async_trait]
pub trait DiskUsageProbe: Send + Sync {
    /// Data disks of `broker` with their used and total bytes.
    async fn disk_usage(&self, broker: &BrokerInfo) -> Result<Vec<DiskUsage>, ClientError>;

    /// Sizes of the top-level directories under `disk`, keyed by directory name.
    async fn directory_sizes(
        &self,
        broker: &BrokerInfo,
        disk: &DiskId,
    ) -> Result<BTreeMap<String, u64>, ClientError>;
}

/// The external mechanism that physically relocates replicas.
#[async_trait]
pub trait ReassignmentTool: Send + Sync {
    /// Whether a reassignment is currently running in the cluster.
    async fn in_progress(&self) -> Result<bool, ClientError>;

    /// Start `request` under the given transfer caps.
    async fn execute(
        &self,
        request: &ReassignmentRequest,
        throttle: &ThrottleConfig,
    ) -> Result<(), ClientError>;

    /// Query the progress of a previously executed `request`.
    async fn verify(&self, request: &ReassignmentRequest) -> Result<VerifyReport, ClientError>;
}
