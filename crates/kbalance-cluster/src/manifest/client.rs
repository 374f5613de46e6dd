//! Collaborators that answer from a loaded [`ClusterManifest`] instead of a
//! live cluster.

use super::types::ClusterManifest;
use crate::ClusterError;
use async_trait::async_trait;
use kbalance::{
    BrokerInfo, ClientError, DiskId, DiskUsage, DiskUsageProbe, MetadataClient, PartitionInfo,
    ReassignmentRequest, ReassignmentTool, ThrottleConfig, TopicPartition, VerifyReport,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Metadata client over a manifest.
#[derive(Debug, Clone)]
pub struct ManifestMetadataClient {
    manifest: Arc<ClusterManifest>,
}

/// Disk probe over a manifest.
#[derive(Debug, Clone)]
pub struct ManifestDiskProbe {
    manifest: Arc<ClusterManifest>,
}

/// Stand-in reassignment tool for offline planning. Every call fails as
/// unreachable, so only dry runs succeed against a manifest.
#[derive(Debug, Clone, Default)]
pub struct OfflineReassignTool;

impl ManifestMetadataClient {
    pub fn new(manifest: Arc<ClusterManifest>) -> Self {
        Self { manifest }
    }
}

impl ManifestDiskProbe {
    pub fn new(manifest: Arc<ClusterManifest>) -> Self {
        Self { manifest }
    }
}

#[async_trait]
impl MetadataClient for ManifestMetadataClient {
    async fn describe_brokers(&self) -> Result<Vec<BrokerInfo>, ClientError> {
        Ok(self
            .manifest
            .brokers
            .iter()
            .map(|broker| BrokerInfo::new(broker.id, broker.host.clone(), broker.port))
            .collect())
    }

    async fn describe_partitions(&self) -> Result<Vec<PartitionInfo>, ClientError> {
        let mut partitions = Vec::new();
        for (topic, assignment) in &self.manifest.topics {
            for partition in &assignment.partitions {
                let mut info = PartitionInfo::new(
                    TopicPartition::new(topic.clone(), partition.id),
                    partition.leader,
                    partition.replicas.clone(),
                );
                info.internal = assignment.internal;
                partitions.push(info);
            }
        }
        Ok(partitions)
    }
}

#[async_trait]
impl DiskUsageProbe for ManifestDiskProbe {
    async fn disk_usage(&self, broker: &BrokerInfo) -> Result<Vec<DiskUsage>, ClientError> {
        let spec = self.manifest.get_broker(broker.id)?;
        Ok(spec
            .disks
            .iter()
            .map(|disk| DiskUsage {
                mount_point: disk.mount_point.clone(),
                capacity_bytes: disk.capacity_bytes,
                used_bytes: disk.used_bytes,
            })
            .collect())
    }

    async fn directory_sizes(
        &self,
        broker: &BrokerInfo,
        disk: &DiskId,
    ) -> Result<BTreeMap<String, u64>, ClientError> {
        let spec = self.manifest.get_broker(broker.id)?;
        spec.disks
            .iter()
            .find(|candidate| &candidate.mount_point == disk)
            .map(|found| found.directories.clone())
            .ok_or_else(|| {
                ClusterError::InvalidManifest {
                    context: "disks".to_string(),
                    reason: format!("{} has no disk {disk}", broker.id),
                }
                .into()
            })
    }
}

fn offline() -> ClientError {
    ClientError::unreachable(
        "reassignment tool",
        "planning from a cluster manifest; no live cluster to reassign",
    )
}

#[async_trait]
impl ReassignmentTool for OfflineReassignTool {
    async fn in_progress(&self) -> Result<bool, ClientError> {
        Err(offline())
    }

    async fn execute(
        &self,
        _request: &ReassignmentRequest,
        _throttle: &ThrottleConfig,
    ) -> Result<(), ClientError> {
        Err(offline())
    }

    async fn verify(&self, _request: &ReassignmentRequest) -> Result<VerifyReport, ClientError> {
        Err(offline())
    }
}
