//! Cluster-facing collaborators for the kbalance pipeline.
//!
//! This crate provides the concrete implementations of the core's
//! `MetadataClient`, `DiskUsageProbe` and `ReassignmentTool` traits: a
//! YAML/JSON cluster manifest for offline planning, and adapters that run
//! `df`, `du` and the Kafka admin scripts on broker hosts over ssh.

pub mod command;
pub mod disk_probe;
pub mod error;
pub mod kafka;
pub mod manifest;

pub use error::ClusterError;

// Re-export the collaborators for ergonomics
pub use command::{
    CommandOutput, CommandRunner, HostConnector, LocalConnector, LocalRunner, SshConnector,
    SshRunner,
};
pub use disk_probe::RemoteDiskProbe;
pub use kafka::{KafkaCliMetadataClient, KafkaReassignTool};
pub use manifest::{
    ClusterManifest, ManifestDiskProbe, ManifestLoader, ManifestMetadataClient,
    OfflineReassignTool,
};

// Re-export logging macros for consistent usage across the crate
pub use log::{debug, error, info, trace, warn};
