//! Cluster manifest definitions, loading and the collaborators backed by them.

pub mod client;
pub mod loader;
pub mod types;

// Re-exports for ergonomics
pub use client::{ManifestDiskProbe, ManifestMetadataClient, OfflineReassignTool};
pub use loader::{ManifestFormat, ManifestLoader};
pub use types::{BrokerSpec, ClusterManifest, DiskSpec, PartitionAssignment, TopicAssignment};
