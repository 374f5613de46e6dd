//! Immutable view of cluster disk state used for planning.

pub mod snapshot;

pub use snapshot::{Broker, ClusterSnapshot, Disk, PartitionReplica};
