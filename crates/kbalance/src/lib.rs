//! Disk usage balancing for Kafka-style clusters.
//!
//! A balancing pass takes a [`ClusterSnapshot`] of every broker's disks,
//! plans a bounded sequence of replica moves with the greedy
//! [`planner`], submits them as one reassignment through a
//! [`ReassignmentTool`] and tracks them until they complete.

pub mod balance;
pub mod error;
pub mod executor;
pub mod format;
pub mod model;
pub mod monitor;
pub mod planner;
pub mod reassignment;
pub mod snapshot;
pub mod telemetry;
pub mod throttle;
pub mod traits;
pub mod types;

pub use balance::{BalanceConfig, BalanceLoop, BalanceOutcome};
pub use error::{BalanceError, ClientError};
pub use executor::{MoveState, ReassignmentExecutor, ReassignmentHandle, TrackedMove};
pub use model::{Broker, ClusterSnapshot, Disk, PartitionReplica};
pub use monitor::{CompletionMonitor, MonitorSettings, ReassignmentStatus};
pub use planner::{Move, MovePlan, PlanSettings};
pub use reassignment::{PartitionReassignment, ReassignmentRequest};
pub use snapshot::SnapshotBuilder;
pub use throttle::{ThrottleConfig, compute_throttles};
pub use traits::{
    BrokerInfo, DiskUsage, DiskUsageProbe, MetadataClient, PartitionInfo, PartitionProgress,
    ReassignmentTool, VerifyReport,
};
pub use types::{BrokerId, DiskId, DiskLocation, ReplicaRole, TopicPartition};

// Re-export logging macros for consistent usage across the crate
pub use log::{debug, error, info, trace, warn};
