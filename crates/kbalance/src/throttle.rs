//! Transfer rate caps handed to the reassignment mechanism.

use crate::{error::BalanceError, planner::MovePlan};
use serde::{Deserialize, Serialize};

pub const DEFAULT_NET_THROTTLE: u64 = 20_000_000;
pub const DEFAULT_DISK_THROTTLE: u64 = 200_000_000;

/// Byte/sec caps for inter-broker replication and intra-broker log dir moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    pub inter_broker_bytes_per_sec: u64,
    pub intra_broker_bytes_per_sec: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        compute_throttles(DEFAULT_NET_THROTTLE, DEFAULT_DISK_THROTTLE)
    }
}

/// Map configured caps to the throttle representation of the mechanism.
pub fn compute_throttles(net_throttle: u64, disk_throttle: u64) -> ThrottleConfig {
    ThrottleConfig {
        inter_broker_bytes_per_sec: net_throttle,
        intra_broker_bytes_per_sec: disk_throttle,
    }
}

impl ThrottleConfig {
    /// A zero cap is only acceptable for a transfer kind the plan never uses.
    pub fn validate_for(&self, plan: &MovePlan) -> Result<(), BalanceError> {
        if plan.cross_broker_moves() > 0 && self.inter_broker_bytes_per_sec == 0 {
            return Err(BalanceError::invalid_config(
                "net_throttle",
                "must be positive when moving replicas between brokers",
            ));
        }
        if plan.intra_broker_moves() > 0 && self.intra_broker_bytes_per_sec == 0 {
            return Err(BalanceError::invalid_config(
                "disk_throttle",
                "must be positive when moving replicas between disks of a broker",
            ));
        }
        Ok(())
    }

    /// Command-line arguments understood by `kafka-reassign-partitions`.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            "--throttle".to_string(),
            self.inter_broker_bytes_per_sec.to_string(),
            "--replica-alter-log-dirs-throttle".to_string(),
            self.intra_broker_bytes_per_sec.to_string(),
        ]
    }
}
