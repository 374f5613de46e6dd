use crate::error::BalanceError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_MOVES: usize = 10;
pub const DEFAULT_PARTITION_PERCENTAGE: f64 = 90.0;
pub const DEFAULT_DISK_PERCENTAGE: f64 = 10.0;

/// Thresholds driving the imbalance planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSettings {
    /// Upper bound on the number of moves in one plan.
    pub max_moves: usize,
    /// Two replica sizes closer than this percentage are treated as the same
    /// size when checking for back-and-forth swaps.
    pub partition_percentage: f64,
    /// Minimum usage difference, in percent of the larger side, between two
    /// brokers (or two disks of one broker) before a move between them is allowed.
    pub disk_percentage: f64,
    /// Allow moving leader replicas. Off by default: leaders serve traffic.
    pub move_leaders: bool,
}

impl Default for PlanSettings {
    fn default() -> Self {
        Self {
            max_moves: DEFAULT_MAX_MOVES,
            partition_percentage: DEFAULT_PARTITION_PERCENTAGE,
            disk_percentage: DEFAULT_DISK_PERCENTAGE,
            move_leaders: false,
        }
    }
}

impl PlanSettings {
    pub fn validate(&self) -> Result<(), BalanceError> {
        check_percentage("partition_percentage", self.partition_percentage)?;
        check_percentage("disk_percentage", self.disk_percentage)?;
        Ok(())
    }

    /// Size ratio (`min / max`) above which two replicas count as similar.
    pub(crate) fn similarity_ratio(&self) -> f64 {
        1.0 - self.partition_percentage.clamp(0.0, 100.0) / 100.0
    }
}

fn check_percentage(field: &str, value: f64) -> Result<(), BalanceError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(BalanceError::invalid_config(
            field,
            format!("{value} is not a percentage between 0 and 100"),
        ));
    }
    Ok(())
}

/// True when `a` and `b` differ by strictly more than `percentage` percent of
/// the larger value. Two zeros never differ.
pub(crate) fn differs_by_more_than(a: u64, b: u64, percentage: f64) -> bool {
    let (larger, smaller) = if a >= b { (a, b) } else { (b, a) };
    if larger == 0 {
        return false;
    }
    let diff = (larger - smaller) as f64 / larger as f64 * 100.0;
    diff > percentage
}
