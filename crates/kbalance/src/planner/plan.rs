//! Move and move plan definitions.

use crate::{
    format::format_bytes,
    model::{ClusterSnapshot, PartitionReplica},
    types::{BrokerId, DiskLocation, TopicPartition},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Projected used bytes of one endpoint around a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeDelta {
    pub before: u64,
    pub after: u64,
}

/// Relocation of one replica to another disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub replica: PartitionReplica,
    pub source: DiskLocation,
    pub destination: DiskLocation,
    pub source_bytes: SizeDelta,
    pub destination_bytes: SizeDelta,
}

/// Ordered list of moves planned from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovePlan {
    pub(crate) snapshot_version: u64,
    pub(crate) moves: Vec<Move>,
    /// Current replica lists of the partitions the plan touches.
    pub(crate) assignments: BTreeMap<TopicPartition, Vec<BrokerId>>,
    pub(crate) score_before: f64,
    pub(crate) score_after: f64,
}

impl SizeDelta {
    pub fn change(&self) -> i128 {
        self.after as i128 - self.before as i128
    }
}

impl Move {
    pub fn partition(&self) -> &TopicPartition {
        &self.replica.partition
    }

    pub fn size_bytes(&self) -> u64 {
        self.replica.size_bytes
    }

    pub fn is_cross_broker(&self) -> bool {
        self.source.broker != self.destination.broker
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} replica {} ({}) from {} to {}",
            self.replica.partition,
            self.replica.replica_index,
            format_bytes(self.replica.size_bytes),
            self.source,
            self.destination
        )
    }
}

impl MovePlan {
    pub fn empty(snapshot_version: u64, score: f64) -> Self {
        Self {
            snapshot_version,
            moves: Vec::new(),
            assignments: BTreeMap::new(),
            score_before: score,
            score_after: score,
        }
    }

    pub fn snapshot_version(&self) -> u64 {
        self.snapshot_version
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Replica list of a partition touched by the plan, as seen in the snapshot.
    pub fn assignment(&self, partition: &TopicPartition) -> Option<&[BrokerId]> {
        self.assignments.get(partition).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Move> {
        self.moves.iter()
    }

    pub fn cross_broker_moves(&self) -> usize {
        self.moves.iter().filter(|m| m.is_cross_broker()).count()
    }

    pub fn intra_broker_moves(&self) -> usize {
        self.moves.len() - self.cross_broker_moves()
    }

    pub fn total_bytes(&self) -> u64 {
        self.moves.iter().map(Move::size_bytes).sum()
    }

    /// Population variance of per-disk used bytes before the plan.
    pub fn score_before(&self) -> f64 {
        self.score_before
    }

    /// Population variance of per-disk used bytes once every move lands.
    pub fn score_after(&self) -> f64 {
        self.score_after
    }

    /// Per-disk used bytes after applying every move to `snapshot`.
    pub fn project(&self, snapshot: &ClusterSnapshot) -> BTreeMap<DiskLocation, u64> {
        let mut used: BTreeMap<DiskLocation, u64> = snapshot
            .disks()
            .map(|d| (d.location.clone(), d.used_bytes))
            .collect();
        for mv in &self.moves {
            if let Some(source) = used.get_mut(&mv.source) {
                *source = source.saturating_sub(mv.size_bytes());
            }
            if let Some(destination) = used.get_mut(&mv.destination) {
                *destination += mv.size_bytes();
            }
        }
        used
    }
}

impl<'a> IntoIterator for &'a MovePlan {
    type Item = &'a Move;
    type IntoIter = std::slice::Iter<'a, Move>;

    fn into_iter(self) -> Self::IntoIter {
        self.moves.iter()
    }
}

/// Population variance of the given used-byte totals. Lower is better balanced.
pub fn imbalance_score(used: impl IntoIterator<Item = u64>) -> f64 {
    let values: Vec<f64> = used.into_iter().map(|v| v as f64).collect();
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}
