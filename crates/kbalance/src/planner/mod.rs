//! Greedy disk imbalance planner.
//!
//! Planning is a pure function of a [`ClusterSnapshot`] and [`PlanSettings`]:
//! it walks disks from most to least loaded, picks the largest replica that can
//! leave the fullest disk for the emptiest permitted one, and projects the
//! result before choosing the next move. Every emitted move strictly lowers the
//! variance of per-disk used bytes, so the plan converges or stops early.

pub mod plan;
pub mod settings;

pub use plan::{Move, MovePlan, SizeDelta, imbalance_score};
pub use settings::PlanSettings;

use crate::{
    model::{ClusterSnapshot, PartitionReplica},
    types::{BrokerId, DiskLocation, TopicPartition},
};
use log::{debug, info, trace};
use settings::differs_by_more_than;
use std::collections::{BTreeMap, HashSet};

/// Plan up to `settings.max_moves` replica moves for `snapshot`.
pub fn plan(snapshot: &ClusterSnapshot, settings: &PlanSettings) -> MovePlan {
    let mut projection = Projection::new(snapshot);
    let score_before = projection.score();
    let mut moves: Vec<Move> = Vec::new();

    while moves.len() < settings.max_moves {
        match next_move(snapshot, settings, &projection, &moves) {
            Some(mv) => {
                debug!("Planned move {}: {mv}", moves.len() + 1);
                projection.apply(&mv);
                moves.push(mv);
            }
            None => {
                info!("No more moves possible, stopping after {} move(s)", moves.len());
                break;
            }
        }
    }

    let score_after = projection.score();
    let assignments = moves
        .iter()
        .filter_map(|mv| {
            snapshot
                .assignment(mv.partition())
                .map(|replicas| (mv.partition().clone(), replicas.to_vec()))
        })
        .collect();
    MovePlan {
        snapshot_version: snapshot.version(),
        moves,
        assignments,
        score_before,
        score_after,
    }
}

/// Why a candidate replica cannot move to a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    AlreadyMoved,
    Leader,
    Empty,
    NoImprovement,
    OverCapacity,
    DiskHostsPartition,
    BrokerHostsPartition,
    SimilarToCounterMove,
}

/// Running per-disk and per-broker totals with the placements already planned.
struct Projection {
    disk_used: BTreeMap<DiskLocation, u64>,
    disk_capacity: BTreeMap<DiskLocation, Option<u64>>,
    broker_used: BTreeMap<BrokerId, u64>,
    /// Replicas already planned to move, keyed by partition and origin broker.
    moved: HashSet<(TopicPartition, BrokerId)>,
    disk_partitions: HashSet<(DiskLocation, TopicPartition)>,
    broker_partitions: HashSet<(BrokerId, TopicPartition)>,
}

impl Projection {
    fn new(snapshot: &ClusterSnapshot) -> Self {
        let mut projection = Self {
            disk_used: BTreeMap::new(),
            disk_capacity: BTreeMap::new(),
            broker_used: BTreeMap::new(),
            moved: HashSet::new(),
            disk_partitions: HashSet::new(),
            broker_partitions: HashSet::new(),
        };
        for disk in snapshot.disks() {
            projection
                .disk_used
                .insert(disk.location.clone(), disk.used_bytes);
            projection
                .disk_capacity
                .insert(disk.location.clone(), disk.capacity_bytes);
            *projection.broker_used.entry(disk.broker()).or_insert(0) += disk.used_bytes;
            for replica in &disk.replicas {
                projection
                    .disk_partitions
                    .insert((disk.location.clone(), replica.partition.clone()));
                projection
                    .broker_partitions
                    .insert((disk.broker(), replica.partition.clone()));
            }
        }
        // Replica lists also cover copies on disks outside the snapshot.
        for (partition, replicas) in snapshot.assignments() {
            for broker in replicas {
                projection
                    .broker_partitions
                    .insert((*broker, partition.clone()));
            }
        }
        projection
    }

    fn score(&self) -> f64 {
        imbalance_score(self.disk_used.values().copied())
    }

    fn used(&self, location: &DiskLocation) -> u64 {
        self.disk_used.get(location).copied().unwrap_or(0)
    }

    fn broker_used(&self, broker: BrokerId) -> u64 {
        self.broker_used.get(&broker).copied().unwrap_or(0)
    }

    fn has_moved(&self, replica: &PartitionReplica) -> bool {
        self.moved
            .contains(&(replica.partition.clone(), replica.location.broker))
    }

    /// Disk locations ordered most loaded first, lowest identifier on ties.
    fn sources(&self) -> Vec<(DiskLocation, u64)> {
        let mut ranked: Vec<(DiskLocation, u64)> = self
            .disk_used
            .iter()
            .map(|(location, used)| (location.clone(), *used))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    /// Disk locations ordered least loaded first, lowest identifier on ties.
    fn destinations(&self) -> Vec<(DiskLocation, u64)> {
        let mut ranked: Vec<(DiskLocation, u64)> = self
            .disk_used
            .iter()
            .map(|(location, used)| (location.clone(), *used))
            .collect();
        ranked.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    /// Broker gate: moves across brokers need the broker totals to differ by
    /// more than `disk_percentage`; moves within a broker compare the disks.
    fn gate_open(
        &self,
        source: &DiskLocation,
        destination: &DiskLocation,
        disk_percentage: f64,
    ) -> bool {
        if source.broker == destination.broker {
            differs_by_more_than(self.used(source), self.used(destination), disk_percentage)
        } else {
            differs_by_more_than(
                self.broker_used(source.broker),
                self.broker_used(destination.broker),
                disk_percentage,
            )
        }
    }

    fn rejection(
        &self,
        replica: &PartitionReplica,
        destination: &DiskLocation,
        settings: &PlanSettings,
        planned: &[Move],
    ) -> Option<Rejection> {
        let source = &replica.location;
        let size = replica.size_bytes;

        if self.has_moved(replica) {
            return Some(Rejection::AlreadyMoved);
        }
        if replica.is_leader() && !settings.move_leaders {
            return Some(Rejection::Leader);
        }
        if size == 0 {
            return Some(Rejection::Empty);
        }
        // Variance only drops when the destination stays below the source.
        if self.used(destination).saturating_add(size) >= self.used(source) {
            return Some(Rejection::NoImprovement);
        }
        if let Some(Some(capacity)) = self.disk_capacity.get(destination) {
            if self.used(destination).saturating_add(size) > *capacity {
                return Some(Rejection::OverCapacity);
            }
        }
        if self
            .disk_partitions
            .contains(&(destination.clone(), replica.partition.clone()))
        {
            return Some(Rejection::DiskHostsPartition);
        }
        if source.broker != destination.broker
            && self
                .broker_partitions
                .contains(&(destination.broker, replica.partition.clone()))
        {
            return Some(Rejection::BrokerHostsPartition);
        }

        let ratio = settings.similarity_ratio();
        let swaps_back = planned.iter().any(|mv| {
            &mv.source == destination
                && &mv.destination == source
                && size_ratio(mv.size_bytes(), size) > ratio
        });
        if swaps_back {
            return Some(Rejection::SimilarToCounterMove);
        }
        None
    }

    fn build_move(&self, replica: &PartitionReplica, destination: &DiskLocation) -> Move {
        let size = replica.size_bytes;
        let source_used = self.used(&replica.location);
        let destination_used = self.used(destination);
        Move {
            replica: replica.clone(),
            source: replica.location.clone(),
            destination: destination.clone(),
            source_bytes: SizeDelta {
                before: source_used,
                after: source_used - size,
            },
            destination_bytes: SizeDelta {
                before: destination_used,
                after: destination_used + size,
            },
        }
    }

    fn apply(&mut self, mv: &Move) {
        let size = mv.size_bytes();
        if let Some(used) = self.disk_used.get_mut(&mv.source) {
            *used = used.saturating_sub(size);
        }
        if let Some(used) = self.disk_used.get_mut(&mv.destination) {
            *used += size;
        }
        if let Some(used) = self.broker_used.get_mut(&mv.source.broker) {
            *used = used.saturating_sub(size);
        }
        *self.broker_used.entry(mv.destination.broker).or_insert(0) += size;

        self.moved.insert((mv.partition().clone(), mv.source.broker));
        self.disk_partitions
            .insert((mv.destination.clone(), mv.partition().clone()));
        self.broker_partitions
            .insert((mv.destination.broker, mv.partition().clone()));
    }
}

/// `min / max` of two sizes, 1.0 for two zeros.
fn size_ratio(a: u64, b: u64) -> f64 {
    let (larger, smaller) = if a >= b { (a, b) } else { (b, a) };
    if larger == 0 {
        return 1.0;
    }
    smaller as f64 / larger as f64
}

fn next_move(
    snapshot: &ClusterSnapshot,
    settings: &PlanSettings,
    projection: &Projection,
    planned: &[Move],
) -> Option<Move> {
    let destinations = projection.destinations();

    for (source, source_used) in projection.sources() {
        let Some(disk) = snapshot.disk(&source) else {
            continue;
        };
        let candidates: Vec<&PartitionReplica> = disk
            .replicas
            .iter()
            .filter(|r| !projection.has_moved(r))
            .collect();
        if candidates.is_empty() {
            continue;
        }

        for (destination, destination_used) in &destinations {
            if *destination == source {
                continue;
            }
            if *destination_used >= source_used {
                break;
            }
            if !projection.gate_open(&source, destination, settings.disk_percentage) {
                trace!("Usage of {source} and {destination} too similar, skipping pair");
                continue;
            }

            for replica in &candidates {
                match projection.rejection(replica, destination, settings, planned) {
                    Some(reason) => {
                        trace!(
                            "Cannot move {} from {source} to {destination}: {reason:?}",
                            replica.partition
                        );
                    }
                    None => return Some(projection.build_move(replica, destination)),
                }
            }
        }
    }
    None
}
