//! Reassignment request format accepted by the external mechanism.
//!
//! ```json
//! {"version":1,"partitions":[{"topic":"logs","partition":0,"replicas":[1,3,2],"log_dirs":["any","/kafka/1","any"]}]}
//! ```

use crate::{error::BalanceError, planner::MovePlan, types::TopicPartition};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

pub const REQUEST_VERSION: u32 = 1;
/// Log dir placeholder that lets the broker choose the disk.
pub const ANY_LOG_DIR: &str = "any";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionReassignment {
    pub topic: String,
    pub partition: u32,
    pub replicas: Vec<u32>,
    pub log_dirs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentRequest {
    pub version: u32,
    pub partitions: Vec<PartitionReassignment>,
}

impl PartitionReassignment {
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }
}

impl ReassignmentRequest {
    /// Serialise `plan` against the replica lists it was planned from.
    ///
    /// Each partition starts from its current replica list with every log dir
    /// set to [`ANY_LOG_DIR`]; each move then rewrites its replica slot to the
    /// destination broker and pins that slot's log dir to the destination disk.
    /// The whole request is rejected if any partition would end up listing a
    /// broker twice, so a plan is never submitted in part.
    pub fn from_plan(plan: &MovePlan) -> Result<Self, BalanceError> {
        if plan.is_empty() {
            return Err(BalanceError::Submission {
                context: "reassignment request".to_string(),
                reason: "plan contains no moves".to_string(),
            });
        }

        let mut entries: BTreeMap<TopicPartition, PartitionReassignment> = BTreeMap::new();
        for mv in plan {
            let partition = mv.partition();
            let entry = match entries.entry(partition.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(slot) => {
                    let current = plan.assignment(partition).ok_or_else(|| {
                        malformed(format!("no replica assignment known for {partition}"))
                    })?;
                    slot.insert(PartitionReassignment {
                        topic: partition.topic.clone(),
                        partition: partition.partition,
                        replicas: current.iter().map(|b| b.0).collect(),
                        log_dirs: vec![ANY_LOG_DIR.to_string(); current.len()],
                    })
                }
            };

            let slot = mv.replica.replica_index;
            if slot >= entry.replicas.len() {
                return Err(malformed(format!(
                    "replica slot {slot} out of range for {partition}"
                )));
            }
            entry.replicas[slot] = mv.destination.broker.0;
            entry.log_dirs[slot] = mv.destination.disk.as_str().to_string();
        }

        for entry in entries.values() {
            let mut seen = HashSet::new();
            if !entry.replicas.iter().all(|b| seen.insert(*b)) {
                return Err(malformed(format!(
                    "{}-{} would list a broker twice: {:?}",
                    entry.topic, entry.partition, entry.replicas
                )));
            }
        }

        Ok(Self {
            version: REQUEST_VERSION,
            partitions: entries.into_values().collect(),
        })
    }

    pub fn to_json(&self) -> Result<String, BalanceError> {
        serde_json::to_string(self)
            .map_err(|e| BalanceError::from_submission_error(e, "reassignment request encoding"))
    }

    pub fn to_json_pretty(&self) -> Result<String, BalanceError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BalanceError::from_submission_error(e, "reassignment request encoding"))
    }

    pub fn topic_partitions(&self) -> Vec<TopicPartition> {
        self.partitions
            .iter()
            .map(PartitionReassignment::topic_partition)
            .collect()
    }
}

fn malformed(reason: String) -> BalanceError {
    BalanceError::Submission {
        context: "reassignment request".to_string(),
        reason,
    }
}
