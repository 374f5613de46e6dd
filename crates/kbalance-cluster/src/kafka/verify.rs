//! Interpretation of `kafka-reassign-partitions.sh --verify` output.
//!
//! The tool prints one line per partition (and per replica for log dir
//! moves) in a format that changed across Kafka releases:
//!
//! ```text
//! Reassignment of partition orders-0 is complete.
//! Reassignment of partition [orders,1] is still in progress
//! Reassignment of replica orders-2-3 is still in progress.
//! ERROR: Assigned replicas (1,2) don't match the list of replicas for reassignment (1,3) for partition [orders,2]
//! ```

use kbalance::{PartitionProgress, TopicPartition, VerifyReport};
use regex::Regex;

fn line_progress(line: &str) -> Option<PartitionProgress> {
    let lower = line.to_lowercase();
    if lower.contains("in progress") {
        Some(PartitionProgress::InProgress)
    } else if lower.contains("failed") || lower.starts_with("error") {
        Some(PartitionProgress::Failed(line.trim().to_string()))
    } else if lower.contains("complete") {
        Some(PartitionProgress::Completed)
    } else {
        None
    }
}

fn rank(progress: &PartitionProgress) -> u8 {
    match progress {
        PartitionProgress::Completed => 0,
        PartitionProgress::Failed(_) => 1,
        PartitionProgress::InProgress => 2,
    }
}

/// Keep the more pressing of two observations: in progress over failed
/// over completed. The first failure detail wins among failures.
fn merge(current: Option<PartitionProgress>, next: PartitionProgress) -> PartitionProgress {
    match current {
        Some(current) if rank(&current) >= rank(&next) => current,
        _ => next,
    }
}

fn partition_pattern(partition: &TopicPartition) -> Regex {
    let topic = regex::escape(&partition.topic);
    let id = partition.partition;
    let pattern = format!(
        r"(?:^|[\s:\[]){topic}-{id}(?:-\d+)?(?:$|[\s:,.\]])|\[{topic},{id}\]|topic='{topic}',\s*partition={id}\b"
    );
    Regex::new(&pattern).expect("escaped topic name forms a valid pattern")
}

/// Build a [`VerifyReport`] for `partitions` from verify output.
///
/// Partitions that no status line names take the combined status of the
/// status lines naming no requested partition, and count as completed when
/// there are none.
pub fn parse_verify_output(output: &str, partitions: &[TopicPartition]) -> VerifyReport {
    let patterns: Vec<(&TopicPartition, Regex)> = partitions
        .iter()
        .map(|partition| (partition, partition_pattern(partition)))
        .collect();

    let mut report = VerifyReport::default();
    let mut unattributed: Option<PartitionProgress> = None;

    for line in output.lines() {
        let Some(progress) = line_progress(line) else {
            continue;
        };
        let mut attributed = false;
        for (partition, pattern) in &patterns {
            if pattern.is_match(line) {
                attributed = true;
                let current = report.partitions.remove(*partition);
                report
                    .partitions
                    .insert((*partition).clone(), merge(current, progress.clone()));
            }
        }
        if !attributed {
            unattributed = Some(merge(unattributed, progress));
        }
    }

    let fallback = unattributed.unwrap_or(PartitionProgress::Completed);
    for partition in partitions {
        report
            .partitions
            .entry(partition.clone())
            .or_insert_with(|| fallback.clone());
    }
    report
}
