use super::script;
use crate::{
    ClusterError,
    command::{CommandRunner, shell_quote},
    debug, info,
};
use async_trait::async_trait;
use kbalance::{BrokerId, BrokerInfo, ClientError, MetadataClient, PartitionInfo, TopicPartition};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

static BROKER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+):(\d+) \(id: (\d+) rack: [^)]*\) ->").expect("broker line pattern")
});

static PARTITION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"Topic:\s*(\S+)\s+(?:TopicId:\s*\S+\s+)?Partition:\s*(\d+)\s+Leader:\s*(\S+)\s+Replicas:\s*([\d,]*)",
    )
    .expect("partition line pattern")
});

/// Parse `kafka-broker-api-versions.sh` output into the live brokers,
/// ordered by id.
pub fn parse_broker_list(output: &str) -> Result<Vec<BrokerInfo>, ClusterError> {
    let mut brokers = BTreeMap::new();
    for line in output.lines() {
        let Some(caps) = BROKER_LINE.captures(line.trim()) else {
            continue;
        };
        let port: u16 = caps[2].parse().map_err(|_| {
            ClusterError::unexpected_output("broker list", format!("bad port in {line:?}"))
        })?;
        let id: u32 = caps[3].parse().map_err(|_| {
            ClusterError::unexpected_output("broker list", format!("bad broker id in {line:?}"))
        })?;
        brokers.insert(id, BrokerInfo::new(id, &caps[1], port));
    }
    if brokers.is_empty() {
        return Err(ClusterError::unexpected_output(
            "broker list",
            "no brokers in kafka-broker-api-versions output",
        ));
    }
    Ok(brokers.into_values().collect())
}

/// Parse `kafka-topics.sh --describe` output. Topics prefixed with `__` are
/// internal; a partition without a leader carries an error.
pub fn parse_topic_description(output: &str) -> Result<Vec<PartitionInfo>, ClusterError> {
    let mut partitions = Vec::new();
    for line in output.lines() {
        let Some(caps) = PARTITION_LINE.captures(line) else {
            continue;
        };
        let topic = &caps[1];
        let partition: u32 = caps[2].parse().map_err(|_| {
            ClusterError::unexpected_output("topic description", format!("bad partition in {line:?}"))
        })?;
        let replicas = caps[4]
            .split(',')
            .filter(|id| !id.is_empty())
            .map(|id| id.parse::<u32>().map(BrokerId))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| {
                ClusterError::unexpected_output(
                    "topic description",
                    format!("bad replica list in {line:?}"),
                )
            })?;
        let leader = caps[3].parse::<u32>().ok().map(BrokerId);

        let mut info = PartitionInfo::new(TopicPartition::new(topic, partition), leader, replicas);
        info.internal = topic.starts_with("__");
        if leader.is_none() {
            info.error = Some(format!("no leader (reported {})", &caps[3]));
        }
        partitions.push(info);
    }
    Ok(partitions)
}

/// [`MetadataClient`] that runs the Kafka admin scripts on one host.
pub struct KafkaCliMetadataClient {
    runner: Arc<dyn CommandRunner>,
    kafka_bin: String,
    bootstrap: String,
}

impl KafkaCliMetadataClient {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        kafka_bin: impl Into<String>,
        bootstrap: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            kafka_bin: kafka_bin.into(),
            bootstrap: bootstrap.into(),
        }
    }

    fn command(&self, name: &str, extra: &str) -> String {
        format!(
            "{} --bootstrap-server {}{extra}",
            script(&self.kafka_bin, name),
            shell_quote(&self.bootstrap)
        )
    }
}

#[async_trait]
impl MetadataClient for KafkaCliMetadataClient {
    async fn describe_brokers(&self) -> Result<Vec<BrokerInfo>, ClientError> {
        info!("Fetching broker info");
        let output = self
            .runner
            .run_checked(&self.command("kafka-broker-api-versions.sh", ""))
            .await?;
        let brokers = parse_broker_list(&output.stdout)?;
        debug!("Brokers: {brokers:?}");
        Ok(brokers)
    }

    async fn describe_partitions(&self) -> Result<Vec<PartitionInfo>, ClientError> {
        info!("Fetching topics");
        let output = self
            .runner
            .run_checked(&self.command("kafka-topics.sh", " --describe"))
            .await?;
        Ok(parse_topic_description(&output.stdout)?)
    }
}
