//! Adapters over the Kafka command-line tools.
//!
//! The tools run on a broker host through a [`CommandRunner`](crate::command::CommandRunner);
//! their text output is parsed here.

pub mod metadata;
pub mod reassign;
pub mod verify;

pub use metadata::{KafkaCliMetadataClient, parse_broker_list, parse_topic_description};
pub use reassign::KafkaReassignTool;
pub use verify::parse_verify_output;

pub const DEFAULT_KAFKA_BIN: &str = "/opt/kafka/bin";

pub(crate) fn script(kafka_bin: &str, name: &str) -> String {
    format!("{}/{name}", kafka_bin.trim_end_matches('/'))
}
