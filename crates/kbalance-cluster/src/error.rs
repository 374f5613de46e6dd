//! Error types for cluster collaborators.

use kbalance::ClientError;
use std::fmt;

/// Main error type for manifest, command and output-parsing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterError {
    BrokerNotFound {
        broker_id: u32,
    },
    TopicNotFound {
        topic: String,
    },
    PartitionNotFound {
        topic: String,
        partition_id: u32,
    },
    /// Invalid manifest structure or data.
    InvalidManifest {
        context: String,
        reason: String,
    },
    /// Manifest file I/O error.
    ManifestIo {
        context: String,
        reason: String,
    },
    /// A command could not be started or its pipes failed.
    CommandIo {
        target: String,
        reason: String,
    },
    /// A command ran but exited unsuccessfully.
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    /// Command output did not have the expected shape.
    UnexpectedOutput {
        context: String,
        reason: String,
    },
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterError::BrokerNotFound { broker_id } => {
                write!(f, "Broker with ID {broker_id} not found")
            }
            ClusterError::TopicNotFound { topic } => {
                write!(f, "Topic '{topic}' not found")
            }
            ClusterError::PartitionNotFound { topic, partition_id } => {
                write!(f, "Partition {partition_id} not found for topic '{topic}'")
            }
            ClusterError::InvalidManifest { context, reason } => {
                write!(f, "Invalid manifest in {context}: {reason}")
            }
            ClusterError::ManifestIo { context, reason } => {
                write!(f, "Manifest I/O error in {context}: {reason}")
            }
            ClusterError::CommandIo { target, reason } => {
                write!(f, "Could not run command on {target}: {reason}")
            }
            ClusterError::CommandFailed {
                command,
                status,
                stderr,
            } => match status {
                Some(code) => write!(f, "Command '{command}' exited with {code}: {stderr}"),
                None => write!(f, "Command '{command}' terminated by signal: {stderr}"),
            },
            ClusterError::UnexpectedOutput { context, reason } => {
                write!(f, "Unexpected output from {context}: {reason}")
            }
        }
    }
}

impl std::error::Error for ClusterError {}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ClusterError::BrokerNotFound { .. }
                | ClusterError::TopicNotFound { .. }
                | ClusterError::PartitionNotFound { .. }
        )
    }

    /// Errors caused by bad input rather than an unreachable host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ClusterError::BrokerNotFound { .. }
                | ClusterError::TopicNotFound { .. }
                | ClusterError::PartitionNotFound { .. }
                | ClusterError::InvalidManifest { .. }
        )
    }

    pub fn from_io_error(e: std::io::Error, context: &str) -> Self {
        ClusterError::ManifestIo {
            context: context.to_string(),
            reason: e.to_string(),
        }
    }

    pub fn from_parse_error(e: impl fmt::Display, context: &str) -> Self {
        ClusterError::InvalidManifest {
            context: context.to_string(),
            reason: e.to_string(),
        }
    }

    pub fn from_command_io(e: std::io::Error, target: &str) -> Self {
        ClusterError::CommandIo {
            target: target.to_string(),
            reason: e.to_string(),
        }
    }

    pub fn unexpected_output(context: &str, reason: impl fmt::Display) -> Self {
        ClusterError::UnexpectedOutput {
            context: context.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<ClusterError> for ClientError {
    fn from(error: ClusterError) -> Self {
        match error {
            ClusterError::CommandIo { target, reason } => ClientError::Unreachable { target, reason },
            ClusterError::ManifestIo { context, reason } => ClientError::Unreachable {
                target: context,
                reason,
            },
            ClusterError::CommandFailed {
                command,
                status,
                stderr,
            } => ClientError::CommandFailed {
                command,
                status,
                stderr,
            },
            ClusterError::UnexpectedOutput { context, reason }
            | ClusterError::InvalidManifest { context, reason } => {
                ClientError::Malformed { context, reason }
            }
            other => ClientError::malformed("cluster manifest", other),
        }
    }
}
