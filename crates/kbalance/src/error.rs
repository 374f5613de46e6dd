use std::fmt;

/// Error type returned by the balancing pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum BalanceError {
    /// A snapshot or status query could not reach the cluster.
    Connectivity {
        context: String,
        reason: String,
    },
    /// The reassignment mechanism rejected or could not accept a plan.
    Submission {
        context: String,
        reason: String,
    },
    /// Another reassignment is already running.
    ReassignmentBusy {
        reason: String,
    },
    /// Waiting for completion exceeded the deadline. The reassignment may still be running.
    Timeout {
        handle: String,
        waited_secs: u64,
        last_status: String,
    },
    /// The mechanism reported a terminal failure.
    ReassignmentFailed {
        handle: String,
        failures: Vec<String>,
    },
    InvalidSnapshot {
        reason: String,
    },
    InvalidConfig {
        field: String,
        reason: String,
    },
    /// A status query was issued for a dry-run handle.
    NotSubmitted {
        handle: String,
    },
}

/// Failure reported by an external collaborator (metadata client, disk probe,
/// reassignment tool). Components translate it into a [`BalanceError`]
/// according to the phase in which it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    Unreachable {
        target: String,
        reason: String,
    },
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    Malformed {
        context: String,
        reason: String,
    },
}

impl fmt::Display for BalanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceError::Connectivity { context, reason } => {
                write!(f, "Connectivity error in {context}: {reason}")
            }
            BalanceError::Submission { context, reason } => {
                write!(f, "Submission failed in {context}: {reason}")
            }
            BalanceError::ReassignmentBusy { reason } => {
                write!(f, "A reassignment is already in progress: {reason}")
            }
            BalanceError::Timeout {
                handle,
                waited_secs,
                last_status,
            } => {
                write!(
                    f,
                    "Timed out after {waited_secs}s waiting for reassignment {handle} \
                     (last status: {last_status}); poll again before assuming failure"
                )
            }
            BalanceError::ReassignmentFailed { handle, failures } => {
                if failures.is_empty() {
                    write!(f, "Reassignment {handle} failed")
                } else {
                    write!(f, "Reassignment {handle} failed: {}", failures.join("; "))
                }
            }
            BalanceError::InvalidSnapshot { reason } => {
                write!(f, "Invalid cluster snapshot: {reason}")
            }
            BalanceError::InvalidConfig { field, reason } => {
                write!(f, "Invalid configuration for '{field}': {reason}")
            }
            BalanceError::NotSubmitted { handle } => {
                write!(f, "Reassignment {handle} was never submitted (dry run)")
            }
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Unreachable { target, reason } => {
                write!(f, "{target} unreachable: {reason}")
            }
            ClientError::CommandFailed {
                command,
                status,
                stderr,
            } => match status {
                Some(code) => write!(f, "Command '{command}' exited with {code}: {stderr}"),
                None => write!(f, "Command '{command}' terminated by signal: {stderr}"),
            },
            ClientError::Malformed { context, reason } => {
                write!(f, "Malformed response in {context}: {reason}")
            }
        }
    }
}

impl std::error::Error for BalanceError {}
impl std::error::Error for ClientError {}

impl BalanceError {
    pub fn from_connectivity_error(e: impl fmt::Display, context: &str) -> Self {
        BalanceError::Connectivity {
            context: context.to_string(),
            reason: e.to_string(),
        }
    }

    pub fn from_submission_error(e: impl fmt::Display, context: &str) -> Self {
        BalanceError::Submission {
            context: context.to_string(),
            reason: e.to_string(),
        }
    }

    pub fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        BalanceError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the underlying reassignment may still finish and the caller
    /// should poll again instead of treating the run as failed.
    pub fn is_retryable_by_repoll(&self) -> bool {
        matches!(self, BalanceError::Timeout { .. })
    }

    pub fn is_submission_error(&self) -> bool {
        matches!(
            self,
            BalanceError::Submission { .. } | BalanceError::ReassignmentBusy { .. }
        )
    }

    /// Process exit code for the `balancer` binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            BalanceError::InvalidConfig { .. } => 2,
            BalanceError::Connectivity { .. } | BalanceError::InvalidSnapshot { .. } => 3,
            BalanceError::Submission { .. }
            | BalanceError::ReassignmentBusy { .. }
            | BalanceError::NotSubmitted { .. } => 4,
            BalanceError::ReassignmentFailed { .. } => 5,
            BalanceError::Timeout { .. } => 6,
        }
    }
}

impl ClientError {
    pub fn unreachable(target: impl Into<String>, e: impl fmt::Display) -> Self {
        ClientError::Unreachable {
            target: target.into(),
            reason: e.to_string(),
        }
    }

    pub fn malformed(context: &str, reason: impl fmt::Display) -> Self {
        ClientError::Malformed {
            context: context.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn from_io_error(e: std::io::Error, target: &str) -> Self {
        ClientError::Unreachable {
            target: target.to_string(),
            reason: e.to_string(),
        }
    }
}
