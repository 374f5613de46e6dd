use super::{script, verify::parse_verify_output};
use crate::{
    ClusterError,
    command::{CommandRunner, shell_quote},
    debug, info, warn,
};
use async_trait::async_trait;
use chrono::Utc;
use kbalance::{ClientError, ReassignmentRequest, ReassignmentTool, ThrottleConfig, VerifyReport};
use parking_lot::Mutex;
use regex::Regex;
use std::sync::{Arc, LazyLock};

static EXCEPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z0-9_-]+Exception\b").expect("exception pattern"));

const NONE_RUNNING: &str = "No partition reassignments found";
const SOME_RUNNING: &str = "Current partition reassignments";

/// Path of the uploaded request file on the work broker.
pub fn request_file_name() -> String {
    Utc::now()
        .format("/tmp/kafka-reassignment-%Y.%m.%d.%H.%M.%S.json")
        .to_string()
}

/// Parse `kafka-reassign-partitions.sh --list` output.
pub fn parse_list_output(output: &str) -> Result<bool, ClusterError> {
    if output.contains(NONE_RUNNING) {
        Ok(false)
    } else if output.contains(SOME_RUNNING) {
        Ok(true)
    } else {
        Err(ClusterError::unexpected_output(
            "reassignment list",
            format!("neither {NONE_RUNNING:?} nor {SOME_RUNNING:?} in output"),
        ))
    }
}

/// [`ReassignmentTool`] that drives `kafka-reassign-partitions.sh` on a
/// work broker.
///
/// The request is uploaded as a JSON file once; later verifications of the
/// same request reuse that file.
pub struct KafkaReassignTool {
    runner: Arc<dyn CommandRunner>,
    kafka_bin: String,
    bootstrap: String,
    zookeeper: Option<String>,
    uploaded: Mutex<Option<(ReassignmentRequest, String)>>,
}

impl KafkaReassignTool {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        kafka_bin: impl Into<String>,
        bootstrap: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            kafka_bin: kafka_bin.into(),
            bootstrap: bootstrap.into(),
            zookeeper: None,
            uploaded: Mutex::new(None),
        }
    }

    /// Also pass `--zookeeper`, for Kafka releases that still require it.
    pub fn with_zookeeper(mut self, zookeeper: impl Into<String>) -> Self {
        self.zookeeper = Some(zookeeper.into());
        self
    }

    fn base_command(&self) -> String {
        let mut command = format!(
            "{} --bootstrap-server {}",
            script(&self.kafka_bin, "kafka-reassign-partitions.sh"),
            shell_quote(&self.bootstrap)
        );
        if let Some(zookeeper) = &self.zookeeper {
            command.push_str(" --zookeeper ");
            command.push_str(&shell_quote(zookeeper));
        }
        command
    }

    /// Command line for `--execute` of the file at `path`.
    pub fn execute_command(&self, path: &str, throttle: &ThrottleConfig) -> String {
        let mut command = format!(
            "{} --reassignment-json-file {}",
            self.base_command(),
            shell_quote(path)
        );
        for arg in throttle.to_args() {
            command.push(' ');
            command.push_str(&arg);
        }
        command.push_str(" --execute");
        command
    }

    pub fn verify_command(&self, path: &str) -> String {
        format!(
            "{} --reassignment-json-file {} --verify",
            self.base_command(),
            shell_quote(path)
        )
    }

    pub fn list_command(&self) -> String {
        format!("{} --list", self.base_command())
    }

    async fn upload(&self, request: &ReassignmentRequest) -> Result<String, ClusterError> {
        let cached = self
            .uploaded
            .lock()
            .as_ref()
            .filter(|(uploaded, _)| uploaded == request)
            .map(|(_, path)| path.clone());
        if let Some(path) = cached {
            return Ok(path);
        }

        let json = serde_json::to_vec(request)
            .map_err(|e| ClusterError::unexpected_output("reassignment request encoding", e))?;
        let path = request_file_name();
        self.runner.write_file(&path, &json).await?;
        info!("Added {path} to {} for execution", self.runner.target());

        *self.uploaded.lock() = Some((request.clone(), path.clone()));
        Ok(path)
    }
}

#[async_trait]
impl ReassignmentTool for KafkaReassignTool {
    async fn in_progress(&self) -> Result<bool, ClientError> {
        let output = self.runner.run_checked(&self.list_command()).await?;
        Ok(parse_list_output(&output.stdout)?)
    }

    async fn execute(
        &self,
        request: &ReassignmentRequest,
        throttle: &ThrottleConfig,
    ) -> Result<(), ClientError> {
        let path = self.upload(request).await?;
        info!("Submitting rebalance");
        let output = self
            .runner
            .run_checked(&self.execute_command(&path, throttle))
            .await?;
        debug!("Execute output: {}", output.stdout.trim());

        if EXCEPTION.is_match(&output.stdout) || EXCEPTION.is_match(&output.stderr) {
            warn!(
                "Exception while starting partition reassignment. Some partitions may not get reassigned."
            );
        }
        Ok(())
    }

    async fn verify(&self, request: &ReassignmentRequest) -> Result<VerifyReport, ClientError> {
        let path = self.upload(request).await?;
        let command = self.verify_command(&path);
        let output = self.runner.run(&command).await?;
        // Verify exits non-zero while partitions are failing; only empty
        // output means the tool itself did not run.
        if !output.success() && output.stdout.trim().is_empty() {
            return Err(ClusterError::CommandFailed {
                command,
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            }
            .into());
        }
        debug!("Verify output: {}", output.stdout.trim());
        Ok(parse_verify_output(
            &output.stdout,
            &request.topic_partitions(),
        ))
    }
}
