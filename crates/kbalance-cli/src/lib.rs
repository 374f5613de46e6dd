//! Command-line front end of the disk balancer.
//!
//! Turns `balancer` arguments into a [`BalanceConfig`] and the collaborators
//! a [`BalanceLoop`] runs against: live Kafka tooling over ssh, or a cluster
//! manifest for offline planning.

use clap::{ArgAction, Parser};
use kbalance::{
    BalanceConfig, BalanceError, BalanceLoop, BalanceOutcome, DiskUsageProbe, MetadataClient,
    MonitorSettings, PlanSettings, ReassignmentTool,
};
use kbalance_cluster::{
    KafkaCliMetadataClient, KafkaReassignTool, ManifestDiskProbe, ManifestLoader,
    ManifestMetadataClient, OfflineReassignTool, RemoteDiskProbe, SshConnector, SshRunner,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "balancer",
    version,
    about = "Balance disk usage across the brokers and disks of a Kafka cluster"
)]
pub struct Args {
    /// Maximum number of replica moves to plan
    #[arg(short = 'i', long, default_value_t = 10)]
    pub iterations: usize,

    /// Replicas within this size percentage of each other are not swapped back and forth
    #[arg(short = 'p', long, default_value_t = 90.0)]
    pub partition_percentage: f64,

    /// Minimum usage difference between brokers (or disks of a broker), in percent
    #[arg(short = 'P', long, default_value_t = 10.0)]
    pub disk_percentage: f64,

    /// Plan and print the reassignment without submitting it
    #[arg(short = 'd', long)]
    pub dry_run: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Inter-broker replication throttle in bytes/sec
    #[arg(long, value_name = "BYTES_PER_SEC", default_value_t = 20_000_000)]
    pub net_throttle: u64,

    /// Intra-broker log dir move throttle in bytes/sec
    #[arg(long, value_name = "BYTES_PER_SEC", default_value_t = 200_000_000)]
    pub disk_throttle: u64,

    /// Wait for the reassignment to finish
    #[arg(short = 'w', long)]
    pub wait: bool,

    /// Seconds between status checks while waiting
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub poll_interval: u64,

    /// Give up waiting after this many seconds
    #[arg(long, value_name = "SECS", default_value_t = 21_600)]
    pub wait_timeout: u64,

    /// Consecutive failed checks before a reassignment counts as failed
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub failure_confirmations: u32,

    /// Allow moving leader replicas
    #[arg(long)]
    pub move_leaders: bool,

    /// Plan from a YAML/JSON cluster manifest instead of querying the cluster
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Mount points holding Kafka log dirs
    #[arg(long, default_value = kbalance_cluster::disk_probe::DEFAULT_DISK_GLOB)]
    pub disk_glob: String,

    /// User for ssh connections to broker hosts
    #[arg(long, default_value = "root")]
    pub ssh_user: String,

    /// Directory holding the Kafka admin scripts on broker hosts
    #[arg(long, value_name = "DIR", default_value = kbalance_cluster::kafka::DEFAULT_KAFKA_BIN)]
    pub kafka_bin: String,

    /// Metadata store (ZooKeeper) address, e.g. zk-1:2181
    #[arg(required_unless_present = "manifest")]
    pub metadata_store_address: Option<String>,

    /// Kafka bootstrap address, e.g. kafka-1:9092
    #[arg(required_unless_present = "manifest")]
    pub bootstrap_address: Option<String>,
}

impl Args {
    pub fn to_config(&self) -> BalanceConfig {
        BalanceConfig {
            plan: PlanSettings {
                max_moves: self.iterations,
                partition_percentage: self.partition_percentage,
                disk_percentage: self.disk_percentage,
                move_leaders: self.move_leaders,
            },
            net_throttle: self.net_throttle,
            disk_throttle: self.disk_throttle,
            monitor: MonitorSettings {
                poll_interval: Duration::from_secs(self.poll_interval),
                timeout: Duration::from_secs(self.wait_timeout),
                failure_confirmations: self.failure_confirmations,
            },
            dry_run: self.dry_run,
            wait: self.wait,
        }
    }
}

/// The three collaborators a balancing pass runs against.
pub struct Collaborators {
    pub metadata: Arc<dyn MetadataClient>,
    pub probe: Arc<dyn DiskUsageProbe>,
    pub tool: Arc<dyn ReassignmentTool>,
}

/// Host part of a `host:port` address.
pub fn host_of(address: &str) -> &str {
    match address.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => {
            host.trim_start_matches('[').trim_end_matches(']')
        }
        _ => address,
    }
}

impl Collaborators {
    pub fn from_args(args: &Args) -> Result<Self, BalanceError> {
        if let Some(path) = &args.manifest {
            let manifest = ManifestLoader::from_path(path)
                .map_err(|e| BalanceError::invalid_config("manifest", e.to_string()))?;
            let manifest = Arc::new(manifest);
            tracing::info!(path = %path.display(), "Planning from cluster manifest");
            return Ok(Self {
                metadata: Arc::new(ManifestMetadataClient::new(manifest.clone())),
                probe: Arc::new(ManifestDiskProbe::new(manifest)),
                tool: Arc::new(OfflineReassignTool),
            });
        }

        let bootstrap = args
            .bootstrap_address
            .clone()
            .filter(|address| !address.is_empty())
            .ok_or_else(|| BalanceError::invalid_config("bootstrap_address", "required"))?;
        let work_host = host_of(&bootstrap).to_string();
        let runner = Arc::new(SshRunner::new(args.ssh_user.clone(), work_host));

        let probe = RemoteDiskProbe::new(
            Arc::new(SshConnector::new(args.ssh_user.clone())),
            args.disk_glob.clone(),
        )
        .map_err(|e| BalanceError::invalid_config("disk_glob", e.to_string()))?;

        let mut tool = KafkaReassignTool::new(runner.clone(), args.kafka_bin.clone(), &bootstrap);
        if let Some(zookeeper) = args
            .metadata_store_address
            .as_ref()
            .filter(|address| !address.is_empty())
        {
            tool = tool.with_zookeeper(zookeeper.clone());
        }

        Ok(Self {
            metadata: Arc::new(KafkaCliMetadataClient::new(
                runner,
                args.kafka_bin.clone(),
                bootstrap,
            )),
            probe: Arc::new(probe),
            tool: Arc::new(tool),
        })
    }
}

/// Build the collaborators and run one balancing pass.
pub async fn run(args: &Args) -> Result<BalanceOutcome, BalanceError> {
    let config = args.to_config();
    config.validate()?;
    let collaborators = Collaborators::from_args(args)?;
    let balance = BalanceLoop::new(
        collaborators.metadata,
        collaborators.probe,
        collaborators.tool,
        config,
    );
    balance.run().await
}

/// One-line description of how a pass ended.
pub fn summarize(outcome: &BalanceOutcome) -> String {
    match outcome {
        BalanceOutcome::NothingToDo { snapshot_version } => {
            format!("Cluster is balanced (snapshot {snapshot_version}); nothing to do")
        }
        BalanceOutcome::DryRun { plan, .. } => {
            format!("Dry run: {} move(s) planned, nothing submitted", plan.len())
        }
        BalanceOutcome::Submitted { handle, status } => match status {
            Some(status) => format!("Reassignment {} submitted, currently {status}", handle.id()),
            None => format!("Reassignment {} submitted", handle.id()),
        },
        BalanceOutcome::Completed { handle } => {
            format!("Reassignment {} completed", handle.id())
        }
    }
}
