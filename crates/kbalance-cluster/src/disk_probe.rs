//! Disk usage probe that runs `df` and `du` on broker hosts.

use crate::{
    ClusterError,
    command::{HostConnector, shell_quote},
    info,
};
use async_trait::async_trait;
use kbalance::{BrokerInfo, ClientError, DiskId, DiskUsage, DiskUsageProbe};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_DISK_GLOB: &str = "/kafka/*";

/// Local filesystems with byte-sized totals.
pub const DF_COMMAND: &str = "df -l --block-size=1 --output=target,size,used";

/// Size of every top-level directory under a mount point.
pub fn du_command(disk: &DiskId) -> String {
    format!(
        "find {} -mindepth 1 -maxdepth 1 -type d -exec du -x -s --block-size=1 {{}} \\;",
        shell_quote(&disk.as_dir_prefix())
    )
}

/// Translate a shell glob (`*`, `?`) into an anchored regex. `*` and `?`
/// never match `/`.
pub fn glob_to_regex(glob: &str) -> Result<Regex, ClusterError> {
    let mut pattern = String::from("^");
    for c in glob.trim_end_matches('/').chars() {
        match c {
            '*' => pattern.push_str("[^/]*"),
            '?' => pattern.push_str("[^/]"),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push_str("/?$");
    Regex::new(&pattern).map_err(|e| ClusterError::from_parse_error(e, "disk glob"))
}

/// Parse `df --output=target,size,used` output, keeping mounts that match
/// `mounts`. The first line is a header.
pub fn parse_df(output: &str, mounts: &Regex) -> Result<Vec<DiskUsage>, ClusterError> {
    let mut disks = Vec::new();
    for line in output.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 3 {
            return Err(ClusterError::unexpected_output(
                "df",
                format!("expected mount, size and used columns in {line:?}"),
            ));
        }
        let target = fields[..fields.len() - 2].join(" ");
        if !mounts.is_match(&target) {
            continue;
        }
        let size = parse_bytes(fields[fields.len() - 2], "df", line)?;
        let used = parse_bytes(fields[fields.len() - 1], "df", line)?;
        disks.push(DiskUsage {
            mount_point: DiskId::new(target),
            capacity_bytes: Some(size),
            used_bytes: used,
        });
    }
    Ok(disks)
}

/// Parse `du -s` lines for the directories under `disk`, keyed by the
/// directory name relative to the mount point.
pub fn parse_du(output: &str, disk: &DiskId) -> Result<BTreeMap<String, u64>, ClusterError> {
    let prefix = disk.as_dir_prefix();
    let mut sizes = BTreeMap::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((size, path)) = line.split_once(char::is_whitespace) else {
            return Err(ClusterError::unexpected_output(
                "du",
                format!("expected size and path in {line:?}"),
            ));
        };
        let path = path.trim();
        if DiskId::new(path) == *disk {
            continue;
        }
        let Some(name) = path.strip_prefix(&prefix) else {
            return Err(ClusterError::unexpected_output(
                "du",
                format!("{path:?} is not under {prefix:?}"),
            ));
        };
        sizes.insert(
            name.trim_end_matches('/').to_string(),
            parse_bytes(size, "du", line)?,
        );
    }
    Ok(sizes)
}

fn parse_bytes(field: &str, context: &str, line: &str) -> Result<u64, ClusterError> {
    field.parse().map_err(|_| {
        ClusterError::unexpected_output(context, format!("{field:?} is not a byte count in {line:?}"))
    })
}

/// [`DiskUsageProbe`] that shells into each broker host.
pub struct RemoteDiskProbe {
    connector: Arc<dyn HostConnector>,
    disk_glob: String,
    mounts: Regex,
}

impl RemoteDiskProbe {
    pub fn new(
        connector: Arc<dyn HostConnector>,
        disk_glob: impl Into<String>,
    ) -> Result<Self, ClusterError> {
        let disk_glob = disk_glob.into();
        let mounts = glob_to_regex(&disk_glob)?;
        Ok(Self {
            connector,
            disk_glob,
            mounts,
        })
    }

    pub fn disk_glob(&self) -> &str {
        &self.disk_glob
    }
}

#[async_trait]
impl DiskUsageProbe for RemoteDiskProbe {
    async fn disk_usage(&self, broker: &BrokerInfo) -> Result<Vec<DiskUsage>, ClientError> {
        info!("Fetching disk usage on {}", broker.host);
        let runner = self.connector.connect(&broker.host);
        let output = runner.run_checked(DF_COMMAND).await?;
        let disks = parse_df(&output.stdout, &self.mounts)?;
        if disks.is_empty() {
            return Err(ClusterError::unexpected_output(
                "df",
                format!("no mounts on {} match {}", broker.host, self.disk_glob),
            )
            .into());
        }
        Ok(disks)
    }

    async fn directory_sizes(
        &self,
        broker: &BrokerInfo,
        disk: &DiskId,
    ) -> Result<BTreeMap<String, u64>, ClientError> {
        info!("Fetching partition usage in {}:{}", broker.host, disk);
        let runner = self.connector.connect(&broker.host);
        let output = runner.run_checked(&du_command(disk)).await?;
        Ok(parse_du(&output.stdout, disk)?)
    }
}
