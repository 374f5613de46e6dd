//! Shell command execution on broker hosts.
//!
//! Every remote query the balancer makes (disk usage, Kafka admin scripts)
//! is a shell command string run through a [`CommandRunner`]. [`SshRunner`]
//! runs it on a broker host, [`LocalRunner`] on this machine.

use crate::{ClusterError, debug, trace};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Captured result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Host the commands run on, used in error messages.
    fn target(&self) -> &str;

    async fn run(&self, command: &str) -> Result<CommandOutput, ClusterError>;

    async fn run_with_input(
        &self,
        command: &str,
        stdin: &[u8],
    ) -> Result<CommandOutput, ClusterError>;

    /// Run `command` and fail unless it exits with status 0.
    async fn run_checked(&self, command: &str) -> Result<CommandOutput, ClusterError> {
        let output = self.run(command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ClusterError::CommandFailed {
                command: command.to_string(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    /// Write `contents` to `path` on the target host.
    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<(), ClusterError> {
        let command = format!("cat > {}", shell_quote(path));
        let output = self.run_with_input(&command, contents).await?;
        if output.success() {
            Ok(())
        } else {
            Err(ClusterError::CommandFailed {
                command,
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@%+".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

async fn spawn(
    mut command: Command,
    target: &str,
    stdin: Option<&[u8]>,
) -> Result<CommandOutput, ClusterError> {
    command
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| ClusterError::from_command_io(e, target))?;

    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input)
                .await
                .map_err(|e| ClusterError::from_command_io(e, target))?;
            // Dropping the pipe closes stdin so the command sees EOF.
        }
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| ClusterError::from_command_io(e, target))?;

    let result = CommandOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    trace!(
        "{target}: exit {:?}, {} bytes stdout, {} bytes stderr",
        result.status,
        result.stdout.len(),
        result.stderr.len()
    );
    Ok(result)
}

/// Runs commands through `sh -c` on this machine.
#[derive(Debug, Clone, Default)]
pub struct LocalRunner;

impl LocalRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(command: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    fn target(&self) -> &str {
        "localhost"
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, ClusterError> {
        debug!("localhost$ {command}");
        spawn(Self::command(command), self.target(), None).await
    }

    async fn run_with_input(
        &self,
        command: &str,
        stdin: &[u8],
    ) -> Result<CommandOutput, ClusterError> {
        debug!("localhost$ {command} (<{} bytes)", stdin.len());
        spawn(Self::command(command), self.target(), Some(stdin)).await
    }
}

/// Runs commands on a remote host through the `ssh` client.
///
/// Authentication is left to the ssh agent and config; `BatchMode` makes a
/// missing key fail instead of prompting.
#[derive(Debug, Clone)]
pub struct SshRunner {
    user: String,
    host: String,
    destination: String,
}

impl SshRunner {
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        let user = user.into();
        let host = host.into();
        let destination = if user.is_empty() {
            host.clone()
        } else {
            format!("{user}@{host}")
        };
        Self {
            user,
            host,
            destination,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// The argument vector handed to the `ssh` executable.
    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            self.destination.clone(),
            command.to_string(),
        ]
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(self.ssh_args(command));
        cmd
    }
}

#[async_trait]
impl CommandRunner for SshRunner {
    fn target(&self) -> &str {
        &self.host
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, ClusterError> {
        debug!("{}$ {command}", self.destination);
        spawn(self.command(command), &self.host, None).await
    }

    async fn run_with_input(
        &self,
        command: &str,
        stdin: &[u8],
    ) -> Result<CommandOutput, ClusterError> {
        debug!("{}$ {command} (<{} bytes)", self.destination, stdin.len());
        spawn(self.command(command), &self.host, Some(stdin)).await
    }
}

/// Opens a [`CommandRunner`] for a broker host.
pub trait HostConnector: Send + Sync {
    fn connect(&self, host: &str) -> Arc<dyn CommandRunner>;
}

/// Connects to every host over ssh as one user.
#[derive(Debug, Clone)]
pub struct SshConnector {
    user: String,
}

impl SshConnector {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

impl HostConnector for SshConnector {
    fn connect(&self, host: &str) -> Arc<dyn CommandRunner> {
        Arc::new(SshRunner::new(self.user.clone(), host))
    }
}

/// Runs every host's commands on this machine.
#[derive(Debug, Clone, Default)]
pub struct LocalConnector;

impl HostConnector for LocalConnector {
    fn connect(&self, _host: &str) -> Arc<dyn CommandRunner> {
        Arc::new(LocalRunner::new())
    }
}
