//! SSH command runner
//!
//! Resolves lab host names to SSH settings. Settings priority:
//! password > configured key > default identities.
//! `localhost` runs through the local shell.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use lab_ssh_executor::{CommandOutput, SshClient, SshConfig, SshError};

use crate::capability::CommandRunner;
use crate::config::{HostConfig, LabConfig};
use crate::Result;

/// User for hosts that have no configuration entry
const DEFAULT_USER: &str = "student";

/// Runs commands on lab hosts
#[derive(Debug, Clone)]
pub struct SshCommandRunner {
    /// Host name -> host configuration
    hosts: HashMap<String, HostConfig>,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl SshCommandRunner {
    pub fn new(hosts: HashMap<String, HostConfig>) -> Self {
        Self {
            hosts,
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(120),
        }
    }

    /// Runner for the hosts and timeouts of a lab configuration
    pub fn from_config(config: &LabConfig) -> Self {
        Self::new(config.hosts.clone())
            .with_connect_timeout(Duration::from_secs(config.timeouts.connect))
            .with_command_timeout(Duration::from_secs(config.timeouts.command))
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// SSH settings for a host name
    pub fn resolve_ssh_config(&self, host: &str) -> SshConfig {
        let config = match self.hosts.get(host) {
            Some(HostConfig {
                address,
                user,
                password: Some(password),
                port,
                ..
            }) => SshConfig::with_password(address, user, password).port(*port),
            Some(HostConfig {
                address,
                user,
                key_path: Some(key_path),
                port,
                ..
            }) => SshConfig::with_key(address, user, key_path).port(*port),
            Some(HostConfig {
                address,
                user,
                port,
                ..
            }) => SshConfig::with_default_key(address, user).port(*port),
            None => {
                debug!("no configuration for host {}, using defaults", host);
                SshConfig::with_default_key(host, DEFAULT_USER)
            }
        };

        config
            .connect_timeout(self.connect_timeout)
            .command_timeout(self.command_timeout)
    }

    async fn run_local(&self, command: &str) -> Result<CommandOutput> {
        debug!("localhost: {}", command);

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = timeout(self.command_timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                SshError::TimeoutError(format!(
                    "localhost after {}s: {}",
                    self.command_timeout.as_secs(),
                    command
                ))
            })??;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code(),
        })
    }
}

#[async_trait]
impl CommandRunner for SshCommandRunner {
    async fn run(&self, host: &str, command: &str) -> Result<CommandOutput> {
        if host == "localhost" {
            return self.run_local(command).await;
        }

        let client = SshClient::new(self.resolve_ssh_config(host));
        Ok(client.execute(command).await?)
    }

    async fn ping(&self, host: &str) -> Result<()> {
        if host == "localhost" {
            return Ok(());
        }
        let client = SshClient::new(self.resolve_ssh_config(host));
        Ok(client.ping().await?)
    }
}
