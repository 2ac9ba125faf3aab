//! SSH client
//!
//! Uses the system ssh/sshpass binaries.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::config::{AuthMethod, SshConfig};
use crate::error::{Result, SshError};

/// Exit status ssh itself uses for connection and authentication problems
const SSH_ERROR_EXIT: i32 = 255;

/// Command output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output, trimmed
    pub stdout: String,
    /// Standard error, trimmed
    pub stderr: String,
    /// Exit code; `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Whether the command exited with status 0
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout and stderr joined by a newline
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// SSH client bound to one host
#[derive(Debug, Clone)]
pub struct SshClient {
    config: SshConfig,
}

impl SshClient {
    /// Create a client; no connection is made until a command runs
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Check that the host accepts a login and runs a trivial command
    pub async fn ping(&self) -> Result<()> {
        debug!("checking SSH reachability of {}", self.config.destination());

        let output = self.execute("echo connected").await?;
        if output.stdout.trim() != "connected" {
            return Err(SshError::ConnectionError(format!(
                "{}: unexpected reply: {}",
                self.config.address(),
                output.combined_output()
            )));
        }
        Ok(())
    }

    /// Run a command and capture its output
    pub async fn execute(&self, command: &str) -> Result<CommandOutput> {
        debug!("{}: {}", self.config.destination(), command);

        timeout(self.config.command_timeout, self.execute_internal(command))
            .await
            .map_err(|_| {
                SshError::TimeoutError(format!(
                    "{} after {}s: {}",
                    self.config.host,
                    self.config.command_timeout.as_secs(),
                    command
                ))
            })?
    }

    async fn execute_internal(&self, command: &str) -> Result<CommandOutput> {
        let mut cmd = match &self.config.auth {
            AuthMethod::Password(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-p").arg(password);
                cmd.arg("ssh");
                cmd
            }
            AuthMethod::Key { key_path } => {
                let mut cmd = Command::new("ssh");
                cmd.arg("-i").arg(expand_path(key_path));
                cmd.arg("-o").arg("BatchMode=yes");
                cmd
            }
            AuthMethod::DefaultKey => {
                let mut cmd = Command::new("ssh");
                cmd.arg("-o").arg("BatchMode=yes");
                cmd
            }
        };

        cmd.arg("-o")
            .arg("StrictHostKeyChecking=no")
            .arg("-o")
            .arg("UserKnownHostsFile=/dev/null")
            .arg("-o")
            .arg("LogLevel=ERROR")
            .arg("-o")
            .arg(format!(
                "ConnectTimeout={}",
                self.config.connect_timeout.as_secs()
            ))
            .arg("-p")
            .arg(self.config.port.to_string())
            .arg(self.config.destination())
            .arg(command);

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| SshError::ExecutionError(format!("failed to start ssh: {}", e)))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SshError::ExecutionError(format!("failed to wait for ssh: {}", e)))?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code(),
        };

        if result.exit_code == Some(SSH_ERROR_EXIT) {
            classify_ssh_failure(&self.config, &result)?;
        }

        debug!(
            "{}: exit code {:?}, stdout {} bytes, stderr {} bytes",
            self.config.host,
            result.exit_code,
            result.stdout.len(),
            result.stderr.len()
        );

        Ok(result)
    }

    /// Configuration in use
    pub fn config(&self) -> &SshConfig {
        &self.config
    }
}

/// Turns ssh's own failures (exit 255) into errors; remote exits pass through
fn classify_ssh_failure(config: &SshConfig, output: &CommandOutput) -> Result<()> {
    let stderr = output.stderr.as_str();
    if stderr.contains("Permission denied") || stderr.contains("Authentication failed") {
        return Err(SshError::AuthenticationError(format!(
            "{}: {}",
            config.destination(),
            stderr
        )));
    }
    if stderr.contains("Could not resolve")
        || stderr.contains("Connection refused")
        || stderr.contains("Connection timed out")
        || stderr.contains("No route to host")
        || stderr.contains("Network is unreachable")
    {
        return Err(SshError::ConnectionError(format!(
            "{}: {}",
            config.address(),
            stderr
        )));
    }
    Ok(())
}

/// Expand a leading `~`
fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(rest) = path_str.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return PathBuf::from(format!("{}{}", home.to_string_lossy(), rest));
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_output() {
        let output = CommandOutput {
            stdout: "hello".to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        };
        assert!(output.is_success());
        assert_eq!(output.combined_output(), "hello");
    }

    #[test]
    fn test_combined_output_joins_streams() {
        let output = CommandOutput {
            stdout: "out".to_string(),
            stderr: "err".to_string(),
            exit_code: Some(1),
        };
        assert!(!output.is_success());
        assert_eq!(output.combined_output(), "out\nerr");
    }

    #[test]
    fn test_expand_path() {
        let path = PathBuf::from("/etc/hosts");
        assert_eq!(expand_path(&path), path);
    }

    #[test]
    fn test_expand_home_path() {
        if let Some(home) = dirs::home_dir() {
            let expanded = expand_path(Path::new("~/.ssh/id_rsa"));
            assert_eq!(expanded, home.join(".ssh/id_rsa"));
        }
    }

    #[test]
    fn test_classify_auth_failure() {
        let config = SshConfig::with_default_key("utility", "lab");
        let output = CommandOutput {
            stdout: String::new(),
            stderr: "lab@utility: Permission denied (publickey).".to_string(),
            exit_code: Some(255),
        };
        assert!(matches!(
            classify_ssh_failure(&config, &output),
            Err(SshError::AuthenticationError(_))
        ));
    }

    #[test]
    fn test_classify_connection_failure() {
        let config = SshConfig::with_default_key("utility", "lab");
        let output = CommandOutput {
            stdout: String::new(),
            stderr: "ssh: connect to host utility port 22: Connection refused".to_string(),
            exit_code: Some(255),
        };
        assert!(matches!(
            classify_ssh_failure(&config, &output),
            Err(SshError::ConnectionError(_))
        ));
    }

    #[test]
    fn test_remote_exit_255_passes_through() {
        let config = SshConfig::with_default_key("utility", "lab");
        let output = CommandOutput {
            stdout: String::new(),
            stderr: "custom failure".to_string(),
            exit_code: Some(255),
        };
        assert!(classify_ssh_failure(&config, &output).is_ok());
    }
}
