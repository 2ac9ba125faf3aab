//! Playbook runner backed by `ansible-playbook`

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::capability::PlaybookRunner;
use crate::config::AnsibleConfig;
use crate::{ExecutorError, Result};

/// Runs playbooks from the course content directory
#[derive(Debug, Clone)]
pub struct AnsiblePlaybookRunner {
    binary: String,
    inventory: Option<PathBuf>,
    content_dir: PathBuf,
}

impl AnsiblePlaybookRunner {
    pub fn new(config: &AnsibleConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            inventory: config.inventory.clone(),
            content_dir: config.content_dir.clone(),
        }
    }

    /// Arguments passed to the binary
    fn args(&self, path: &str, vars: &Map<String, Value>) -> Result<Vec<String>> {
        let mut args = Vec::new();
        if let Some(inventory) = &self.inventory {
            args.push("-i".to_string());
            args.push(inventory.to_string_lossy().into_owned());
        }
        if !vars.is_empty() {
            let extra = serde_json::to_string(vars)
                .map_err(|e| ExecutorError::SerdeError(e.to_string()))?;
            args.push("-e".to_string());
            args.push(extra);
        }
        args.push(path.to_string());
        Ok(args)
    }
}

#[async_trait]
impl PlaybookRunner for AnsiblePlaybookRunner {
    async fn run(&self, path: &str, vars: &Map<String, Value>) -> Result<()> {
        let args = self.args(path, vars)?;
        info!("running playbook {} in {:?}", path, self.content_dir);
        debug!("{} {:?}", self.binary, args);

        let output = Command::new(&self.binary)
            .args(&args)
            .current_dir(&self.content_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExecutorError::PlaybookFailed {
                path: path.to_string(),
                reason: format!("cannot start {}: {}", self.binary, e),
            })?;

        debug!("{} stdout:\n{}", path, String::from_utf8_lossy(&output.stdout));

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!("playbook {} failed: {:?} {}", path, output.status.code(), stderr);
        Err(ExecutorError::PlaybookFailed {
            path: path.to_string(),
            reason: match output.status.code() {
                Some(code) => format!("exit code {}", code),
                None => "killed by signal".to_string(),
            },
        })
    }
}
