//! Capability traits
//!
//! The executor reaches every external system through these traits; the
//! production implementations live in `cluster_ops`, `ssh_manager`,
//! `playbook`, `lab_files` and `probe`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use lab_cluster::ResourceRef;
use lab_common::StepResult;
use lab_ssh_executor::CommandOutput;

use crate::Result;

/// Cluster object access keyed by (api-version, kind, name, namespace)
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn exists(&self, resource: &ResourceRef) -> Result<bool> {
        Ok(self.get(resource).await?.is_some())
    }

    /// `None` when the object does not exist
    async fn get(&self, resource: &ResourceRef) -> Result<Option<Value>>;

    /// Objects in the collection `resource` belongs to
    async fn list(&self, resource: &ResourceRef) -> Result<Vec<Value>>;

    /// Fails with a not-found error when the object is missing
    async fn delete(&self, resource: &ResourceRef) -> Result<()>;

    /// API server readiness
    async fn ready(&self) -> Result<()>;
}

/// Command execution on a named lab host
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, host: &str, command: &str) -> Result<CommandOutput>;

    /// Whether the host accepts a login and runs a trivial command
    async fn ping(&self, host: &str) -> Result<()> {
        let output = self.run(host, "true").await?;
        if output.is_success() {
            Ok(())
        } else {
            Err(crate::ExecutorError::Ssh(
                lab_ssh_executor::SshError::ExecutionError(format!(
                    "{}: exit code {:?}",
                    host, output.exit_code
                )),
            ))
        }
    }
}

/// Automation playbook execution
#[async_trait]
pub trait PlaybookRunner: Send + Sync {
    /// `Ok` on success; a failed run is `ExecutorError::PlaybookFailed`
    async fn run(&self, path: &str, vars: &Map<String, Value>) -> Result<()>;
}

/// Exercise material handling
#[async_trait]
pub trait LabFiles: Send + Sync {
    async fn copy_lab_files(&self, lab_name: &str) -> Result<()>;

    async fn delete_workdir(&self, lab_name: &str) -> Result<()>;
}

/// HTTP status probe
#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn status(&self, url: &str) -> Result<u16>;
}

/// Lab-provided check
///
/// Returns its own `StepResult`; an `Err` is turned into a failed step.
#[async_trait]
pub trait CustomCheck: fmt::Debug + Send + Sync {
    async fn check(&self, caps: &Capabilities) -> Result<StepResult>;
}

/// Everything a step may call
#[derive(Clone)]
pub struct Capabilities {
    pub resources: Arc<dyn ResourceClient>,
    pub commands: Arc<dyn CommandRunner>,
    pub playbooks: Arc<dyn PlaybookRunner>,
    pub files: Arc<dyn LabFiles>,
    pub http: Arc<dyn HttpProbe>,
}

impl Capabilities {
    pub fn new(
        resources: Arc<dyn ResourceClient>,
        commands: Arc<dyn CommandRunner>,
        playbooks: Arc<dyn PlaybookRunner>,
        files: Arc<dyn LabFiles>,
        http: Arc<dyn HttpProbe>,
    ) -> Self {
        Self {
            resources,
            commands,
            playbooks,
            files,
            http,
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
