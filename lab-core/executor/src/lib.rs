//! Lab executor
//!
//! Phase step execution engine: runs an ordered step list, applies the
//! fatal-abort policy and turns a completed grading run into a grade report.

pub mod actions;
pub mod capability;
pub mod cluster_ops;
pub mod config;
pub mod grade;
pub mod lab_files;
pub mod playbook;
pub mod probe;
pub mod runner;
pub mod ssh_manager;
pub mod step;

pub use actions::execute_action;
pub use capability::{
    Capabilities, CommandRunner, CustomCheck, HttpProbe, LabFiles, PlaybookRunner,
    ResourceClient,
};
pub use config::{
    AnsibleConfig, ClusterConfig, FilesConfig, HostConfig, LabConfig, TimeoutsConfig,
};
pub use grade::{score, GradeReport, GradedCheck};
pub use lab_common::{Phase, RunState, StepResult};
pub use lab_cluster::ResourceRef;
pub use lab_files::LocalLabFiles;
pub use lab_ssh_executor::CommandOutput;
pub use playbook::AnsiblePlaybookRunner;
pub use probe::ReqwestProbe;
pub use runner::{NoopObserver, PhaseObserver, PhaseRunner, RunResult, StepOutcome};
pub use ssh_manager::SshCommandRunner;
pub use step::{CommandCheck, FieldPath, ResourceExpectation, Step, StepAction};

use lab_cluster::ClusterError;
use lab_ssh_executor::SshError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("SSH error: {0}")]
    Ssh(#[from] SshError),

    #[error("playbook {path} failed: {reason}")]
    PlaybookFailed { path: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("run cannot be graded: {0}")]
    NotGradable(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerdeError(String),
}

impl ExecutorError {
    /// The addressed cluster object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExecutorError::Cluster(ClusterError::NotFound(_)))
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
