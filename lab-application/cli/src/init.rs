//! Environment initialization
//!
//! Everything that must work before the first step runs. Failures here end
//! the process with a status that tells the learner how long to wait.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use thiserror::Error;
use tracing::{error, info};

use lab_cluster::{ClusterClient, ClusterClientConfig, ClusterError};
use lab_executor::{
    AnsiblePlaybookRunner, Capabilities, LabConfig, LocalLabFiles, ReqwestProbe,
    SshCommandRunner,
};

#[derive(Error, Debug)]
pub enum InitError {
    #[error("lab environment is not reachable: {0}")]
    EnvironmentNotReady(String),

    #[error("cluster API is not ready: {0}")]
    ClusterNotReady(String),

    #[error("initialization failed: {0}")]
    Unknown(String),
}

impl InitError {
    pub fn exit_status(&self) -> u8 {
        match self {
            InitError::EnvironmentNotReady(_) => 3,
            InitError::ClusterNotReady(_) => 2,
            InitError::Unknown(_) => 1,
        }
    }

    /// Remediation shown to the learner
    pub fn message(&self) -> &'static str {
        match self {
            InitError::EnvironmentNotReady(_) => {
                "The Lab environment is not ready, please wait 10 minutes before trying again."
            }
            InitError::ClusterNotReady(_) => {
                "The OpenShift cluster is not ready, please wait 5 minutes before trying again."
            }
            InitError::Unknown(_) => "An unknown error occurred.",
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}

impl From<ClusterError> for InitError {
    fn from(e: ClusterError) -> Self {
        if e.is_connectivity() {
            InitError::EnvironmentNotReady(e.to_string())
        } else if e.is_api() {
            InitError::ClusterNotReady(e.to_string())
        } else {
            InitError::Unknown(e.to_string())
        }
    }
}

impl From<anyhow::Error> for InitError {
    fn from(e: anyhow::Error) -> Self {
        InitError::Unknown(format!("{:#}", e))
    }
}

/// Load and validate the configuration
pub fn load_config(path: Option<&std::path::Path>) -> Result<LabConfig, InitError> {
    let config = match path {
        Some(path) => LabConfig::load_with_file(path)?,
        None => LabConfig::load()?,
    };
    config.validate()?;
    Ok(config)
}

/// Log in and probe API readiness
pub async fn connect(config: &LabConfig) -> Result<ClusterClient, InitError> {
    let client_config = ClusterClientConfig {
        connect_timeout: config.timeouts.connect,
        request_timeout: config.timeouts.request,
        verify_ssl: config.cluster.verify_ssl,
    };

    let mut client = ClusterClient::new(&config.api_url(), client_config)?;
    client
        .login(&config.cluster.user, &config.cluster.password)
        .await?;
    client.ready().await?;

    info!("connected to {}", client.base_url());
    Ok(client)
}

/// Production capabilities for a phase run
pub fn capabilities(config: &LabConfig, client: ClusterClient) -> Result<Capabilities, InitError> {
    let probe = ReqwestProbe::new(Duration::from_secs(config.timeouts.request))
        .map_err(|e| InitError::Unknown(e.to_string()))?;

    Ok(Capabilities::new(
        Arc::new(client),
        Arc::new(SshCommandRunner::from_config(config)),
        Arc::new(AnsiblePlaybookRunner::new(&config.ansible)),
        Arc::new(LocalLabFiles::from_config(config)),
        Arc::new(probe),
    ))
}

/// Print the remediation and log the cause
pub fn report(e: &InitError) {
    error!("{}", e);
    eprintln!("{}", e.message().red());
}
