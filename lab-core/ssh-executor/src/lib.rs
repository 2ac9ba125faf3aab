//! Lab SSH executor
//!
//! Runs commands on lab hosts through the system `ssh` binary:
//! - password authentication (through `sshpass`)
//! - private key authentication
//! - exit code and output capture with a per-command timeout
//!
//! # Example
//!
//! ```ignore
//! use lab_ssh_executor::{SshClient, SshConfig};
//!
//! let config = SshConfig::with_default_key("utility.lab.example.com", "student");
//! let client = SshClient::new(config);
//! client.ping().await?;
//! let output = client.execute("oc get nodes").await?;
//! println!("{}", output.stdout);
//! ```

mod client;
mod config;
mod error;

pub use client::{CommandOutput, SshClient};
pub use config::{AuthMethod, SshConfig};
pub use error::{Result, SshError};
