//! SSH error definitions

use thiserror::Error;

/// SSH operation result type
pub type Result<T> = std::result::Result<T, SshError>;

/// SSH error type
#[derive(Error, Debug)]
pub enum SshError {
    /// Host could not be reached
    #[error("SSH connection failed: {0}")]
    ConnectionError(String),

    /// Credentials were rejected
    #[error("SSH authentication failed: {0}")]
    AuthenticationError(String),

    /// The ssh process could not be started or awaited
    #[error("command execution failed: {0}")]
    ExecutionError(String),

    /// The command did not finish in time
    #[error("SSH operation timed out: {0}")]
    TimeoutError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
