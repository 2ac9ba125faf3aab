//! Cluster client errors

use thiserror::Error;

/// Cluster client error type
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("API error [{0}]: {1}")]
    Api(u16, String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("resource not found: {0}")]
    NotFound(String),
}

impl ClusterError {
    /// The API server could not be reached at all
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ClusterError::Connection(_))
    }

    /// The API server answered, but not with success
    pub fn is_api(&self) -> bool {
        matches!(
            self,
            ClusterError::Api(..) | ClusterError::Auth(_) | ClusterError::NotFound(_)
        )
    }
}

impl From<reqwest::Error> for ClusterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            ClusterError::Connection(e.to_string())
        } else if e.is_decode() {
            ClusterError::Parse(e.to_string())
        } else {
            ClusterError::Http(e.to_string())
        }
    }
}

/// Cluster client result type
pub type Result<T> = std::result::Result<T, ClusterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ClusterError::Connection("refused".into()).is_connectivity());
        assert!(!ClusterError::Connection("refused".into()).is_api());
        assert!(ClusterError::Api(503, "not ready".into()).is_api());
        assert!(ClusterError::Auth("bad password".into()).is_api());
        assert!(!ClusterError::Parse("eof".into()).is_api());
        assert!(!ClusterError::Parse("eof".into()).is_connectivity());
    }
}
