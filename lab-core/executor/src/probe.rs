//! HTTP status probe

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::capability::HttpProbe;
use crate::{ExecutorError, Result};

/// Probes URLs with reqwest; certificates are not verified
#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: Client,
}

impl ReqwestProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| ExecutorError::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn status(&self, url: &str) -> Result<u16> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ExecutorError::Http(e.to_string()))?;
        let status = response.status().as_u16();
        debug!("GET {} -> {}", url, status);
        Ok(status)
    }
}
