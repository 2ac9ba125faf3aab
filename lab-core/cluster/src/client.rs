//! Cluster client core

use std::sync::Arc;
use std::time::Duration;

use reqwest::{redirect, Client, Method, StatusCode};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{ClusterError, Result};
use crate::resource::ResourceApi;

/// OAuth client id that answers credentials with a redirect instead of a login page
const CHALLENGING_CLIENT_ID: &str = "openshift-challenging-client";

/// Cluster client configuration
#[derive(Debug, Clone)]
pub struct ClusterClientConfig {
    /// Connection timeout (seconds)
    pub connect_timeout: u64,

    /// Request timeout (seconds)
    pub request_timeout: u64,

    /// Verify the API server certificate
    pub verify_ssl: bool,
}

impl Default for ClusterClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: 10,
            request_timeout: 30,
            verify_ssl: false,
        }
    }
}

/// Cluster API client
pub struct ClusterClient {
    /// API base URL, e.g. `https://api.ocp4.example.com:6443`
    base_url: String,

    /// HTTP client for API calls
    http_client: Client,

    /// HTTP client that does not follow redirects (OAuth token flow)
    oauth_client: Client,

    /// Bearer token
    access_token: Arc<RwLock<Option<String>>>,
}

impl ClusterClient {
    /// Create a new client
    pub fn new(base_url: &str, config: ClusterClientConfig) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(ClusterError::Config("API URL is empty".to_string()));
        }

        let build = |policy: redirect::Policy| {
            Client::builder()
                .timeout(Duration::from_secs(config.request_timeout))
                .connect_timeout(Duration::from_secs(config.connect_timeout))
                .danger_accept_invalid_certs(!config.verify_ssl)
                .redirect(policy)
                .build()
                .map_err(|e| ClusterError::Http(e.to_string()))
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: build(redirect::Policy::default())?,
            oauth_client: build(redirect::Policy::none())?,
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Use a pre-issued bearer token instead of logging in
    pub async fn with_token(self, token: impl Into<String>) -> Self {
        *self.access_token.write().await = Some(token.into());
        self
    }

    /// Log in with user name and password
    ///
    /// Discovers the OAuth authorization endpoint, then requests a token for
    /// the challenging client with HTTP basic credentials.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        info!("cluster login: {} at {}", username, self.base_url);

        let discovery_url = format!("{}/.well-known/oauth-authorization-server", self.base_url);
        let response = self.http_client.get(&discovery_url).send().await?;
        let response = ensure_success(response).await?;
        let discovery: Value = response
            .json()
            .await
            .map_err(|e| ClusterError::Parse(e.to_string()))?;

        let authorize_endpoint = discovery["authorization_endpoint"]
            .as_str()
            .ok_or_else(|| {
                ClusterError::Parse("discovery document has no authorization_endpoint".into())
            })?
            .to_string();

        debug!("OAuth authorization endpoint: {}", authorize_endpoint);

        let response = self
            .oauth_client
            .get(&authorize_endpoint)
            .query(&[
                ("client_id", CHALLENGING_CLIENT_ID),
                ("response_type", "token"),
            ])
            .basic_auth(username, Some(password))
            .header("X-CSRF-Token", "1")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClusterError::Auth(format!(
                "credentials for {} were rejected",
                username
            )));
        }
        if !status.is_redirection() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClusterError::Api(status.as_u16(), body));
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ClusterError::Auth("OAuth redirect has no Location".into()))?;

        let token = token_from_location(location)?;
        *self.access_token.write().await = Some(token);

        info!("cluster login succeeded");
        Ok(())
    }

    /// Probe `/readyz`; any non-success answer is an API error
    pub async fn ready(&self) -> Result<()> {
        let url = format!("{}/readyz", self.base_url);
        debug!("readiness probe: {}", url);

        let mut request = self.http_client.get(&url);
        if let Some(token) = self.access_token.read().await.as_ref() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Resource API
    pub fn resources(&self) -> ResourceApi<'_> {
        ResourceApi::new(self)
    }

    /// Send an authenticated request and decode a JSON body
    ///
    /// Returns `Ok(None)` for 404 so callers can tell absence from failure.
    pub(crate) async fn request(&self, method: Method, path: &str) -> Result<Option<Value>> {
        let url = format!("{}{}", self.base_url, path);
        debug!("cluster API request: {} {}", method, url);

        let token = self.access_token.read().await;
        let token = token
            .as_ref()
            .ok_or_else(|| ClusterError::Auth("not logged in".to_string()))?;

        let response = self
            .http_client
            .request(method, &url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = ensure_success(response).await?;
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| ClusterError::Parse(e.to_string()))?;
        Ok(Some(body))
    }

    /// Base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Maps a non-success response to `ClusterError::Api`
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "unreadable error body".to_string());
    warn!("cluster API request failed: {} - {}", status, error_text);
    Err(ClusterError::Api(status.as_u16(), error_text))
}

/// Extract `access_token` from the fragment of an OAuth implicit-grant redirect
fn token_from_location(location: &str) -> Result<String> {
    let url = url::Url::parse(location).map_err(|e| ClusterError::Parse(e.to_string()))?;
    let fragment = url
        .fragment()
        .ok_or_else(|| ClusterError::Auth("OAuth redirect carries no token".into()))?;

    url::form_urlencoded::parse(fragment.as_bytes())
        .find(|(key, _)| key == "access_token")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| ClusterError::Auth("OAuth redirect carries no access_token".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_client_creation() {
        let client = ClusterClient::new(
            "https://api.ocp4.example.com:6443/",
            ClusterClientConfig::default(),
        );
        assert!(client.is_ok());
        assert_eq!(
            client.unwrap().base_url(),
            "https://api.ocp4.example.com:6443"
        );
    }

    #[test]
    fn test_empty_url_rejected() {
        let client = ClusterClient::new("  ", ClusterClientConfig::default());
        assert!(matches!(client, Err(ClusterError::Config(_))));
    }

    #[test]
    fn test_token_from_location() {
        let location = "https://oauth-openshift.apps.ocp4.example.com/oauth/token/implicit\
                        #access_token=sha256~abc123&expires_in=86400&scope=user%3Afull&token_type=Bearer";
        assert_eq!(token_from_location(location).unwrap(), "sha256~abc123");
    }

    #[test]
    fn test_token_from_location_with_error() {
        let location = "https://oauth-openshift.apps.ocp4.example.com/oauth/token/implicit\
                        #error=access_denied";
        assert!(matches!(
            token_from_location(location),
            Err(ClusterError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_request_requires_login() {
        let client =
            ClusterClient::new("http://127.0.0.1:9", ClusterClientConfig::default()).unwrap();
        let result = client.request(Method::GET, "/api/v1/namespaces").await;
        assert!(matches!(result, Err(ClusterError::Auth(_))));
    }
}
