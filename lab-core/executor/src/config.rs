//! Lab configuration
//!
//! Loaded from several sources:
//! - environment variables (highest priority)
//! - config file (TOML/YAML/JSON)
//! - defaults (lowest priority)
//!
//! Config file search path, first existing wins:
//! 1. path in the `LAB_CONFIG` environment variable
//! 2. `./lab.toml`, `./lab.yaml`
//! 3. `~/.config/lab/config.toml`
//! 4. `/etc/lab/config.toml`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================
// Config structures
// ============================================

/// Lab configuration (top level)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabConfig {
    /// Course SKU
    #[serde(default = "default_course")]
    pub course: String,

    /// Cluster API
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Lab hosts by name
    #[serde(default = "default_hosts")]
    pub hosts: HashMap<String, HostConfig>,

    /// Playbook runner
    #[serde(default)]
    pub ansible: AnsibleConfig,

    /// Exercise material
    #[serde(default)]
    pub files: FilesConfig,

    /// Timeouts
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

/// Cluster API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// API host name
    #[serde(default = "default_api_host")]
    pub host: String,

    /// API port
    #[serde(default = "default_api_port")]
    pub port: u16,

    #[serde(default = "default_api_user")]
    pub user: String,

    #[serde(default = "default_api_password")]
    pub password: String,

    #[serde(default)]
    pub verify_ssl: bool,

    /// Wildcard domain of application routes
    #[serde(default = "default_apps_domain")]
    pub apps_domain: String,

    /// Nodes that must be Ready
    #[serde(default = "default_nodes")]
    pub nodes: Vec<String>,

    /// Worker node names
    #[serde(default = "default_workers")]
    pub workers: Vec<String>,
}

/// Lab host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Address or resolvable name
    pub address: String,

    pub user: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Private key; default identities when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,

    #[serde(default = "default_ssh_port")]
    pub port: u16,
}

/// Playbook runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnsibleConfig {
    /// `ansible-playbook` binary
    #[serde(default = "default_ansible_binary")]
    pub binary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<PathBuf>,

    /// Directory playbook paths are relative to
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,
}

/// Exercise material configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Root holding one directory per lab
    #[serde(default = "default_materials_dir")]
    pub materials_dir: PathBuf,

    /// Student work root; `~/<SKU>/labs` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
}

/// Timeouts (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect: u64,

    #[serde(default = "default_request_timeout")]
    pub request: u64,

    #[serde(default = "default_command_timeout")]
    pub command: u64,
}

// ============================================
// Default value functions
// ============================================

fn default_course() -> String {
    "do316".to_string()
}
fn default_api_host() -> String {
    "api.ocp4.example.com".to_string()
}
fn default_api_port() -> u16 {
    6443
}
fn default_api_user() -> String {
    "admin".to_string()
}
fn default_api_password() -> String {
    "redhat".to_string()
}
fn default_apps_domain() -> String {
    "apps.ocp4.example.com".to_string()
}
fn default_nodes() -> Vec<String> {
    ["master01", "master02", "master03", "worker01", "worker02"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_workers() -> Vec<String> {
    vec!["worker01".to_string(), "worker02".to_string()]
}
fn default_ssh_port() -> u16 {
    22
}
fn default_hosts() -> HashMap<String, HostConfig> {
    let mut hosts = HashMap::new();
    for (name, user) in [("utility", "lab"), ("workstation", "student")] {
        hosts.insert(
            name.to_string(),
            HostConfig {
                address: name.to_string(),
                user: user.to_string(),
                password: None,
                key_path: None,
                port: default_ssh_port(),
            },
        );
    }
    hosts
}
fn default_ansible_binary() -> String {
    "ansible-playbook".to_string()
}
fn default_content_dir() -> PathBuf {
    PathBuf::from("/usr/share/lab/content")
}
fn default_materials_dir() -> PathBuf {
    PathBuf::from("/usr/share/lab/materials")
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_request_timeout() -> u64 {
    30
}
fn default_command_timeout() -> u64 {
    120
}

// ============================================
// Default implementations
// ============================================

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            course: default_course(),
            cluster: ClusterConfig::default(),
            hosts: default_hosts(),
            ansible: AnsibleConfig::default(),
            files: FilesConfig::default(),
            timeouts: TimeoutsConfig::default(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            user: default_api_user(),
            password: default_api_password(),
            verify_ssl: false,
            apps_domain: default_apps_domain(),
            nodes: default_nodes(),
            workers: default_workers(),
        }
    }
}

impl Default for AnsibleConfig {
    fn default() -> Self {
        Self {
            binary: default_ansible_binary(),
            inventory: None,
            content_dir: default_content_dir(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            materials_dir: default_materials_dir(),
            work_dir: None,
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            connect: default_connect_timeout(),
            request: default_request_timeout(),
            command: default_command_timeout(),
        }
    }
}

// ============================================
// Loading
// ============================================

impl LabConfig {
    /// Load from every source (environment > file > defaults)
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                tracing::debug!("Loading config from: {:?}", path);
                Self::load_from_file(&path)?
            }
            None => {
                tracing::debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_vars()?;
        Ok(config)
    }

    /// Load from an explicit file, then apply the environment
    pub fn load_with_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_vars()?;
        Ok(config)
    }

    /// Load a config file; the format follows the extension
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {:?}", path))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {:?}", path))?,
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {:?}", path))?,
            _ => anyhow::bail!("Unsupported config file format: {:?}", path),
        };

        Ok(config)
    }

    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("LAB_CONFIG") {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }

        let mut paths = vec![PathBuf::from("./lab.toml"), PathBuf::from("./lab.yaml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config/lab/config.toml"));
        }
        paths.push(PathBuf::from("/etc/lab/config.toml"));

        paths.into_iter().find(|p| p.exists())
    }

    /// Override from environment variables
    fn apply_env_vars(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(course) = var("RHT_COURSE") {
            self.course = course.to_lowercase();
        }

        if let Some(user) = var("OCP_USER") {
            self.cluster.user = user;
        }
        if let Some(password) = var("OCP_PASSWORD") {
            self.cluster.password = password;
        }
        if let Some(host) = var("OCP_HOST") {
            self.cluster.host = host;
        }
        if let Some(port) = var("OCP_PORT") {
            self.cluster.port = port.parse().context("Invalid OCP_PORT value")?;
        }

        if let Some(dir) = var("LAB_ANSIBLE_DIR") {
            self.ansible.content_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("LAB_MATERIALS_DIR") {
            self.files.materials_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("LAB_WORK_DIR") {
            self.files.work_dir = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cluster.host.trim().is_empty() {
            anyhow::bail!("cluster host cannot be empty");
        }
        if self.cluster.port == 0 {
            anyhow::bail!("cluster port cannot be 0");
        }
        if self.cluster.user.is_empty() || self.cluster.password.is_empty() {
            anyhow::bail!("cluster credentials cannot be empty");
        }
        Ok(())
    }

    /// `https://host:port`
    pub fn api_url(&self) -> String {
        format!("https://{}:{}", self.cluster.host, self.cluster.port)
    }

    /// Course SKU in upper case, as shown to learners
    pub fn sku(&self) -> String {
        self.course.to_uppercase()
    }

    /// Student work root, derived from the course unless set explicitly
    pub fn work_dir(&self) -> PathBuf {
        match &self.files.work_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/home/student"))
                .join(self.sku())
                .join("labs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LabConfig::default();
        assert_eq!(config.course, "do316");
        assert_eq!(config.api_url(), "https://api.ocp4.example.com:6443");
        assert_eq!(config.cluster.workers, vec!["worker01", "worker02"]);
        assert_eq!(config.hosts["utility"].user, "lab");
        assert_eq!(config.hosts["workstation"].user, "student");
        assert_eq!(config.sku(), "DO316");
    }

    #[test]
    fn test_config_validation() {
        let mut config = LabConfig::default();
        assert!(config.validate().is_ok());

        config.cluster.port = 0;
        assert!(config.validate().is_err());

        config.cluster.port = 6443;
        config.cluster.password = String::new();
        assert!(config.validate().is_err());

        config.cluster.password = "redhat".to_string();
        config.cluster.host = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OCP_HOST", "api.ocp4-mng.example.com"),
            ("OCP_PORT", "7443"),
            ("OCP_USER", "developer"),
            ("RHT_COURSE", "DO480"),
            ("LAB_WORK_DIR", "/tmp/labs"),
        ]
        .into_iter()
        .collect();

        let mut config = LabConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api_url(), "https://api.ocp4-mng.example.com:7443");
        assert_eq!(config.cluster.user, "developer");
        assert_eq!(config.course, "do480");
        assert_eq!(config.work_dir(), PathBuf::from("/tmp/labs"));
    }

    #[test]
    fn test_work_dir_follows_course() {
        let mut config = LabConfig::default();
        assert!(config.work_dir().ends_with("DO316/labs"));

        config
            .apply_overrides(|key| (key == "RHT_COURSE").then(|| "DO480".to_string()))
            .unwrap();
        assert!(config.work_dir().ends_with("DO480/labs"));

        let config: LabConfig = toml::from_str("course = \"do480\"").unwrap();
        assert!(config.work_dir().ends_with("DO480/labs"));
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = LabConfig::default();
        let result = config.apply_overrides(|key| (key == "OCP_PORT").then(|| "api".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: LabConfig = toml::from_str(
            r#"
            course = "do480"

            [cluster]
            host = "api.ocp4.example.com"
            workers = ["worker01"]

            [hosts.workstation]
            address = "172.25.250.9"
            user = "student"
            password = "student"
            "#,
        )
        .unwrap();

        assert_eq!(config.course, "do480");
        assert_eq!(config.cluster.port, 6443);
        assert_eq!(config.cluster.workers, vec!["worker01"]);
        assert_eq!(config.hosts.len(), 1);
        assert_eq!(config.hosts["workstation"].port, 22);
        assert_eq!(config.ansible.binary, "ansible-playbook");
    }

    #[test]
    fn test_yaml_config() {
        let config: LabConfig = serde_yaml::from_str(
            "cluster:\n  host: api.example.com\n  port: 8443\nfiles:\n  work_dir: /tmp/work\n",
        )
        .unwrap();
        assert_eq!(config.api_url(), "https://api.example.com:8443");
        assert_eq!(config.work_dir(), PathBuf::from("/tmp/work"));
        assert!(config.hosts.contains_key("utility"));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = LabConfig::load_from_file(Path::new("/tmp/lab.ini"));
        assert!(result.is_err());
    }
}
