//! Cluster control-plane client
//!
//! Talks to a Kubernetes/OpenShift API server on behalf of the lab scripts.
//!
//! # Features
//!
//! - **Login** (`ClusterClient::login`): OAuth challenging-client flow, or a
//!   pre-issued bearer token
//! - **Readiness** (`ClusterClient::ready`): `/readyz` probe
//! - **Resources** (`ResourceApi`): `exists` / `get` / `list` / `delete` keyed by
//!   (api-version, kind, name, namespace)
//!
//! # Example
//!
//! ```ignore
//! use lab_cluster::{ClusterClient, ClusterClientConfig, ResourceRef};
//!
//! let mut client = ClusterClient::new("https://api.ocp4.example.com:6443", ClusterClientConfig::default())?;
//! client.login("admin", "redhat").await?;
//! client.ready().await?;
//!
//! let vm = ResourceRef::namespaced("kubevirt.io/v1", "VirtualMachine", "web1", "review-cr1");
//! if let Some(obj) = client.resources().get(&vm).await? {
//!     println!("{}", obj["status"]["printableStatus"]);
//! }
//! ```

pub mod client;
pub mod error;
pub mod resource;

pub use client::{ClusterClient, ClusterClientConfig};
pub use error::{ClusterError, Result};
pub use resource::{ResourceApi, ResourceRef};
