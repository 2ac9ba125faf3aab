//! Resource API

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::ClusterClient;
use crate::error::{ClusterError, Result};

/// Plural names that the suffix rules below get wrong
const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("networkattachmentdefinition", "network-attachment-definitions"),
    ("endpoints", "endpoints"),
];

/// Identifies one cluster object by (api-version, kind, name, namespace)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// `v1`, `apps/v1`, `kubevirt.io/v1`, ...
    pub api_version: String,
    pub kind: String,
    pub name: String,
    /// `None` for cluster-scoped kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// REST plural when it cannot be derived from the kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
}

impl ResourceRef {
    /// A namespaced object
    pub fn namespaced(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            namespace: Some(namespace.into()),
            plural: None,
        }
    }

    /// A cluster-scoped object
    pub fn cluster_scoped(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            namespace: None,
            plural: None,
        }
    }

    /// Override the REST plural
    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = Some(plural.into());
        self
    }

    /// REST plural of the kind
    pub fn plural(&self) -> String {
        if let Some(plural) = &self.plural {
            return plural.clone();
        }

        let kind = self.kind.to_lowercase();
        if let Some((_, plural)) = IRREGULAR_PLURALS.iter().find(|(k, _)| *k == kind) {
            return plural.to_string();
        }

        if let Some(stem) = kind.strip_suffix('y') {
            if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
                return format!("{}ies", stem);
            }
        }
        if kind.ends_with('s') || kind.ends_with('x') || kind.ends_with("ch") || kind.ends_with("sh")
        {
            return format!("{}es", kind);
        }
        format!("{}s", kind)
    }

    /// REST path of the collection the object lives in
    pub fn collection_path(&self) -> String {
        let prefix = if self.api_version.contains('/') {
            format!("/apis/{}", self.api_version)
        } else {
            format!("/api/{}", self.api_version)
        };

        match &self.namespace {
            Some(ns) => format!("{}/namespaces/{}/{}", prefix, ns, self.plural()),
            None => format!("{}/{}", prefix, self.plural()),
        }
    }

    /// REST path of the object
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection_path(), self.name)
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Resource API
pub struct ResourceApi<'a> {
    client: &'a ClusterClient,
}

impl<'a> ResourceApi<'a> {
    pub(crate) fn new(client: &'a ClusterClient) -> Self {
        Self { client }
    }

    /// Whether the object exists
    pub async fn exists(&self, resource: &ResourceRef) -> Result<bool> {
        Ok(self.get(resource).await?.is_some())
    }

    /// Fetch the object; `None` when it does not exist
    pub async fn get(&self, resource: &ResourceRef) -> Result<Option<Value>> {
        debug!("get {}", resource);
        self.client.request(Method::GET, &resource.path()).await
    }

    /// List the collection `resource` belongs to; its name is ignored
    ///
    /// A missing collection (unknown kind or namespace) lists as empty.
    pub async fn list(&self, resource: &ResourceRef) -> Result<Vec<Value>> {
        debug!("list {} in {:?}", resource.plural(), resource.namespace);
        let body = self
            .client
            .request(Method::GET, &resource.collection_path())
            .await?;

        Ok(body
            .and_then(|mut list| match list.get_mut("items").map(Value::take) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default())
    }

    /// Delete the object with background propagation
    ///
    /// A missing object is `ClusterError::NotFound`.
    pub async fn delete(&self, resource: &ResourceRef) -> Result<()> {
        info!("delete {}", resource);
        let path = format!("{}?propagationPolicy=Background", resource.path());
        match self.client.request(Method::DELETE, &path).await? {
            Some(_) => Ok(()),
            None => Err(ClusterError::NotFound(resource.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_namespaced_path() {
        let pod = ResourceRef::namespaced("v1", "Pod", "web", "review-cr3");
        assert_eq!(pod.path(), "/api/v1/namespaces/review-cr3/pods/web");
    }

    #[test]
    fn test_group_cluster_scoped_path() {
        let policy = ResourceRef::cluster_scoped(
            "nmstate.io/v1",
            "NodeNetworkConfigurationPolicy",
            "br0",
        );
        assert_eq!(
            policy.path(),
            "/apis/nmstate.io/v1/nodenetworkconfigurationpolicies/br0"
        );
    }

    #[test]
    fn test_collection_path() {
        let bindings =
            ResourceRef::namespaced("rbac.authorization.k8s.io/v1", "RoleBinding", "", "review-cr2");
        assert_eq!(
            bindings.collection_path(),
            "/apis/rbac.authorization.k8s.io/v1/namespaces/review-cr2/rolebindings"
        );
    }

    #[test]
    fn test_plural_rules() {
        let plural = |kind: &str| ResourceRef::cluster_scoped("v1", kind, "x").plural();
        assert_eq!(plural("Namespace"), "namespaces");
        assert_eq!(plural("StorageClass"), "storageclasses");
        assert_eq!(plural("Ingress"), "ingresses");
        assert_eq!(plural("NetworkPolicy"), "networkpolicies");
        assert_eq!(plural("Gateway"), "gateways");
        assert_eq!(plural("Endpoints"), "endpoints");
        assert_eq!(
            plural("NetworkAttachmentDefinition"),
            "network-attachment-definitions"
        );
    }

    #[test]
    fn test_plural_override() {
        let cr = ResourceRef::namespaced("example.com/v1", "Octopus", "o", "ns").with_plural("octopi");
        assert_eq!(cr.path(), "/apis/example.com/v1/namespaces/ns/octopi/o");
    }

    #[test]
    fn test_display() {
        let vm = ResourceRef::namespaced("kubevirt.io/v1", "VirtualMachine", "web1", "review-cr1");
        assert_eq!(vm.to_string(), "VirtualMachine review-cr1/web1");
    }
}
