//! Custom checks
//!
//! Checks that need more than one field comparison. Each returns every
//! problem it finds so the learner sees them all at once.

use async_trait::async_trait;
use serde_json::Value;

use lab_cluster::ResourceRef;
use lab_common::StepResult;
use lab_executor::{Capabilities, CustomCheck, FieldPath, Result};

/// `true` when `obj.status.conditions` has `type` with status "True"
fn condition_true(obj: &Value, condition: &str) -> bool {
    obj.pointer("/status/conditions")
        .and_then(Value::as_array)
        .map(|conditions| {
            conditions.iter().any(|c| {
                c.get("type").and_then(Value::as_str) == Some(condition)
                    && c.get("status").and_then(Value::as_str) == Some("True")
            })
        })
        .unwrap_or(false)
}

/// Array at a JSON pointer, empty when missing
fn array<'a>(obj: &'a Value, pointer: &str) -> &'a [Value] {
    obj.pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn str_at<'a>(obj: &'a Value, pointer: &str) -> Option<&'a str> {
    obj.pointer(pointer).and_then(Value::as_str)
}

/// Text of a labelled field, accepting labels whose key contains `/`
fn label<'a>(obj: &'a Value, parent: &[&str], key: &str) -> Option<&'a str> {
    let mut path = parent.to_vec();
    path.push(key);
    FieldPath::new(&path).lookup(obj).and_then(Value::as_str)
}

fn missing(resource: &ResourceRef) -> StepResult {
    StepResult::fail(format!(
        "The '{}' {} does not exist, please work through the lab instructions",
        resource.name, resource.kind
    ))
}

// ============================================
// Cluster
// ============================================

/// Every listed node reports Ready
#[derive(Debug, Clone)]
pub struct ClusterReady {
    pub nodes: Vec<String>,
}

#[async_trait]
impl CustomCheck for ClusterReady {
    async fn check(&self, caps: &Capabilities) -> Result<StepResult> {
        let mut failures = Vec::new();
        for node in &self.nodes {
            let resource = ResourceRef::cluster_scoped("v1", "Node", node);
            match caps.resources.get(&resource).await? {
                None => failures.push(format!("Node {} does not exist", node)),
                Some(obj) if !condition_true(&obj, "Ready") => {
                    failures.push(format!("Node {} is not ready", node))
                }
                Some(_) => {}
            }
        }
        Ok(StepResult::from_failures(failures))
    }
}

/// Operator custom resource reports a condition
#[derive(Debug, Clone)]
pub struct OperatorReady {
    /// Display name of the operator
    pub operator: String,
    /// Operand resource, e.g. the HyperConverged object
    pub resource: ResourceRef,
    pub condition: String,
}

#[async_trait]
impl CustomCheck for OperatorReady {
    async fn check(&self, caps: &Capabilities) -> Result<StepResult> {
        Ok(match caps.resources.get(&self.resource).await? {
            None => StepResult::fail(format!(
                "The '{}' operator is not installed",
                self.operator
            )),
            Some(obj) if !condition_true(&obj, &self.condition) => StepResult::fail(format!(
                "The '{}' operator is installed but not {}",
                self.operator,
                self.condition.to_lowercase()
            )),
            Some(_) => StepResult::pass(),
        })
    }
}

/// NodeNetworkConfigurationPolicy creating a Linux bridge on a port
#[derive(Debug, Clone)]
pub struct BridgePolicy {
    /// Policy and bridge name
    pub name: String,
    pub port: String,
    pub label_key: String,
    pub label_value: String,
}

#[async_trait]
impl CustomCheck for BridgePolicy {
    async fn check(&self, caps: &Capabilities) -> Result<StepResult> {
        let resource = ResourceRef::cluster_scoped(
            "nmstate.io/v1",
            "NodeNetworkConfigurationPolicy",
            &self.name,
        );
        let Some(policy) = caps.resources.get(&resource).await? else {
            return Ok(missing(&resource));
        };

        let mut failures = Vec::new();
        if label(&policy, &["spec", "nodeSelector"], &self.label_key) != Some(&self.label_value) {
            failures.push(format!(
                "The '{}' policy does not select nodes with the '{}={}' label",
                self.name, self.label_key, self.label_value
            ));
        }

        let bridge = array(&policy, "/spec/desiredState/interfaces")
            .iter()
            .find(|i| str_at(i, "/name") == Some(self.name.as_str()));
        match bridge {
            None => failures.push(format!(
                "The '{}' policy does not define the '{}' interface",
                self.name, self.name
            )),
            Some(bridge) => {
                if str_at(bridge, "/type") != Some("linux-bridge") {
                    failures.push(format!("The '{}' interface is not a Linux bridge", self.name));
                }
                let has_port = array(bridge, "/bridge/port")
                    .iter()
                    .any(|p| str_at(p, "/name") == Some(self.port.as_str()));
                if !has_port {
                    failures.push(format!(
                        "The '{}' bridge does not use the '{}' port",
                        self.name, self.port
                    ));
                }
            }
        }

        Ok(StepResult::from_failures(failures))
    }
}

/// A group is bound to a role in a namespace
#[derive(Debug, Clone)]
pub struct GroupRights {
    pub namespace: String,
    pub group: String,
    pub role: String,
}

#[async_trait]
impl CustomCheck for GroupRights {
    async fn check(&self, caps: &Capabilities) -> Result<StepResult> {
        let bindings = ResourceRef::namespaced(
            "rbac.authorization.k8s.io/v1",
            "RoleBinding",
            "",
            &self.namespace,
        );
        let granted = caps.resources.list(&bindings).await?.iter().any(|binding| {
            str_at(binding, "/roleRef/name") == Some(self.role.as_str())
                && array(binding, "/subjects").iter().any(|s| {
                    str_at(s, "/kind") == Some("Group")
                        && str_at(s, "/name") == Some(self.group.as_str())
                })
        });

        Ok(if granted {
            StepResult::pass()
        } else {
            StepResult::fail(format!(
                "The '{}' group does not have '{}' rights in the '{}' project",
                self.group, self.role, self.namespace
            ))
        })
    }
}

/// Node is unschedulable and runs no VM of the namespace
#[derive(Debug, Clone)]
pub struct NodeDrained {
    pub node: String,
    pub namespace: String,
}

#[async_trait]
impl CustomCheck for NodeDrained {
    async fn check(&self, caps: &Capabilities) -> Result<StepResult> {
        let resource = ResourceRef::cluster_scoped("v1", "Node", &self.node);
        let Some(node) = caps.resources.get(&resource).await? else {
            return Ok(missing(&resource));
        };

        let mut failures = Vec::new();
        if node.pointer("/spec/unschedulable").and_then(Value::as_bool) != Some(true) {
            failures.push(format!("The '{}' node is not cordoned off", self.node));
        }

        let instances = ResourceRef::namespaced(
            "kubevirt.io/v1",
            "VirtualMachineInstance",
            "",
            &self.namespace,
        );
        for vmi in caps.resources.list(&instances).await? {
            if str_at(&vmi, "/status/nodeName") == Some(self.node.as_str()) {
                failures.push(format!(
                    "The '{}' VM is still running on '{}'",
                    str_at(&vmi, "/metadata/name").unwrap_or("?"),
                    self.node
                ));
            }
        }

        Ok(StepResult::from_failures(failures))
    }
}

// ============================================
// Virtual machines
// ============================================

/// VM has a network interface attached to a network attachment
#[derive(Debug, Clone)]
pub struct VmNic {
    pub namespace: String,
    pub vm: String,
    pub nic: String,
    pub attachment: String,
}

#[async_trait]
impl CustomCheck for VmNic {
    async fn check(&self, caps: &Capabilities) -> Result<StepResult> {
        let resource =
            ResourceRef::namespaced("kubevirt.io/v1", "VirtualMachine", &self.vm, &self.namespace);
        let Some(vm) = caps.resources.get(&resource).await? else {
            return Ok(missing(&resource));
        };

        let has_interface = array(&vm, "/spec/template/spec/domain/devices/interfaces")
            .iter()
            .any(|i| str_at(i, "/name") == Some(self.nic.as_str()));
        if !has_interface {
            return Ok(StepResult::fail(format!(
                "The '{}' VM has no '{}' network interface",
                self.vm, self.nic
            )));
        }

        let network = array(&vm, "/spec/template/spec/networks")
            .iter()
            .find(|n| str_at(n, "/name") == Some(self.nic.as_str()))
            .and_then(|n| str_at(n, "/multus/networkName"));
        let attached = match network {
            // `namespace/name` or bare `name`
            Some(name) => name.rsplit('/').next() == Some(self.attachment.as_str()),
            None => false,
        };

        Ok(if attached {
            StepResult::pass()
        } else {
            StepResult::fail(format!(
                "The '{}' interface of the '{}' VM is not connected to '{}'",
                self.nic, self.vm, self.attachment
            ))
        })
    }
}

/// VM declares an HTTP readiness probe
#[derive(Debug, Clone)]
pub struct VmReadinessProbe {
    pub namespace: String,
    pub vm: String,
    pub path: String,
    pub port: u64,
    pub period: u64,
    pub failures: u64,
}

#[async_trait]
impl CustomCheck for VmReadinessProbe {
    async fn check(&self, caps: &Capabilities) -> Result<StepResult> {
        let resource =
            ResourceRef::namespaced("kubevirt.io/v1", "VirtualMachine", &self.vm, &self.namespace);
        let Some(vm) = caps.resources.get(&resource).await? else {
            return Ok(missing(&resource));
        };

        let Some(probe) = vm.pointer("/spec/template/spec/readinessProbe") else {
            return Ok(StepResult::fail(format!(
                "The '{}' VM has no readiness probe",
                self.vm
            )));
        };

        let mut failures = Vec::new();
        if str_at(probe, "/httpGet/path") != Some(self.path.as_str()) {
            failures.push(format!("The readiness probe of '{}' does not use the '{}' path", self.vm, self.path));
        }
        if probe.pointer("/httpGet/port").and_then(Value::as_u64) != Some(self.port) {
            failures.push(format!("The readiness probe of '{}' does not use port {}", self.vm, self.port));
        }
        if probe.pointer("/periodSeconds").and_then(Value::as_u64) != Some(self.period) {
            failures.push(format!("The readiness probe of '{}' does not run every {} seconds", self.vm, self.period));
        }
        if probe.pointer("/failureThreshold").and_then(Value::as_u64) != Some(self.failures) {
            failures.push(format!(
                "The readiness probe of '{}' does not allow {} failures",
                self.vm, self.failures
            ));
        }
        Ok(StepResult::from_failures(failures))
    }
}

/// VM mounts a PVC (directly or through a data volume)
#[derive(Debug, Clone)]
pub struct VmVolumeClaim {
    pub namespace: String,
    pub vm: String,
    pub claim: String,
}

#[async_trait]
impl CustomCheck for VmVolumeClaim {
    async fn check(&self, caps: &Capabilities) -> Result<StepResult> {
        let resource =
            ResourceRef::namespaced("kubevirt.io/v1", "VirtualMachine", &self.vm, &self.namespace);
        let Some(vm) = caps.resources.get(&resource).await? else {
            return Ok(missing(&resource));
        };

        let attached = array(&vm, "/spec/template/spec/volumes").iter().any(|v| {
            str_at(v, "/persistentVolumeClaim/claimName") == Some(self.claim.as_str())
                || str_at(v, "/dataVolume/name") == Some(self.claim.as_str())
        });

        Ok(if attached {
            StepResult::pass()
        } else {
            StepResult::fail(format!(
                "The '{}' PVC is not connected to the '{}' VM",
                self.claim, self.vm
            ))
        })
    }
}

/// Virtual machine template metadata and boot disk
#[derive(Debug, Clone)]
pub struct VmTemplate {
    pub namespace: String,
    pub name: String,
    pub provider: String,
    pub os: String,
    pub flavor: String,
    pub workload: String,
    pub disk_url: String,
    pub disk_size: String,
    pub storage_class: String,
}

#[async_trait]
impl CustomCheck for VmTemplate {
    async fn check(&self, caps: &Capabilities) -> Result<StepResult> {
        let resource = ResourceRef::namespaced(
            "template.openshift.io/v1",
            "Template",
            &self.name,
            &self.namespace,
        );
        let Some(template) = caps.resources.get(&resource).await? else {
            return Ok(missing(&resource));
        };

        let mut failures = Vec::new();
        let annotations = ["metadata", "annotations"];
        let labels = ["metadata", "labels"];

        if label(&template, &annotations, "openshift.io/provider-display-name")
            != Some(self.provider.as_str())
        {
            failures.push(format!("The template provider is not '{}'", self.provider));
        }
        for (prefix, value) in [
            ("os.template.kubevirt.io", &self.os),
            ("flavor.template.kubevirt.io", &self.flavor),
            ("workload.template.kubevirt.io", &self.workload),
        ] {
            let key = format!("{}/{}", prefix, value);
            if label(&template, &labels, &key) != Some("true") {
                failures.push(format!("The template does not have the '{}' label", key));
            }
        }

        let volume = array(&template, "/objects")
            .first()
            .and_then(|vm| array(vm, "/spec/dataVolumeTemplates").first());
        match volume {
            None => failures.push("The template does not define a boot data volume".to_string()),
            Some(dv) => {
                if str_at(dv, "/spec/source/http/url") != Some(self.disk_url.as_str()) {
                    failures.push(format!("The boot disk is not imported from {}", self.disk_url));
                }
                let size = str_at(dv, "/spec/storage/resources/requests/storage")
                    .or_else(|| str_at(dv, "/spec/pvc/resources/requests/storage"));
                if size != Some(self.disk_size.as_str()) {
                    failures.push(format!("The boot disk size is not {}", self.disk_size));
                }
                let class = str_at(dv, "/spec/storage/storageClassName")
                    .or_else(|| str_at(dv, "/spec/pvc/storageClassName"));
                if class != Some(self.storage_class.as_str()) {
                    failures.push(format!(
                        "The boot disk does not use the '{}' storage class",
                        self.storage_class
                    ));
                }
            }
        }

        Ok(StepResult::from_failures(failures))
    }
}

// ============================================
// Services and routes
// ============================================

/// Service type, selector and port
#[derive(Debug, Clone)]
pub struct ServiceCheck {
    pub namespace: String,
    pub name: String,
    pub service_type: String,
    pub selector_key: String,
    pub selector_value: String,
    pub port: u64,
    pub target_port: u64,
    pub protocol: String,
}

#[async_trait]
impl CustomCheck for ServiceCheck {
    async fn check(&self, caps: &Capabilities) -> Result<StepResult> {
        let resource = ResourceRef::namespaced("v1", "Service", &self.name, &self.namespace);
        let Some(service) = caps.resources.get(&resource).await? else {
            return Ok(missing(&resource));
        };

        let mut failures = Vec::new();
        if str_at(&service, "/spec/type") != Some(self.service_type.as_str()) {
            failures.push(format!("The '{}' service is not of type {}", self.name, self.service_type));
        }
        if label(&service, &["spec", "selector"], &self.selector_key) != Some(self.selector_value.as_str()) {
            failures.push(format!(
                "The '{}' service does not select '{}={}'",
                self.name, self.selector_key, self.selector_value
            ));
        }
        let port_ok = array(&service, "/spec/ports").iter().any(|p| {
            p.pointer("/port").and_then(Value::as_u64) == Some(self.port)
                && p.pointer("/targetPort").and_then(Value::as_u64) == Some(self.target_port)
                && str_at(p, "/protocol").unwrap_or("TCP") == self.protocol
        });
        if !port_ok {
            failures.push(format!(
                "The '{}' service does not forward {}/{} to port {}",
                self.name, self.port, self.protocol, self.target_port
            ));
        }
        Ok(StepResult::from_failures(failures))
    }
}

/// Image registry stores images in an S3 bucket with a given prefix
#[derive(Debug, Clone)]
pub struct RegistryBucket {
    pub prefix: String,
}

#[async_trait]
impl CustomCheck for RegistryBucket {
    async fn check(&self, caps: &Capabilities) -> Result<StepResult> {
        let resource = ResourceRef::cluster_scoped(
            "imageregistry.operator.openshift.io/v1",
            "Config",
            "cluster",
        );
        let bucket = caps
            .resources
            .get(&resource)
            .await?
            .and_then(|config| str_at(&config, "/spec/storage/s3/bucket").map(str::to_string));

        Ok(match bucket {
            Some(bucket) if bucket.contains(&self.prefix) => StepResult::pass(),
            Some(_) => StepResult::fail(
                "Image registry is set to the wrong value. Please work through the lab instructions.",
            ),
            None => StepResult::fail(
                "Image registry is not configured. Please work through the lab instructions.",
            ),
        })
    }
}

/// URL answers with a given HTTP status
#[derive(Debug, Clone)]
pub struct HttpStatus {
    pub url: String,
    pub code: u16,
}

#[async_trait]
impl CustomCheck for HttpStatus {
    async fn check(&self, caps: &Capabilities) -> Result<StepResult> {
        Ok(match caps.http.status(&self.url).await {
            Ok(code) if code == self.code => StepResult::pass(),
            Ok(code) => StepResult::fail(format!(
                "{} returned HTTP {}, expected {}",
                self.url, code, self.code
            )),
            Err(e) => StepResult::fail(format!("{} is not reachable: {}", self.url, e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_condition_true() {
        let node = json!({"status": {"conditions": [
            {"type": "MemoryPressure", "status": "False"},
            {"type": "Ready", "status": "True"}
        ]}});
        assert!(condition_true(&node, "Ready"));
        assert!(!condition_true(&node, "MemoryPressure"));
        assert!(!condition_true(&json!({}), "Ready"));
    }

    #[test]
    fn test_label_with_slash() {
        let obj = json!({"metadata": {"labels": {"vm.kubevirt.io/template": "rhel8-server-small"}}});
        assert_eq!(
            label(&obj, &["metadata", "labels"], "vm.kubevirt.io/template"),
            Some("rhel8-server-small")
        );
    }

    #[test]
    fn test_array_missing_is_empty() {
        assert!(array(&json!({"spec": {}}), "/spec/ports").is_empty());
    }
}
