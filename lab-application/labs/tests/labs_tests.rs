//! Lab script tests
//!
//! Step lists are checked for shape; selected phases run against an
//! in-memory cluster.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use lab_cluster::ClusterError;
use lab_executor::*;
use lab_scripts::checks::{GroupRights, NodeDrained, RegistryBucket, VmTemplate};
use lab_scripts::{all, find};

// ============================================
// Fake cluster
// ============================================

#[derive(Default)]
struct Cluster {
    objects: HashMap<String, Value>,
    /// collection path -> items
    collections: HashMap<String, Vec<Value>>,
    http_status: u16,
    calls: Mutex<Vec<String>>,
}

impl Cluster {
    fn with(mut self, resource: ResourceRef, object: Value) -> Self {
        self.objects.insert(resource.path(), object);
        self
    }

    fn with_items(mut self, collection: ResourceRef, items: Vec<Value>) -> Self {
        self.collections.insert(collection.collection_path(), items);
        self
    }

    fn caps(self) -> Capabilities {
        caps_of(Arc::new(self))
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn caps_of(fake: Arc<Cluster>) -> Capabilities {
    Capabilities::new(
        fake.clone(),
        fake.clone(),
        fake.clone(),
        fake.clone(),
        fake,
    )
}

#[async_trait]
impl ResourceClient for Cluster {
    async fn get(&self, resource: &ResourceRef) -> Result<Option<Value>> {
        Ok(self.objects.get(&resource.path()).cloned())
    }

    async fn list(&self, resource: &ResourceRef) -> Result<Vec<Value>> {
        Ok(self
            .collections
            .get(&resource.collection_path())
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<()> {
        Err(ClusterError::NotFound(resource.to_string()).into())
    }

    async fn ready(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl CommandRunner for Cluster {
    async fn run(&self, host: &str, command: &str) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(format!("{}: {}", host, command));
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(0),
        })
    }
}

#[async_trait]
impl PlaybookRunner for Cluster {
    async fn run(&self, path: &str, _vars: &Map<String, Value>) -> Result<()> {
        self.calls.lock().unwrap().push(path.to_string());
        Ok(())
    }
}

#[async_trait]
impl LabFiles for Cluster {
    async fn copy_lab_files(&self, _lab_name: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_workdir(&self, _lab_name: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl HttpProbe for Cluster {
    async fn status(&self, _url: &str) -> Result<u16> {
        Ok(self.http_status)
    }
}

fn node(name: &str, labels: Value) -> (ResourceRef, Value) {
    (
        ResourceRef::cluster_scoped("v1", "Node", name),
        json!({
            "metadata": {"name": name, "labels": labels},
            "status": {"conditions": [{"type": "Ready", "status": "True"}]}
        }),
    )
}

/// Cluster state of a correctly solved review-cr1
fn review_cr1_solved(config: &LabConfig) -> Cluster {
    let mut cluster = Cluster::default();
    for name in &config.cluster.nodes {
        let labels = if config.cluster.workers.contains(name) {
            json!({"orgnet": "true"})
        } else {
            json!({})
        };
        let (resource, object) = node(name, labels);
        cluster = cluster.with(resource, object);
    }

    cluster
        .with(
            ResourceRef::namespaced(
                "hco.kubevirt.io/v1beta1",
                "HyperConverged",
                "kubevirt-hyperconverged",
                "openshift-cnv",
            ),
            json!({"status": {"conditions": [{"type": "Available", "status": "True"}]}}),
        )
        .with(
            ResourceRef::cluster_scoped("nmstate.io/v1", "NodeNetworkConfigurationPolicy", "br0"),
            json!({"spec": {
                "nodeSelector": {"orgnet": "true"},
                "desiredState": {"interfaces": [{
                    "name": "br0",
                    "type": "linux-bridge",
                    "bridge": {"port": [{"name": "ens4"}]}
                }]}
            }}),
        )
        .with(
            ResourceRef::namespaced(
                "k8s.cni.cncf.io/v1",
                "NetworkAttachmentDefinition",
                "ext-net",
                "review-cr1",
            ),
            json!({"spec": {"config": "{\"cniVersion\": \"0.3.1\", \"type\": \"cnv-bridge\", \"bridge\": \"br0\"}"}}),
        )
        .with(
            ResourceRef::namespaced("kubevirt.io/v1", "VirtualMachine", "web1", "review-cr1"),
            json!({
                "metadata": {"labels": {"vm.kubevirt.io/template": "rhel8-server-small"}},
                "spec": {"template": {"spec": {
                    "domain": {"devices": {"interfaces": [{"name": "default"}, {"name": "nic-0"}]}},
                    "networks": [
                        {"name": "default", "pod": {}},
                        {"name": "nic-0", "multus": {"networkName": "review-cr1/ext-net"}}
                    ]
                }}},
                "status": {"printableStatus": "Running"}
            }),
        )
}

fn labels(steps: &[Step]) -> Vec<&str> {
    steps.iter().map(|s| s.label.as_str()).collect()
}

// ============================================
// Registry
// ============================================

#[test]
fn test_registry_lists_every_lab() {
    let names: Vec<_> = all().iter().map(|l| l.name).collect();
    assert_eq!(
        names,
        ["review-cr1", "review-cr2", "review-cr3", "applications-review"]
    );

    let config = LabConfig::default();
    for lab in all() {
        for phase in Phase::ALL {
            let steps = lab.build_steps(phase, &config).unwrap();
            assert!(!steps.is_empty(), "{} {} has no steps", lab.name, phase);
        }
    }
}

#[test]
fn test_review_cr1_start_order() {
    let steps = find("review-cr1")
        .unwrap()
        .build_steps(Phase::Start, &LabConfig::default())
        .unwrap();

    assert_eq!(
        labels(&steps),
        [
            "Checking lab systems",
            "Pinging API",
            "Checking API",
            "Checking cluster readiness",
            "Checking CatalogSource",
            "Checking if the 'OpenShift Virtualization' operator is installed",
            "Checking if the 'NMstate' operator is installed",
            "Install the 'OpenShift Virtualization' operator",
            "Install the 'NMstate' operator",
            "Confirming virtctl availability",
            "Confirming virtctl availability",
            "Verifying worker node settings",
            "Disabling the 'ens4' interface on worker nodes",
            "Confirming that the 'review-cr1' project does not exist",
            "Creating the 'review-cr1' project",
            "Copying exercise content",
        ]
    );
    // only the operator probes may fail without stopping the start
    let non_fatal: Vec<_> = steps.iter().filter(|s| !s.fatal).map(|s| s.label.as_str()).collect();
    assert_eq!(non_fatal.len(), 2);
    assert!(steps.iter().all(|s| !s.grading));
}

#[test]
fn test_do316_grade_flags() {
    let config = LabConfig::default();
    for name in ["review-cr1", "review-cr2", "review-cr3"] {
        let steps = find(name).unwrap().build_steps(Phase::Grade, &config).unwrap();
        assert!(steps.iter().all(|s| s.grading), "{}", name);
        assert!(steps[..4].iter().all(|s| s.fatal), "{}", name);
        assert!(steps[4..].iter().all(|s| !s.fatal), "{}", name);
        assert_eq!(
            steps[3].label,
            "Check if the 'OpenShift Virtualization' operator is installed"
        );
    }
}

#[test]
fn test_review_cr3_grades_both_vms() {
    let steps = find("review-cr3")
        .unwrap()
        .build_steps(Phase::Grade, &LabConfig::default())
        .unwrap();
    let labels = labels(&steps);
    for vm in ["web1", "web2"] {
        assert!(labels.contains(&format!("The readiness probe is configured for '{}'", vm).as_str()));
        assert!(labels
            .contains(&format!("The '{}-documentroot' PVC is connected to VM '{}'", vm, vm).as_str()));
    }
    assert_eq!(labels.last(), Some(&"The web application is reachable from outside"));
}

#[test]
fn test_review_cr2_finish_uncordons_workers() {
    let steps = find("review-cr2")
        .unwrap()
        .build_steps(Phase::Finish, &LabConfig::default())
        .unwrap();
    let uncordon = steps
        .iter()
        .find(|s| s.label == "Mark worker nodes as schedulable (uncordon)")
        .unwrap();
    assert!(uncordon.fatal);
    match &uncordon.action {
        StepAction::Playbook { path, vars } => {
            assert_eq!(path, "ansible/playbooks/node-uncordon.yaml");
            assert_eq!(vars["nodes"], json!(["worker01", "worker02"]));
        }
        other => panic!("unexpected action {}", other.kind()),
    }
}

#[test]
fn test_applications_review_grade_is_fatal() {
    let steps = find("applications-review")
        .unwrap()
        .build_steps(Phase::Grade, &LabConfig::default())
        .unwrap();
    assert!(steps.iter().all(|s| s.fatal));
    assert_eq!(steps.iter().filter(|s| s.grading).count(), 7);
}

// ============================================
// Phase runs
// ============================================

#[tokio::test]
async fn test_review_cr1_solved_scores_100() {
    let config = LabConfig::default();
    let steps = find("review-cr1")
        .unwrap()
        .build_steps(Phase::Grade, &config)
        .unwrap();

    let caps = review_cr1_solved(&config).caps();
    let result = PhaseRunner::new(caps).run(Phase::Grade, &steps).await;
    assert!(result.is_completed());

    let report = GradeReport::from_run("review-cr1", &result).unwrap();
    assert_eq!(report.failures, Vec::<String>::new());
    assert_eq!(report.score, 100);
}

#[tokio::test]
async fn test_review_cr1_missing_vm_fails_vm_checks() {
    let config = LabConfig::default();
    let steps = find("review-cr1")
        .unwrap()
        .build_steps(Phase::Grade, &config)
        .unwrap();

    let mut cluster = review_cr1_solved(&config);
    cluster
        .objects
        .retain(|path, _| !path.ends_with("/virtualmachines/web1"));
    let result = PhaseRunner::new(cluster.caps()).run(Phase::Grade, &steps).await;

    let report = GradeReport::from_run("review-cr1", &result).unwrap();
    // running, template and NIC checks fail; the other eight pass
    assert_eq!(report.total, 11);
    assert_eq!(report.passed, 8);
    assert_eq!(report.score, 73);
    assert_eq!(report.failures.len(), 3);
    assert_eq!(report.failures[0], "The 'web1' VM is not running");
}

#[tokio::test]
async fn test_cluster_not_ready_aborts_grade() {
    let config = LabConfig::default();
    let steps = find("review-cr1")
        .unwrap()
        .build_steps(Phase::Grade, &config)
        .unwrap();

    let mut cluster = review_cr1_solved(&config);
    let (resource, object) = node("worker02", json!({"orgnet": "true"}));
    let mut object = object;
    object["status"]["conditions"][0]["status"] = json!("False");
    cluster.objects.insert(resource.path(), object);

    let result = PhaseRunner::new(cluster.caps()).run(Phase::Grade, &steps).await;
    assert!(result.is_aborted());
    assert_eq!(result.aborted_at().map(|o| o.index), Some(1));
    assert!(GradeReport::from_run("review-cr1", &result).is_err());
}

#[tokio::test]
async fn test_review_cr1_finish_runs_cleanup_in_order() {
    let config = LabConfig::default();
    let steps = find("review-cr1")
        .unwrap()
        .build_steps(Phase::Finish, &config)
        .unwrap();

    let cluster = Arc::new(review_cr1_solved(&config));
    let result = PhaseRunner::new(caps_of(cluster.clone()))
        .run(Phase::Finish, &steps)
        .await;
    // the project is already gone; deletion tolerates that
    assert!(result.is_completed());
    assert_eq!(
        cluster.calls(),
        [
            "utility: true",
            "ansible/playbooks/check-catalog-source.yaml",
            "ansible/review-cr1/finish_network.yml",
        ]
    );
}

// ============================================
// Custom checks
// ============================================

#[tokio::test]
async fn test_group_rights() {
    let bindings = ResourceRef::namespaced(
        "rbac.authorization.k8s.io/v1",
        "RoleBinding",
        "",
        "review-cr2",
    );
    let caps = Cluster::default()
        .with_items(
            bindings,
            vec![json!({
                "roleRef": {"kind": "ClusterRole", "name": "admin"},
                "subjects": [{"kind": "Group", "name": "vm-admins"}]
            })],
        )
        .caps();

    let check = |role: &str| GroupRights {
        namespace: "review-cr2".to_string(),
        group: "vm-admins".to_string(),
        role: role.to_string(),
    };
    assert!(check("admin").check(&caps).await.unwrap().passed());
    let result = check("kubevirt.io:edit").check(&caps).await.unwrap();
    assert_eq!(
        result.messages,
        ["The 'vm-admins' group does not have 'kubevirt.io:edit' rights in the 'review-cr2' project"]
    );
}

#[tokio::test]
async fn test_node_drained() {
    let check = NodeDrained {
        node: "worker02".to_string(),
        namespace: "review-cr2".to_string(),
    };
    let vmis = ResourceRef::namespaced("kubevirt.io/v1", "VirtualMachineInstance", "", "review-cr2");

    let drained = Cluster::default()
        .with(
            ResourceRef::cluster_scoped("v1", "Node", "worker02"),
            json!({"spec": {"unschedulable": true}}),
        )
        .with_items(
            vmis.clone(),
            vec![json!({"metadata": {"name": "web1"}, "status": {"nodeName": "worker01"}})],
        )
        .caps();
    assert!(check.check(&drained).await.unwrap().passed());

    let busy = Cluster::default()
        .with(ResourceRef::cluster_scoped("v1", "Node", "worker02"), json!({"spec": {}}))
        .with_items(
            vmis,
            vec![json!({"metadata": {"name": "web1"}, "status": {"nodeName": "worker02"}})],
        )
        .caps();
    let result = check.check(&busy).await.unwrap();
    assert_eq!(
        result.messages,
        [
            "The 'worker02' node is not cordoned off",
            "The 'web1' VM is still running on 'worker02'",
        ]
    );
}

#[tokio::test]
async fn test_vm_template_reports_every_mismatch() {
    let template = ResourceRef::namespaced(
        "template.openshift.io/v1",
        "Template",
        "dev-web-rhel8",
        "review-cr2",
    );
    let caps = Cluster::default()
        .with(
            template,
            json!({
                "metadata": {
                    "annotations": {"openshift.io/provider-display-name": "Red Hat Training"},
                    "labels": {
                        "os.template.kubevirt.io/rhel8": "true",
                        "flavor.template.kubevirt.io/small": "true",
                        "workload.template.kubevirt.io/server": "true"
                    }
                },
                "objects": [{"spec": {"dataVolumeTemplates": [{"spec": {
                    "source": {"http": {"url": "http://utility.lab.example.com:8080/openshift4/images/helloworld.qcow2"}},
                    "storage": {
                        "resources": {"requests": {"storage": "20Gi"}},
                        "storageClassName": "ocs-external-storagecluster-ceph-rbd-virtualization"
                    }
                }}]}}]
            }),
        )
        .caps();

    let check = VmTemplate {
        namespace: "review-cr2".to_string(),
        name: "dev-web-rhel8".to_string(),
        provider: "Red Hat Training".to_string(),
        os: "rhel8".to_string(),
        flavor: "tiny".to_string(),
        workload: "server".to_string(),
        disk_url: "http://utility.lab.example.com:8080/openshift4/images/helloworld.qcow2"
            .to_string(),
        disk_size: "10Gi".to_string(),
        storage_class: "ocs-external-storagecluster-ceph-rbd-virtualization".to_string(),
    };
    let result = check.check(&caps).await.unwrap();
    assert_eq!(
        result.messages,
        [
            "The template does not have the 'flavor.template.kubevirt.io/tiny' label",
            "The boot disk size is not 10Gi",
        ]
    );
}

#[tokio::test]
async fn test_registry_bucket_messages() {
    let config = ResourceRef::cluster_scoped(
        "imageregistry.operator.openshift.io/v1",
        "Config",
        "cluster",
    );
    let check = RegistryBucket {
        prefix: "noobaa-review-".to_string(),
    };

    let good = Cluster::default()
        .with(
            config.clone(),
            json!({"spec": {"storage": {"s3": {"bucket": "noobaa-review-3f1c"}}}}),
        )
        .caps();
    assert!(check.check(&good).await.unwrap().passed());

    let wrong = Cluster::default()
        .with(
            config,
            json!({"spec": {"storage": {"s3": {"bucket": "image-registry-xyz"}}}}),
        )
        .caps();
    assert_eq!(
        check.check(&wrong).await.unwrap().messages,
        ["Image registry is set to the wrong value. Please work through the lab instructions."]
    );

    let unset = Cluster::default().caps();
    assert_eq!(
        check.check(&unset).await.unwrap().messages,
        ["Image registry is not configured. Please work through the lab instructions."]
    );
}
