//! Shared step builders
//!
//! Steps that appear in more than one lab. Builders return plain steps;
//! callers add `.fatal()` / `.graded()` where the phase needs them.

use serde_json::json;

use lab_cluster::ResourceRef;
use lab_executor::{CommandCheck, LabConfig, ResourceExpectation, Step, StepAction};

use crate::checks::{ClusterReady, OperatorReady};

/// Operator installed through OLM
#[derive(Debug, Clone, Copy)]
pub struct Operator {
    /// Display name
    pub name: &'static str,
    pub namespace: &'static str,
    /// OLM package
    pub package: &'static str,
}

pub const VIRTUALIZATION: Operator = Operator {
    name: "OpenShift Virtualization",
    namespace: "openshift-cnv",
    package: "kubevirt-hyperconverged",
};

pub const NMSTATE: Operator = Operator {
    name: "NMstate",
    namespace: "openshift-nmstate",
    package: "kubernetes-nmstate-operator",
};

pub const NODE_MAINTENANCE: Operator = Operator {
    name: "Node Maintenance",
    namespace: "openshift-workload-availability",
    package: "node-maintenance-operator",
};

// ============================================
// Environment
// ============================================

pub fn lab_systems(targets: &[&str]) -> Step {
    Step::new(
        "Checking lab systems",
        StepAction::HostReachable {
            hosts: targets.iter().map(|h| h.to_string()).collect(),
        },
    )
    .fatal()
}

/// ICMP echo to the API host from the local machine
pub fn ping_api(config: &LabConfig) -> Step {
    Step::new(
        "Pinging API",
        StepAction::Command(
            CommandCheck::new(&["localhost"], "ping")
                .options(format!("-c 1 -W 5 {}", config.cluster.host))
                .returns(0)
                .failmsg(format!("Cannot ping {}", config.cluster.host)),
        ),
    )
    .fatal()
}

pub fn check_api() -> Step {
    Step::new("Checking API", StepAction::ApiReady).fatal()
}

pub fn cluster_ready(config: &LabConfig) -> Step {
    Step::new(
        "Checking cluster readiness",
        StepAction::custom(ClusterReady {
            nodes: config.cluster.nodes.clone(),
        }),
    )
    .fatal()
}

pub fn catalog_source() -> Step {
    Step::new(
        "Checking CatalogSource",
        StepAction::playbook("ansible/playbooks/check-catalog-source.yaml"),
    )
    .fatal()
}

/// System, readiness and catalog checks that open every DO316 phase
pub fn cluster_preflight(targets: &[&str], config: &LabConfig) -> Vec<Step> {
    vec![lab_systems(targets), cluster_ready(config), catalog_source()]
}

// ============================================
// Operators
// ============================================

/// Non-fatal probe; the install step that follows is idempotent
pub fn operator_not_installed(operator: &Operator) -> Step {
    Step::new(
        format!("Checking if the '{}' operator is installed", operator.name),
        StepAction::playbook_with_vars(
            "ansible/playbooks/fail-project-namespace-exists.yml",
            json!({ "target_namespace": operator.namespace }),
        ),
    )
}

pub fn install_operator(operator: &Operator) -> Step {
    Step::new(
        format!("Install the '{}' operator", operator.name),
        StepAction::playbook_with_vars(
            "ansible/playbooks/install-operator.yml",
            json!({
                "operator_name": operator.package,
                "operator_namespace": operator.namespace,
            }),
        ),
    )
    .fatal()
}

/// HyperConverged operand reports Available
pub fn virtualization_ready() -> Step {
    Step::new(
        format!("Check if the '{}' operator is installed", VIRTUALIZATION.name),
        StepAction::custom(OperatorReady {
            operator: VIRTUALIZATION.name.to_string(),
            resource: ResourceRef::namespaced(
                "hco.kubevirt.io/v1beta1",
                "HyperConverged",
                "kubevirt-hyperconverged",
                VIRTUALIZATION.namespace,
            ),
            condition: "Available".to_string(),
        }),
    )
    .fatal()
}

pub fn virtctl() -> Step {
    Step::new(
        "Confirming virtctl availability",
        StepAction::playbook("ansible/playbooks/deploy-virtctl.yml"),
    )
    .fatal()
}

// ============================================
// Projects and files
// ============================================

pub fn project(name: &str) -> ResourceRef {
    ResourceRef::cluster_scoped("project.openshift.io/v1", "Project", name)
}

pub fn project_absent(name: &str) -> Step {
    Step::new(
        format!("Confirming that the '{}' project does not exist", name),
        StepAction::check(project(name), ResourceExpectation::Absent),
    )
    .fatal()
}

/// Runs `ansible/<lab>/start_projects.yml`
pub fn create_project(lab: &str, name: &str) -> Step {
    Step::new(
        format!("Creating the '{}' project", name),
        StepAction::playbook(format!("ansible/{}/start_projects.yml", lab)),
    )
    .fatal()
}

pub fn delete_project(name: &str) -> Step {
    Step::new(
        format!("Deleting the '{}' project", name),
        StepAction::ResourceDelete {
            resource: project(name),
            missing_ok: true,
        },
    )
    .fatal()
}

pub fn copy_files(lab: &str) -> Step {
    Step::new(
        "Copying exercise content",
        StepAction::CopyLabFiles {
            lab_name: lab.to_string(),
        },
    )
    .fatal()
}

pub fn delete_files(lab: &str) -> Step {
    Step::new(
        "Deleting exercise files",
        StepAction::DeleteWorkdir {
            lab_name: lab.to_string(),
        },
    )
    .fatal()
}

// ============================================
// Virtual machines
// ============================================

pub fn virtual_machine(namespace: &str, name: &str) -> ResourceRef {
    ResourceRef::namespaced("kubevirt.io/v1", "VirtualMachine", name, namespace)
}

pub fn vm_running(namespace: &str, vm: &str) -> Step {
    Step::new(
        format!("The '{}' VM is running", vm),
        StepAction::check_or(
            virtual_machine(namespace, vm),
            ResourceExpectation::field_equals(&["status", "printableStatus"], "Running"),
            format!("The '{}' VM is not running", vm),
        ),
    )
}

/// `display` names the template in the label; `template` is the label value
pub fn vm_from_template(namespace: &str, vm: &str, display: &str, template: &str) -> Step {
    Step::new(
        format!("The '{}' VM was created from the '{}' template", vm, display),
        StepAction::check(
            virtual_machine(namespace, vm),
            ResourceExpectation::field_equals(
                &["metadata", "labels", "vm.kubevirt.io/template"],
                template,
            ),
        ),
    )
}
