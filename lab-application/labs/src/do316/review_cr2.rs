//! review-cr2: templates, access control and node maintenance

use serde_json::json;

use lab_common::Phase;
use lab_executor::{LabConfig, Step, StepAction};

use super::TARGETS;
use crate::checks::{GroupRights, NodeDrained, VmTemplate};
use crate::common::{self, NODE_MAINTENANCE, VIRTUALIZATION};

pub const NAME: &str = "review-cr2";
const NAMESPACE: &str = "review-cr2";
const TEMPLATE: &str = "dev-web-rhel8";
const GROUP: &str = "vm-admins";
const DRAINED_NODE: &str = "worker02";

pub fn build_steps(phase: Phase, config: &LabConfig) -> Vec<Step> {
    match phase {
        Phase::Start => start(config),
        Phase::Grade => grade(config),
        Phase::Finish => finish(config),
    }
}

fn start(config: &LabConfig) -> Vec<Step> {
    vec![
        common::lab_systems(TARGETS),
        common::ping_api(config),
        common::check_api(),
        common::cluster_ready(config),
        common::catalog_source(),
        common::install_operator(&VIRTUALIZATION),
        common::install_operator(&NODE_MAINTENANCE),
        common::virtctl(),
        common::project_absent(NAMESPACE),
        common::create_project(NAME, NAMESPACE),
        common::copy_files(NAME),
    ]
}

fn grade(config: &LabConfig) -> Vec<Step> {
    let mut steps = common::cluster_preflight(TARGETS, config);
    steps.push(common::virtualization_ready());

    steps.push(Step::new(
        format!("The '{}' virtual machine template exists", TEMPLATE),
        StepAction::custom(VmTemplate {
            namespace: NAMESPACE.to_string(),
            name: TEMPLATE.to_string(),
            provider: "Red Hat Training".to_string(),
            os: "rhel8".to_string(),
            flavor: "tiny".to_string(),
            workload: "server".to_string(),
            disk_url: "http://utility.lab.example.com:8080/openshift4/images/helloworld.qcow2"
                .to_string(),
            disk_size: "10Gi".to_string(),
            storage_class: "ocs-external-storagecluster-ceph-rbd-virtualization".to_string(),
        }),
    ));

    for role in ["admin", "kubevirt.io:edit"] {
        steps.push(Step::new(
            format!("The '{}' group has '{}' rights", GROUP, role),
            StepAction::custom(GroupRights {
                namespace: NAMESPACE.to_string(),
                group: GROUP.to_string(),
                role: role.to_string(),
            }),
        ));
    }

    steps.extend([
        common::vm_running(NAMESPACE, "web1"),
        common::vm_from_template(NAMESPACE, "web1", TEMPLATE, TEMPLATE),
        Step::new(
            format!("The '{}' node is cordoned off and drained", DRAINED_NODE),
            StepAction::custom(NodeDrained {
                node: DRAINED_NODE.to_string(),
                namespace: NAMESPACE.to_string(),
            }),
        ),
    ]);

    steps.into_iter().map(Step::graded).collect()
}

fn finish(config: &LabConfig) -> Vec<Step> {
    let mut steps = common::cluster_preflight(TARGETS, config);
    steps.extend([
        Step::new(
            "Mark worker nodes as schedulable (uncordon)",
            StepAction::playbook_with_vars(
                "ansible/playbooks/node-uncordon.yaml",
                json!({ "nodes": config.cluster.workers }),
            ),
        )
        .fatal(),
        common::delete_project(NAMESPACE),
        common::delete_files(NAME),
    ]);
    steps
}
