//! review-cr1: secondary networks for virtual machines
//!
//! The learner labels the worker nodes, creates a bridge on `ens4` with
//! NMState, exposes it as a network attachment and plugs `web1` into it.

use lab_cluster::ResourceRef;
use lab_common::Phase;
use lab_executor::{LabConfig, ResourceExpectation, Step, StepAction};

use super::TARGETS;
use crate::checks::{BridgePolicy, VmNic};
use crate::common::{self, NMSTATE, VIRTUALIZATION};

pub const NAME: &str = "review-cr1";
const NAMESPACE: &str = "review-cr1";

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
        common::operator_not_installed(&VIRTUALIZATION),
        common::operator_not_installed(&NMSTATE),
        common::install_operator(&VIRTUALIZATION),
        common::install_operator(&NMSTATE),
        common::virtctl(),
        common::virtctl(),
        Step::new(
            "Verifying worker node settings",
            StepAction::playbook("ansible/playbooks/verify-worker-nodes.yml"),
        )
        .fatal(),
        Step::new(
            "Disabling the 'ens4' interface on worker nodes",
            StepAction::playbook("ansible/playbooks/disable-ens4.yml"),
        )
        .fatal(),
        common::project_absent(NAMESPACE),
        common::create_project(NAME, NAMESPACE),
        common::copy_files(NAME),
    ]
}

fn grade(config: &LabConfig) -> Vec<Step> {
    let mut steps = common::cluster_preflight(TARGETS, config);
    steps.push(common::virtualization_ready());

    for node in &config.cluster.workers {
        steps.push(Step::new(
            format!("The '{}' node has the 'orgnet=true' label", node),
            StepAction::check(
                ResourceRef::cluster_scoped("v1", "Node", node),
                ResourceExpectation::field_equals(&["metadata", "labels", "orgnet"], "true"),
            ),
        ));
    }

    steps.extend([
        Step::new(
            "The 'NodeNetworkConfigurationPolicy' object exists",
            StepAction::custom(BridgePolicy {
                name: "br0".to_string(),
                port: "ens4".to_string(),
                label_key: "orgnet".to_string(),
                label_value: "true".to_string(),
            }),
        ),
        Step::new(
            "The 'ext-net' network attachment resource exists",
            StepAction::check(
                ResourceRef::namespaced(
                    "k8s.cni.cncf.io/v1",
                    "NetworkAttachmentDefinition",
                    "ext-net",
                    NAMESPACE,
                ),
                // spec.config is an embedded JSON document
                ResourceExpectation::field_matches(&["spec", "config"], r#""bridge"\s*:\s*"br0""#),
            ),
        ),
        common::vm_running(NAMESPACE, "web1"),
        common::vm_from_template(NAMESPACE, "web1", "RHEL8", "rhel8-server-small"),
        Step::new(
            "The 'web1' VM has a 'nic-0' network interface",
            StepAction::custom(VmNic {
                namespace: NAMESPACE.to_string(),
                vm: "web1".to_string(),
                nic: "nic-0".to_string(),
                attachment: "ext-net".to_string(),
            }),
        ),
    ]);

    steps.into_iter().map(Step::graded).collect()
}

fn finish(config: &LabConfig) -> Vec<Step> {
    let mut steps = common::cluster_preflight(TARGETS, config);
    steps.extend([
        Step::new(
            "Reverting node network settings",
            StepAction::playbook(format!("ansible/{}/finish_network.yml", NAME)),
        )
        .fatal(),
        common::delete_project(NAMESPACE),
        common::delete_files(NAME),
    ]);
    steps
}
