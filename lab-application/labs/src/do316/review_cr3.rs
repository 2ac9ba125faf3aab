//! review-cr3: health probes, persistent storage and services

use lab_cluster::ResourceRef;
use lab_common::Phase;
use lab_executor::{LabConfig, ResourceExpectation, Step, StepAction};

use super::TARGETS;
use crate::checks::{HttpStatus, ServiceCheck, VmReadinessProbe, VmVolumeClaim};
use crate::common::{self, VIRTUALIZATION};

pub const NAME: &str = "review-cr3";
const NAMESPACE: &str = "review-cr3";
const WEB_VMS: [&str; 2] = ["web1", "web2"];

pub fn build_steps(phase: Phase, config: &LabConfig) -> Vec<Step> {
    match phase {
        Phase::Start => start(config),
        Phase::Grade => grade(config),
        Phase::Finish => finish(config),
    }
}

fn playbook(label: &str, file: &str) -> Step {
    Step::new(label, StepAction::playbook(format!("ansible/{}/{}", NAME, file)))
}

fn start(config: &LabConfig) -> Vec<Step> {
    vec![
        common::lab_systems(TARGETS),
        common::ping_api(config),
        common::check_api(),
        common::cluster_ready(config),
        common::catalog_source(),
        common::install_operator(&VIRTUALIZATION),
        common::virtctl(),
        common::project_absent(NAMESPACE),
        playbook("Preparing the disk images on the 'utility' machine", "start_image.yml").fatal(),
        playbook("Creating the data volumes", "start_data_volumes.yml").fatal(),
        playbook("Creating the 'golden-web' virtual machine", "golden-web.yml").fatal(),
        common::copy_files(NAME),
    ]
}

fn grade(config: &LabConfig) -> Vec<Step> {
    let mut steps = common::cluster_preflight(TARGETS, config);
    steps.push(common::virtualization_ready());

    for vm in WEB_VMS {
        let claim = format!("{}-documentroot", vm);
        steps.extend([
            common::vm_running(NAMESPACE, vm),
            Step::new(
                format!("The readiness probe is configured for '{}'", vm),
                StepAction::custom(VmReadinessProbe {
                    namespace: NAMESPACE.to_string(),
                    vm: vm.to_string(),
                    path: "/cgi-bin/health".to_string(),
                    port: 80,
                    period: 5,
                    failures: 2,
                }),
            ),
            Step::new(
                format!("The '{}' PVC is connected to VM '{}'", claim, vm),
                StepAction::custom(VmVolumeClaim {
                    namespace: NAMESPACE.to_string(),
                    vm: vm.to_string(),
                    claim,
                }),
            ),
            Step::new(
                format!("The '{}' VM has the 'tier=front' label", vm),
                StepAction::check(
                    common::virtual_machine(NAMESPACE, vm),
                    ResourceExpectation::field_equals(
                        &["spec", "template", "metadata", "labels", "tier"],
                        "front",
                    ),
                ),
            ),
        ]);
    }

    steps.extend([
        Step::new(
            "The 'web1-snap1' snapshot exists",
            StepAction::check(
                ResourceRef::namespaced(
                    "snapshot.kubevirt.io/v1beta1",
                    "VirtualMachineSnapshot",
                    "web1-snap1",
                    NAMESPACE,
                ),
                ResourceExpectation::field_equals(&["spec", "source", "name"], "web1"),
            ),
        ),
        Step::new(
            "The 'front' service exists",
            StepAction::custom(ServiceCheck {
                namespace: NAMESPACE.to_string(),
                name: "front".to_string(),
                service_type: "ClusterIP".to_string(),
                selector_key: "tier".to_string(),
                selector_value: "front".to_string(),
                port: 80,
                target_port: 80,
                protocol: "TCP".to_string(),
            }),
        ),
        Step::new(
            "The web application is reachable from outside",
            StepAction::custom(HttpStatus {
                url: format!("http://front-{}.{}", NAMESPACE, config.cluster.apps_domain),
                code: 200,
            }),
        ),
    ]);

    steps.into_iter().map(Step::graded).collect()
}

fn finish(config: &LabConfig) -> Vec<Step> {
    let mut steps = common::cluster_preflight(TARGETS, config);
    steps.extend([
        common::delete_project(NAMESPACE),
        playbook("Removing the disk images from the 'utility' machine", "finish_image.yml").fatal(),
        common::delete_files(NAME),
    ]);
    steps
}
