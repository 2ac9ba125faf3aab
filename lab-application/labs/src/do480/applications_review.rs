//! applications-review: deploying an application with RHACM placement
//!
//! Most checks run `oc` on the workstation against the hub and the
//! managed cluster in turn.

use lab_cluster::ResourceRef;
use lab_common::Phase;
use lab_executor::{CommandCheck, LabConfig, ResourceExpectation, Step, StepAction};

use super::TARGETS;
use crate::checks::RegistryBucket;
use crate::common;

pub const NAME: &str = "applications-review";
const NAMESPACE: &str = "mysql";
const MANAGED_API: &str = "https://api.ocp4-mng.example.com:6443";
const MYSQL_IMAGE: &str = "registry.redhat.io/rhel8/mysql-80:1-156";
const TODO_IMAGE: &str = "quay.io/redhattraining/todo-single:v1.0";
const ACM_NAMESPACE: &str = "open-cluster-management";
const CLUSTERS: [&str; 2] = ["managed-cluster", "local-cluster"];

pub fn build_steps(phase: Phase, config: &LabConfig) -> Vec<Step> {
    match phase {
        Phase::Start => start(config),
        Phase::Grade => grade(config),
        Phase::Finish => finish(config),
    }
}

fn oc(label: impl Into<String>, check: CommandCheck) -> Step {
    Step::new(label, StepAction::Command(check)).fatal()
}

fn workstation(command: &str, options: impl Into<String>) -> CommandCheck {
    CommandCheck::new(&["workstation"], command).options(options)
}

fn login(label: &str, config: &LabConfig, api: &str) -> Step {
    oc(
        label,
        workstation(
            "oc login",
            format!("-u {} -p {} {}", config.cluster.user, config.cluster.password, api),
        )
        .returns(0),
    )
}

fn login_managed(config: &LabConfig) -> Step {
    login("Verifying connectivity to the OCP4 managed cluster", config, MANAGED_API)
}

fn login_hub(config: &LabConfig) -> Step {
    login("Verifying connectivity to the OCP4 hub cluster", config, &config.api_url())
}

fn logout() -> Step {
    oc("Logging out", workstation("oc logout", "").returns(0))
}

fn remove_labels() -> Vec<Step> {
    CLUSTERS
        .iter()
        .map(|cluster| {
            oc(
                format!("Removing the environment label from {}", cluster),
                workstation(
                    "oc label managedclusters",
                    format!("{} environment- --overwrite", cluster),
                )
                .returns(0),
            )
        })
        .collect()
}

fn playbook(label: &str, file: &str) -> Step {
    Step::new(label, StepAction::playbook(format!("ansible/common/{}", file))).fatal()
}

fn start(config: &LabConfig) -> Vec<Step> {
    let mut steps = vec![
        common::lab_systems(TARGETS),
        playbook("Checking that the OCP hub is up and ready", "ocp_cluster_up_and_ready.yaml"),
        playbook("Checking that RHACM is installed. Installing if needed", "acm_install.yaml"),
        playbook(
            "Checking that MulticlusterHub is deployed. Deploying if needed",
            "acm_create_multiclusterhub.yaml",
        ),
        playbook("Importing the managed clusters", "acm_import_cluster2.yaml"),
        login_managed(config),
        oc(
            "Project `mysql` is not present",
            workstation("oc get projects", NAMESPACE).returns(1).failmsg(format!(
                "The {} project already exists, please delete it or run 'lab finish {}' before starting this GE",
                NAMESPACE, NAME
            )),
        ),
        login_hub(config),
        oc(
            "Verifying RHACM Operator deployment",
            workstation("oc get csv", format!("-n {}", ACM_NAMESPACE))
                .prints("Succeeded")
                .failmsg("Install the RHACM Operator"),
        ),
        oc(
            "Verifying RHACM MultiClusterHub deployment",
            workstation("oc get multiclusterhub", format!("-n {}", ACM_NAMESPACE))
                .prints("Running")
                .failmsg("Create the MultiClusterHub object"),
        ),
        oc(
            "Verifying the availability of the local-cluster",
            workstation("oc get managedclusters", "")
                .prints("local-cluster")
                .failmsg("Create the MultiClusterHub object"),
        ),
        oc(
            "Verifying the availability of the managed-cluster",
            workstation("oc get managedclusters", "")
                .prints("managed-cluster")
                .failmsg("Import the managed-cluster into RHACM"),
        ),
        Step::new(
            "Project 'mysql' is not present",
            StepAction::check(common::project(NAMESPACE), ResourceExpectation::Absent),
        )
        .fatal(),
    ];
    steps.extend(remove_labels());
    steps.push(logout());
    steps
}

fn grade(config: &LabConfig) -> Vec<Step> {
    let deployment = ResourceRef::namespaced("apps/v1", "Deployment", NAMESPACE, NAMESPACE);

    vec![
        Step::new(
            "Project 'mysql' is present",
            StepAction::check(
                ResourceRef::cluster_scoped("v1", "Namespace", NAMESPACE),
                ResourceExpectation::Exists,
            ),
        )
        .fatal()
        .graded(),
        Step::new(
            "Deployment 'mysql' is present",
            StepAction::check(deployment.clone(), ResourceExpectation::Exists),
        )
        .fatal()
        .graded(),
        Step::new(
            format!("Image '{}' is present", MYSQL_IMAGE),
            StepAction::check(
                deployment,
                ResourceExpectation::field_contains(
                    &["spec", "template", "spec", "containers", "0", "image"],
                    MYSQL_IMAGE,
                ),
            ),
        )
        .fatal()
        .graded(),
        Step::new(
            "PlacementRule 'mysql-placement-1' is present",
            StepAction::check(
                ResourceRef::namespaced(
                    "apps.open-cluster-management.io/v1",
                    "PlacementRule",
                    "mysql-placement-1",
                    NAMESPACE,
                ),
                ResourceExpectation::field_equals(
                    &["spec", "clusterSelector", "matchLabels", "environment"],
                    "development",
                ),
            ),
        )
        .fatal()
        .graded(),
        Step::new(
            "Checking image registry config",
            StepAction::custom(RegistryBucket {
                prefix: "noobaa-review-".to_string(),
            }),
        )
        .fatal()
        .graded(),
        login("Verifying connectivity to OCP4 hub cluster", config, &config.api_url()),
        login("Verifying connectivity to OCP4 managed cluster", config, MANAGED_API),
        oc(
            "Verifying that the deployment has the correct image",
            workstation(
                "oc get deployments",
                format!(
                    "-n {} -o jsonpath='{{.items[*].spec.template.spec.containers[*].image}}'",
                    NAMESPACE
                ),
            )
            .prints(format!("{} {}", TODO_IMAGE, MYSQL_IMAGE))
            .failmsg("Fix the deployment to use the correct image"),
        )
        .graded(),
        oc(
            "Verifying that the deployment runs one replica",
            workstation(
                "oc get deployment",
                format!("{} -n {} -o jsonpath='{{.status.replicas}}'", NAMESPACE, NAMESPACE),
            )
            .prints("1")
            .failmsg("Fix the deployment to run with 1 replica"),
        )
        .graded(),
        logout(),
    ]
}

fn finish(config: &LabConfig) -> Vec<Step> {
    let script = config
        .files
        .materials_dir
        .join(NAME)
        .join("delete_project.sh");

    let mut steps = vec![
        login_managed(config),
        oc(
            "Removing the mysql namespace",
            CommandCheck::new(&["workstation"], script.display().to_string()).returns(0),
        ),
        login("Verifying connectivity to the OCP4 cluster", config, &config.api_url()),
        Step::new(
            "Removing the mysql namespace",
            StepAction::ResourceDelete {
                resource: common::project(NAMESPACE),
                missing_ok: true,
            },
        ),
    ];
    steps.extend(remove_labels());
    steps.push(logout());
    steps
}
