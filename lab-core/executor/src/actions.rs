//! Step action dispatch
//!
//! Every capability error is absorbed here; `execute_action` never fails.

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use lab_cluster::ResourceRef;
use lab_common::StepResult;

use crate::capability::Capabilities;
use crate::step::{value_text, CommandCheck, ResourceExpectation, StepAction};
use crate::Result;

/// Execute one action and describe the outcome
pub async fn execute_action(action: &StepAction, caps: &Capabilities) -> StepResult {
    debug!("executing {} action", action.kind());

    match action {
        StepAction::HostReachable { hosts } => host_reachable(hosts, caps).await,
        StepAction::Command(check) => command_check(check, caps).await,
        StepAction::ResourceCheck {
            resource,
            expectation,
            failmsg,
        } => absorb(
            resource_check(resource, expectation, failmsg.as_deref(), caps).await,
        ),
        StepAction::ResourceDelete {
            resource,
            missing_ok,
        } => resource_delete(resource, *missing_ok, caps).await,
        StepAction::Playbook { path, vars } => match caps.playbooks.run(path, vars).await {
            Ok(()) => StepResult::pass(),
            Err(e) => StepResult::fail(e.to_string()),
        },
        StepAction::ApiReady => match caps.resources.ready().await {
            Ok(()) => StepResult::pass(),
            Err(e) => StepResult::fail(format!("The cluster API is not ready: {}", e)),
        },
        StepAction::CopyLabFiles { lab_name } => {
            match caps.files.copy_lab_files(lab_name).await {
                Ok(()) => StepResult::pass(),
                Err(e) => StepResult::fail(format!("Failed copying files for {}: {}", lab_name, e)),
            }
        }
        StepAction::DeleteWorkdir { lab_name } => {
            match caps.files.delete_workdir(lab_name).await {
                Ok(()) => StepResult::pass(),
                Err(e) => StepResult::fail(format!("Failed deleting files for {}: {}", lab_name, e)),
            }
        }
        StepAction::Custom(check) => absorb(check.check(caps).await),
    }
}

/// Unexpected capability errors become a failed step
fn absorb(result: Result<StepResult>) -> StepResult {
    result.unwrap_or_else(|e| {
        warn!("step action error: {}", e);
        StepResult::fail(format!("Unexpected error: {}", e))
    })
}

async fn host_reachable(hosts: &[String], caps: &Capabilities) -> StepResult {
    let mut failures = Vec::new();
    for host in hosts {
        if let Err(e) = caps.commands.ping(host).await {
            debug!("{} unreachable: {}", host, e);
            failures.push(format!("Host {} is not reachable", host));
        }
    }
    StepResult::from_failures(failures)
}

async fn command_check(check: &CommandCheck, caps: &Capabilities) -> StepResult {
    let command_line = check.command_line();
    let mut failures = Vec::new();

    for host in &check.hosts {
        let diagnostic = match caps.commands.run(host, &command_line).await {
            Err(e) => Some(format!("{}: '{}' could not run: {}", host, command_line, e)),
            Ok(output) => mismatch(check, &output),
        }
        .map(|detail| {
            debug!("{}: {}", host, detail);
            format!("{}: {}", host, detail)
        });

        if let Some(diagnostic) = diagnostic {
            match &check.failmsg {
                Some(msg) => {
                    if !failures.contains(msg) {
                        failures.push(msg.clone());
                    }
                }
                None => failures.push(diagnostic),
            }
        }
    }

    StepResult::from_failures(failures)
}

/// Describes how the output differs from the expectation
fn mismatch(check: &CommandCheck, output: &lab_ssh_executor::CommandOutput) -> Option<String> {
    if let Some(expected) = check.returns {
        if output.exit_code != Some(expected) {
            let observed = output
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Some(format!(
                "'{}' returned {}, expected {}",
                check.command_line(),
                observed,
                expected
            ));
        }
    }
    if let Some(expected) = &check.prints {
        if !output.stdout.contains(expected.as_str()) {
            return Some(format!(
                "'{}' did not print '{}'",
                check.command_line(),
                expected
            ));
        }
    }
    None
}

async fn resource_check(
    resource: &ResourceRef,
    expectation: &ResourceExpectation,
    failmsg: Option<&str>,
    caps: &Capabilities,
) -> Result<StepResult> {
    let fail = |default: String| StepResult::fail(failmsg.map(str::to_string).unwrap_or(default));

    let object = match expectation {
        ResourceExpectation::Exists => {
            return Ok(if caps.resources.exists(resource).await? {
                StepResult::pass()
            } else {
                fail(missing_message(resource))
            });
        }
        ResourceExpectation::Absent => {
            return Ok(if caps.resources.exists(resource).await? {
                fail(format!(
                    "The {} {} already exists",
                    resource.name, resource.kind
                ))
            } else {
                StepResult::pass()
            });
        }
        _ => match caps.resources.get(resource).await? {
            Some(object) => object,
            None => return Ok(fail(missing_message(resource))),
        },
    };

    let outcome = match expectation {
        ResourceExpectation::FieldEquals { path, value } => match path.lookup(&object) {
            Some(actual) if actual == value => None,
            Some(actual) => Some(format!(
                "{} {}{} is '{}', expected '{}'",
                resource.kind,
                resource.name,
                path,
                value_text(actual),
                value_text(value)
            )),
            None => Some(unset_message(resource, &path.to_string())),
        },
        ResourceExpectation::FieldContains { path, value } => match path.lookup(&object) {
            Some(actual) if value_text(actual).contains(value.as_str()) => None,
            Some(actual) => Some(format!(
                "{} {}{} is '{}', which does not contain '{}'",
                resource.kind,
                resource.name,
                path,
                value_text(actual),
                value
            )),
            None => Some(unset_message(resource, &path.to_string())),
        },
        ResourceExpectation::FieldMatches { path, pattern } => {
            let regex = match Regex::new(pattern) {
                Ok(regex) => regex,
                Err(e) => return Ok(StepResult::fail(format!("Invalid pattern '{}': {}", pattern, e))),
            };
            match path.lookup(&object) {
                Some(actual) if regex.is_match(&value_text(actual)) => None,
                Some(actual) => Some(format!(
                    "{} {}{} is '{}', which does not match '{}'",
                    resource.kind,
                    resource.name,
                    path,
                    value_text(actual),
                    pattern
                )),
                None => Some(unset_message(resource, &path.to_string())),
            }
        }
        ResourceExpectation::Exists | ResourceExpectation::Absent => None,
    };

    Ok(match outcome {
        None => StepResult::pass(),
        Some(default) => fail(default),
    })
}

async fn resource_delete(resource: &ResourceRef, missing_ok: bool, caps: &Capabilities) -> StepResult {
    match caps.resources.delete(resource).await {
        Ok(()) => StepResult::pass(),
        Err(e) if missing_ok && e.is_not_found() => {
            debug!("{} already gone", resource);
            StepResult::pass()
        }
        Err(e) => StepResult::fail(format!("Failed removing {}: {}", resource.kind, e)),
    }
}

fn missing_message(resource: &ResourceRef) -> String {
    format!(
        "The {} {} does not exist, please work through the lab instructions",
        resource.name, resource.kind
    )
}

fn unset_message(resource: &ResourceRef, path: &str) -> String {
    format!("{} {}{} is not set", resource.kind, resource.name, path)
}
