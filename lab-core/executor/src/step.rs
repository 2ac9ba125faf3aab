//! Step model
//!
//! A phase is an ordered `Vec<Step>`. Steps are plain data; the runner
//! dispatches on the `StepAction` variant.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use lab_cluster::ResourceRef;

use crate::capability::CustomCheck;

/// One unit of work in a phase
#[derive(Debug, Clone)]
pub struct Step {
    /// Display text
    pub label: String,

    /// What to do
    pub action: StepAction,

    /// Abort the phase when this step fails
    pub fatal: bool,

    /// Count this step toward the grade
    pub grading: bool,
}

impl Step {
    /// Create a non-fatal, ungraded step
    pub fn new(label: impl Into<String>, action: StepAction) -> Self {
        Self {
            label: label.into(),
            action,
            fatal: false,
            grading: false,
        }
    }

    /// Mark the step fatal
    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    /// Mark the step as graded
    pub fn graded(mut self) -> Self {
        self.grading = true;
        self
    }
}

/// Step action, one variant per capability shape
#[derive(Debug, Clone)]
pub enum StepAction {
    /// Every host accepts a login
    HostReachable { hosts: Vec<String> },

    /// Run a command and compare exit code and/or output
    Command(CommandCheck),

    /// Query one cluster object
    ResourceCheck {
        resource: ResourceRef,
        expectation: ResourceExpectation,
        failmsg: Option<String>,
    },

    /// Delete one cluster object
    ResourceDelete {
        resource: ResourceRef,
        /// Treat an already missing object as success
        missing_ok: bool,
    },

    /// Run an automation playbook
    Playbook {
        path: String,
        vars: Map<String, Value>,
    },

    /// Cluster API readiness probe
    ApiReady,

    /// Copy exercise material into the student work directory
    CopyLabFiles { lab_name: String },

    /// Remove the student work directory
    DeleteWorkdir { lab_name: String },

    /// Lab-provided check
    Custom(Arc<dyn CustomCheck>),
}

impl StepAction {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::HostReachable { .. } => "host_reachable",
            StepAction::Command(_) => "command",
            StepAction::ResourceCheck { .. } => "resource_check",
            StepAction::ResourceDelete { .. } => "resource_delete",
            StepAction::Playbook { .. } => "playbook",
            StepAction::ApiReady => "api_ready",
            StepAction::CopyLabFiles { .. } => "copy_lab_files",
            StepAction::DeleteWorkdir { .. } => "delete_workdir",
            StepAction::Custom(_) => "custom",
        }
    }

    /// Playbook action without extra vars
    pub fn playbook(path: impl Into<String>) -> Self {
        StepAction::Playbook {
            path: path.into(),
            vars: Map::new(),
        }
    }

    /// Playbook action with extra vars
    ///
    /// Anything that does not serialize to a JSON object yields no vars.
    pub fn playbook_with_vars(path: impl Into<String>, vars: Value) -> Self {
        let vars = match vars {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        StepAction::Playbook {
            path: path.into(),
            vars,
        }
    }

    /// Resource check without a custom failure message
    pub fn check(resource: ResourceRef, expectation: ResourceExpectation) -> Self {
        StepAction::ResourceCheck {
            resource,
            expectation,
            failmsg: None,
        }
    }

    /// Resource check with a custom failure message
    pub fn check_or(
        resource: ResourceRef,
        expectation: ResourceExpectation,
        failmsg: impl Into<String>,
    ) -> Self {
        StepAction::ResourceCheck {
            resource,
            expectation,
            failmsg: Some(failmsg.into()),
        }
    }

    /// Wrap a lab-provided check
    pub fn custom(check: impl CustomCheck + 'static) -> Self {
        StepAction::Custom(Arc::new(check))
    }
}

/// Command check parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandCheck {
    /// Lab host names; `localhost` runs locally
    pub hosts: Vec<String>,

    /// Command
    pub command: String,

    /// Arguments appended to the command
    #[serde(default)]
    pub options: String,

    /// Expected exit code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<i32>,

    /// Text stdout must contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prints: Option<String>,

    /// Message shown instead of the default diagnostic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failmsg: Option<String>,
}

impl CommandCheck {
    pub fn new(hosts: &[&str], command: impl Into<String>) -> Self {
        Self {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }

    pub fn returns(mut self, code: i32) -> Self {
        self.returns = Some(code);
        self
    }

    pub fn prints(mut self, text: impl Into<String>) -> Self {
        self.prints = Some(text.into());
        self
    }

    pub fn failmsg(mut self, msg: impl Into<String>) -> Self {
        self.failmsg = Some(msg.into());
        self
    }

    /// Command line as run on the host
    pub fn command_line(&self) -> String {
        if self.options.trim().is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.options)
        }
    }
}

/// Expected state of a cluster object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceExpectation {
    Exists,
    Absent,
    /// Field equals a JSON value
    FieldEquals { path: FieldPath, value: Value },
    /// Field, rendered as text, contains a substring
    FieldContains { path: FieldPath, value: String },
    /// Field, rendered as text, matches a regular expression
    FieldMatches { path: FieldPath, pattern: String },
}

impl ResourceExpectation {
    pub fn field_equals(path: &[&str], value: impl Into<Value>) -> Self {
        ResourceExpectation::FieldEquals {
            path: FieldPath::new(path),
            value: value.into(),
        }
    }

    pub fn field_contains(path: &[&str], value: impl Into<String>) -> Self {
        ResourceExpectation::FieldContains {
            path: FieldPath::new(path),
            value: value.into(),
        }
    }

    pub fn field_matches(path: &[&str], pattern: impl Into<String>) -> Self {
        ResourceExpectation::FieldMatches {
            path: FieldPath::new(path),
            pattern: pattern.into(),
        }
    }
}

/// Path into a JSON object as explicit segments
///
/// Label keys such as `vm.kubevirt.io/template` contain dots, so paths are
/// never split on `.`. A numeric segment indexes into an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Resolve the path; `None` when any segment is missing
    pub fn lookup<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.0.iter().try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            if segment.contains('.') || segment.contains('/') {
                write!(f, "[{}]", segment)?;
            } else {
                write!(f, ".{}", segment)?;
            }
        }
        Ok(())
    }
}

/// Render a JSON value the way it reads in a message: strings unquoted
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
