//! Lab common types
//!
//! Types shared between the step executor, the lab scripts and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lab lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Provision and verify preconditions
    Start,
    /// Assess student work
    Grade,
    /// Tear down and clean up
    Finish,
}

impl Phase {
    /// All phases, in lifecycle order
    pub const ALL: [Phase; 3] = [Phase::Start, Phase::Grade, Phase::Finish];

    /// Label shown in front of every step line ("Starting: ...")
    pub fn action_label(&self) -> &'static str {
        match self {
            Phase::Start => "Starting",
            Phase::Grade => "Grading",
            Phase::Finish => "Finishing",
        }
    }

    /// Subcommand name
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Grade => "grade",
            Phase::Finish => "finish",
        }
    }

    /// Whether a completed run of this phase yields a grade report
    pub fn is_grading(&self) -> bool {
        matches!(self, Phase::Grade)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" | "starting" => Ok(Phase::Start),
            "grade" | "grading" => Ok(Phase::Grade),
            "finish" | "finishing" => Ok(Phase::Finish),
            other => Err(format!("unknown phase: {}", other)),
        }
    }
}

/// Outcome of one step execution
///
/// Produced exactly once per executed step; the runner never mutates it
/// after the action returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Whether the step failed
    pub failed: bool,

    /// Human-readable diagnostics, in the order they were produced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

impl StepResult {
    /// Passing result without messages
    pub fn pass() -> Self {
        Self {
            failed: false,
            messages: Vec::new(),
        }
    }

    /// Failing result with a single message
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            failed: true,
            messages: vec![message.into()],
        }
    }

    /// Fails when `messages` is non-empty, passes otherwise
    pub fn from_failures(messages: Vec<String>) -> Self {
        Self {
            failed: !messages.is_empty(),
            messages,
        }
    }

    /// Whether the step passed
    pub fn passed(&self) -> bool {
        !self.failed
    }
}

/// Phase run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Steps are still executing
    Running,
    /// A fatal step failed; terminal
    Aborted,
    /// Every step executed; terminal
    Completed,
}

impl RunState {
    /// Whether the state is terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Running)
    }
}
