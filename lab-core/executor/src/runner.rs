//! Phase runner

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use lab_common::{Phase, RunState, StepResult};

use crate::actions::execute_action;
use crate::capability::Capabilities;
use crate::step::Step;

/// Receives progress while a phase runs
pub trait PhaseObserver: Send {
    /// Called before the step's action runs
    fn step_started(&mut self, phase: Phase, step: &Step);

    /// Called with the step's result
    fn step_finished(&mut self, phase: Phase, step: &Step, result: &StepResult);

    /// Called after a fatal step failed; no further steps run
    fn phase_aborted(&mut self, _phase: Phase, _step: &Step) {}
}

/// Observer that ignores everything
#[derive(Debug, Default)]
pub struct NoopObserver;

impl PhaseObserver for NoopObserver {
    fn step_started(&mut self, _phase: Phase, _step: &Step) {}

    fn step_finished(&mut self, _phase: Phase, _step: &Step, _result: &StepResult) {}
}

/// Phase runner
///
/// Executes steps strictly in order, one at a time. Holds no state between
/// runs.
pub struct PhaseRunner {
    /// Capabilities passed to every action
    caps: Capabilities,

    /// Progress receiver
    observer: Box<dyn PhaseObserver>,
}

impl PhaseRunner {
    /// Create a runner without an observer
    pub fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            observer: Box::new(NoopObserver),
        }
    }

    /// Set the progress receiver
    pub fn with_observer(mut self, observer: Box<dyn PhaseObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run one phase
    ///
    /// Stops at the first failing fatal step (`RunState::Aborted`); otherwise
    /// visits every step exactly once (`RunState::Completed`).
    pub async fn run(&mut self, phase: Phase, steps: &[Step]) -> RunResult {
        info!("{} phase: {} steps", phase.action_label(), steps.len());

        let mut result = RunResult::new(phase);

        for (index, step) in steps.iter().enumerate() {
            debug!(
                "step {}/{}: {} ({})",
                index + 1,
                steps.len(),
                step.label,
                step.action.kind()
            );
            self.observer.step_started(phase, step);

            let start_time = Instant::now();
            let step_result = execute_action(&step.action, &self.caps).await;
            let duration_ms = start_time.elapsed().as_millis() as u64;

            self.observer.step_finished(phase, step, &step_result);

            let abort = step_result.failed && step.fatal;
            if step_result.failed {
                info!("step {} failed: {:?}", index + 1, step_result.messages);
            }

            result.outcomes.push(StepOutcome {
                index,
                label: step.label.clone(),
                fatal: step.fatal,
                grading: step.grading,
                result: step_result,
                duration_ms,
            });

            if abort {
                warn!("fatal step '{}' failed, aborting {}", step.label, phase);
                self.observer.phase_aborted(phase, step);
                result.state = RunState::Aborted;
                break;
            }
        }

        if result.state == RunState::Running {
            result.state = RunState::Completed;
        }
        result.finished_at = Utc::now();

        info!(
            "{} phase {:?}: {}/{} steps passed",
            phase.action_label(),
            result.state,
            result.passed_count(),
            result.outcomes.len()
        );

        result
    }
}

/// Result of one phase run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Phase that ran
    pub phase: Phase,

    /// Terminal state
    pub state: RunState,

    /// One entry per executed step, in execution order
    pub outcomes: Vec<StepOutcome>,

    /// Start time
    pub started_at: DateTime<Utc>,

    /// End time
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    fn new(phase: Phase) -> Self {
        let now = Utc::now();
        Self {
            phase,
            state: RunState::Running,
            outcomes: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn is_aborted(&self) -> bool {
        self.state == RunState::Aborted
    }

    /// The fatal step that stopped the run
    pub fn aborted_at(&self) -> Option<&StepOutcome> {
        if self.is_aborted() {
            self.outcomes.last()
        } else {
            None
        }
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.passed_count()
    }

    /// Total duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Export as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Position in the phase's step list
    pub index: usize,

    /// Step label
    pub label: String,

    pub fatal: bool,

    pub grading: bool,

    /// Action result
    pub result: StepResult,

    /// Duration (milliseconds)
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize, failed: bool) -> StepOutcome {
        StepOutcome {
            index,
            label: format!("step {}", index),
            fatal: false,
            grading: true,
            result: if failed {
                StepResult::fail("x")
            } else {
                StepResult::pass()
            },
            duration_ms: 0,
        }
    }

    #[test]
    fn test_run_result_counts() {
        let mut result = RunResult::new(Phase::Grade);
        result.outcomes = vec![outcome(0, false), outcome(1, true), outcome(2, false)];
        result.state = RunState::Completed;

        assert_eq!(result.passed_count(), 2);
        assert_eq!(result.failed_count(), 1);
        assert!(result.is_completed());
        assert!(result.aborted_at().is_none());
    }

    #[test]
    fn test_aborted_at_is_last_outcome() {
        let mut result = RunResult::new(Phase::Start);
        result.outcomes = vec![outcome(0, false), outcome(1, true)];
        result.state = RunState::Aborted;

        assert_eq!(result.aborted_at().map(|o| o.index), Some(1));
    }

    #[test]
    fn test_run_result_json() {
        let mut result = RunResult::new(Phase::Finish);
        result.outcomes = vec![outcome(0, true)];
        result.state = RunState::Completed;

        let json = result.to_json().unwrap();
        assert!(json.contains("\"phase\": \"finish\""));
        assert!(json.contains("\"state\": \"completed\""));
    }
}
