//! Grade reporter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runner::RunResult;
use crate::{ExecutorError, Result};

/// Percentage of passed graded steps, nearest integer, halves rounded up
///
/// Zero graded steps scores 100.
pub fn score(passed: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    ((200 * passed + total) / (2 * total)) as u32
}

/// Grade of a completed grading run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeReport {
    /// Lab name
    pub lab: String,

    /// When the run finished
    pub timestamp: DateTime<Utc>,

    /// Number of graded steps
    pub total: usize,

    /// Graded steps that passed
    pub passed: usize,

    /// Percentage
    pub score: u32,

    /// Messages of failed graded steps, in step order
    pub failures: Vec<String>,

    /// Graded steps, in step order
    pub checks: Vec<GradedCheck>,
}

/// One graded step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedCheck {
    pub label: String,
    pub passed: bool,
}

impl GradeReport {
    /// Build the report
    ///
    /// Only a grading run that reached `Completed` can be graded.
    pub fn from_run(lab: &str, run: &RunResult) -> Result<Self> {
        if !run.phase.is_grading() {
            return Err(ExecutorError::NotGradable(format!(
                "{} is not a grading phase",
                run.phase
            )));
        }
        if !run.is_completed() {
            return Err(ExecutorError::NotGradable(format!(
                "run ended in state {:?}",
                run.state
            )));
        }

        let graded: Vec<_> = run.outcomes.iter().filter(|o| o.grading).collect();
        let passed = graded.iter().filter(|o| o.result.passed()).count();
        let failures = graded
            .iter()
            .filter(|o| o.result.failed)
            .flat_map(|o| o.result.messages.iter().cloned())
            .collect();
        let checks = graded
            .iter()
            .map(|o| GradedCheck {
                label: o.label.clone(),
                passed: o.result.passed(),
            })
            .collect();

        Ok(Self {
            lab: lab.to_string(),
            timestamp: run.finished_at,
            total: graded.len(),
            passed,
            score: score(passed, graded.len()),
            failures,
            checks,
        })
    }

    /// Overall PASS: every graded step passed
    pub fn is_pass(&self) -> bool {
        self.passed == self.total
    }

    /// Export as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_rounding() {
        assert_eq!(score(2, 3), 67);
        assert_eq!(score(1, 3), 33);
        assert_eq!(score(1, 8), 13); // 12.5 rounds up
        assert_eq!(score(0, 4), 0);
        assert_eq!(score(4, 4), 100);
    }

    #[test]
    fn test_score_without_graded_steps() {
        assert_eq!(score(0, 0), 100);
    }
}
