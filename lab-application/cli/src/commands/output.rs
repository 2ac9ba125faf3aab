//! Console output
//!
//! Step progress lines, the grade summary and JSON output.

use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;

use lab_common::{Phase, StepResult};
use lab_executor::{GradeReport, PhaseObserver, Step};

/// Width of the label column
const LABEL_WIDTH: usize = 72;

/// One spinner per running step, replaced by PASS/FAIL when it ends
///
/// The spinner draws on stdout. When stdout is not a terminal the bar is
/// hidden and finished lines are printed instead.
pub struct ConsoleObserver {
    spinner: Option<ProgressBar>,
    target: fn() -> ProgressDrawTarget,
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stdout)
    }
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_draw_target(target: fn() -> ProgressDrawTarget) -> Self {
        Self {
            spinner: None,
            target,
        }
    }

    /// Lines to print once a step ends; the status line is left out when
    /// a visible spinner already shows it
    fn finished_lines(&mut self, phase: Phase, step: &Step, result: &StepResult) -> Vec<String> {
        let line = format!("{} {}", step_line(phase, &step.label), status(result.passed()));
        let mut lines = Vec::new();
        match self.spinner.take() {
            Some(spinner) if !spinner.is_hidden() => spinner.finish_with_message(line),
            Some(spinner) => {
                spinner.finish_and_clear();
                lines.push(line);
            }
            None => lines.push(line),
        }
        if result.failed {
            lines.extend(result.messages.iter().map(|m| format!("   - {}", m)));
        }
        lines
    }
}

/// `Starting: label` padded to the status column
pub fn step_line(phase: Phase, label: &str) -> String {
    let line = format!(" · {}: {}", phase.action_label(), label);
    format!("{:<width$}", line, width = LABEL_WIDTH)
}

fn status(passed: bool) -> String {
    if passed {
        "PASS".green().to_string()
    } else {
        "FAIL".red().to_string()
    }
}

impl PhaseObserver for ConsoleObserver {
    fn step_started(&mut self, phase: Phase, step: &Step) {
        let spinner = ProgressBar::with_draw_target(None, (self.target)());
        if let Ok(style) = ProgressStyle::default_spinner().template("{msg} {spinner:.green}") {
            spinner.set_style(style);
        }
        spinner.set_message(step_line(phase, &step.label));
        if !spinner.is_hidden() {
            spinner.enable_steady_tick(Duration::from_millis(100));
        }
        self.spinner = Some(spinner);
    }

    fn step_finished(&mut self, phase: Phase, step: &Step, result: &StepResult) {
        for line in self.finished_lines(phase, step, result) {
            println!("{}", line);
        }
    }

    fn phase_aborted(&mut self, phase: Phase, step: &Step) {
        println!();
        println!(
            "{}",
            format!(
                "{} stopped: '{}' must pass before the lab can continue.",
                phase.action_label(),
                step.label
            )
            .red()
            .bold()
        );
    }
}

/// Graded checks and the overall grade
pub fn print_grade(report: &GradeReport) {
    println!();
    for check in &report.checks {
        println!(
            "{:<width$} {}",
            format!(" · {}", check.label),
            status(check.passed),
            width = LABEL_WIDTH
        );
    }

    if !report.failures.is_empty() {
        println!();
        for failure in &report.failures {
            println!("   - {}", failure);
        }
    }

    println!();
    println!("{}", grade_line(report));
    println!();
}

/// `Overall lab grade: PASS (100%)`
pub fn grade_line(report: &GradeReport) -> String {
    let verdict = if report.is_pass() {
        "PASS".green().bold()
    } else {
        "FAIL".red().bold()
    };
    format!("Overall lab grade: {} ({}%)", verdict, report.score)
}

/// Pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lab_executor::GradedCheck;

    fn report(passed: usize, total: usize) -> GradeReport {
        GradeReport {
            lab: "review-cr1".to_string(),
            timestamp: Utc::now(),
            total,
            passed,
            score: lab_executor::score(passed, total),
            failures: Vec::new(),
            checks: vec![GradedCheck {
                label: "one".to_string(),
                passed: passed == total,
            }],
        }
    }

    #[test]
    fn test_step_line() {
        let line = step_line(Phase::Start, "Checking lab systems");
        assert!(line.starts_with(" · Starting: Checking lab systems"));
        assert_eq!(line.chars().count(), LABEL_WIDTH);
    }

    #[test]
    fn test_grade_line() {
        colored::control::set_override(false);
        assert_eq!(grade_line(&report(2, 3)), "Overall lab grade: FAIL (67%)");
        assert_eq!(grade_line(&report(0, 0)), "Overall lab grade: PASS (100%)");
    }

    fn step() -> Step {
        Step::new(
            "Checking lab systems",
            lab_executor::StepAction::HostReachable {
                hosts: vec!["utility".to_string()],
            },
        )
    }

    #[test]
    fn test_finished_line_printed_without_terminal() {
        colored::control::set_override(false);
        let mut observer = ConsoleObserver::with_draw_target(ProgressDrawTarget::hidden);
        let step = step();

        observer.step_started(Phase::Start, &step);
        let lines = observer.finished_lines(Phase::Start, &step, &StepResult::pass());
        assert_eq!(
            lines,
            [format!("{} PASS", step_line(Phase::Start, "Checking lab systems"))]
        );
    }

    #[test]
    fn test_failure_messages_follow_their_step() {
        colored::control::set_override(false);
        let mut observer = ConsoleObserver::with_draw_target(ProgressDrawTarget::hidden);
        let step = step();

        observer.step_started(Phase::Grade, &step);
        let result = StepResult::fail("Host utility is not reachable");
        let lines = observer.finished_lines(Phase::Grade, &step, &result);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(" · Grading: Checking lab systems"));
        assert!(lines[0].ends_with("FAIL"));
        assert_eq!(lines[1], "   - Host utility is not reachable");
    }
}
