//! `lab start|grade|finish <lab>`

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use tracing::{info, warn};

use lab_common::Phase;
use lab_executor::{Capabilities, GradeReport, PhaseRunner, RunResult, Step};
use lab_scripts::LabScript;

use super::output::{self, ConsoleObserver};
use super::{EXIT_ABORTED, EXIT_OK, EXIT_USAGE};
use crate::init;

/// Run one phase of a lab; returns the process exit status
pub async fn handle(phase: Phase, lab_name: &str, json: bool, config: Option<&Path>) -> Result<u8> {
    let lab = match resolve(lab_name, phase) {
        Ok(lab) => lab,
        Err(message) => {
            eprintln!("{}", message.red());
            return Ok(EXIT_USAGE);
        }
    };

    let setup = async {
        let config = init::load_config(config)?;
        let client = init::connect(&config).await?;
        let caps = init::capabilities(&config, client)?;
        Ok::<_, init::InitError>((config, caps))
    };
    let (config, caps) = match setup.await {
        Ok(setup) => setup,
        Err(e) => {
            init::report(&e);
            return Ok(e.exit_status());
        }
    };

    let steps = lab
        .build_steps(phase, &config)
        .unwrap_or_default();

    println!();
    println!("{} lab.", phase.action_label().bold());
    println!();

    let result = run(phase, &steps, caps).await;
    finish(lab, &result, json)
}

/// Look up the lab and check it has the phase
pub fn resolve(name: &str, phase: Phase) -> std::result::Result<&'static LabScript, String> {
    let lab = lab_scripts::find(name).ok_or_else(|| {
        format!("Unknown lab '{}'. Run 'lab list' to see the available labs.", name)
    })?;
    if !lab.supports(phase) {
        return Err(format!("The '{}' lab has no {} phase.", lab.name, phase));
    }
    Ok(lab)
}

async fn run(phase: Phase, steps: &[Step], caps: Capabilities) -> RunResult {
    PhaseRunner::new(caps)
        .with_observer(Box::new(ConsoleObserver::new()))
        .run(phase, steps)
        .await
}

fn finish(lab: &LabScript, result: &RunResult, json: bool) -> Result<u8> {
    info!(
        "{} {}: {:?} after {} ms",
        lab.name,
        result.phase,
        result.state,
        result.duration_ms()
    );

    if result.is_aborted() {
        warn!("{} {} aborted", lab.name, result.phase);
        if json {
            output::print_json(result)?;
        }
        return Ok(EXIT_ABORTED);
    }

    if result.phase.is_grading() {
        let report = GradeReport::from_run(lab.name, result)?;
        output::print_grade(&report);
        if json {
            output::print_json(&report)?;
        }
    } else {
        println!();
        println!("{}", completion_message(result.phase).green());
        if json {
            output::print_json(result)?;
        }
    }

    Ok(EXIT_OK)
}

fn completion_message(phase: Phase) -> &'static str {
    match phase {
        Phase::Start => "Lab started. Work through the exercise, then grade it.",
        Phase::Grade => "Lab graded.",
        Phase::Finish => "Lab finished.",
    }
}
