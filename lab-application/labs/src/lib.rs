//! Lab scripts
//!
//! Every exercise is a pure function from (phase, config) to an ordered
//! step list. The registry below maps lab names to those functions.

pub mod checks;
pub mod common;
pub mod do316;
pub mod do480;

use lab_common::Phase;
use lab_executor::{LabConfig, Step};

/// Builds the steps of one phase
pub type BuildSteps = fn(Phase, &LabConfig) -> Vec<Step>;

/// A registered lab exercise
#[derive(Clone, Copy)]
pub struct LabScript {
    /// Name used on the command line
    pub name: &'static str,
    /// Course SKU (lower case)
    pub course: &'static str,
    pub title: &'static str,
    /// Hosts the lab runs commands on
    pub targets: &'static [&'static str],
    pub phases: &'static [Phase],
    build: BuildSteps,
}

impl LabScript {
    pub fn supports(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }

    /// Steps for a phase; `None` when the lab has no such phase
    pub fn build_steps(&self, phase: Phase, config: &LabConfig) -> Option<Vec<Step>> {
        if !self.supports(phase) {
            return None;
        }
        let steps = (self.build)(phase, config);
        tracing::debug!("{} {}: {} steps", self.name, phase, steps.len());
        Some(steps)
    }
}

static LABS: &[LabScript] = &[
    LabScript {
        name: do316::review_cr1::NAME,
        course: "do316",
        title: "Comprehensive review: network and templates",
        targets: do316::TARGETS,
        phases: &Phase::ALL,
        build: do316::review_cr1::build_steps,
    },
    LabScript {
        name: do316::review_cr2::NAME,
        course: "do316",
        title: "Comprehensive review: templates, access and node maintenance",
        targets: do316::TARGETS,
        phases: &Phase::ALL,
        build: do316::review_cr2::build_steps,
    },
    LabScript {
        name: do316::review_cr3::NAME,
        course: "do316",
        title: "Comprehensive review: probes, storage and services",
        targets: do316::TARGETS,
        phases: &Phase::ALL,
        build: do316::review_cr3::build_steps,
    },
    LabScript {
        name: do480::applications_review::NAME,
        course: "do480",
        title: "Managing applications across clusters",
        targets: do480::TARGETS,
        phases: &Phase::ALL,
        build: do480::applications_review::build_steps,
    },
];

/// Every registered lab
pub fn all() -> &'static [LabScript] {
    LABS
}

/// Look up a lab by name (case-insensitive)
pub fn find(name: &str) -> Option<&'static LabScript> {
    LABS.iter().find(|lab| lab.name.eq_ignore_ascii_case(name))
}
