//! `lab list`

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use lab_scripts::LabScript;

use super::output::print_json;

#[derive(Serialize)]
struct LabRow {
    name: &'static str,
    course: String,
    title: &'static str,
    phases: Vec<&'static str>,
}

impl From<&LabScript> for LabRow {
    fn from(lab: &LabScript) -> Self {
        Self {
            name: lab.name,
            course: lab.course.to_uppercase(),
            title: lab.title,
            phases: lab.phases.iter().map(|p| p.as_str()).collect(),
        }
    }
}

pub fn handle(course: Option<&str>, json: bool) -> Result<()> {
    let rows: Vec<LabRow> = lab_scripts::all()
        .iter()
        .filter(|lab| course.map_or(true, |c| lab.course.eq_ignore_ascii_case(c)))
        .map(LabRow::from)
        .collect();

    if json {
        return print_json(&rows);
    }

    if rows.is_empty() {
        println!("{}", "No labs found".yellow());
        return Ok(());
    }

    let header = format!("{:<24} {:<8} {:<22} {}", "LAB", "COURSE", "PHASES", "TITLE");
    println!("{}", header.bold());
    println!("{}", "-".repeat(header.len()));
    for row in &rows {
        println!(
            "{} {:<8} {:<22} {}",
            format!("{:<24}", row.name).cyan(),
            row.course,
            row.phases.join(","),
            row.title
        );
    }
    Ok(())
}
