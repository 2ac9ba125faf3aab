//! Lab CLI

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use lab_common::Phase;

mod commands;
mod init;

#[derive(Parser)]
#[command(name = "lab")]
#[command(about = "Start, grade and finish lab exercises", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (RUST_LOG takes precedence)
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Config file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the environment for an exercise
    Start {
        /// Lab name
        lab: String,

        /// Also print the run as JSON
        #[arg(long)]
        json: bool,
    },

    /// Grade the learner's work
    Grade {
        /// Lab name
        lab: String,

        /// Also print the grade report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clean up after an exercise
    Finish {
        /// Lab name
        lab: String,

        /// Also print the run as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available labs
    List {
        /// Only labs of this course (e.g. DO316)
        #[arg(long)]
        course: Option<String>,

        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn phase(&self) -> Option<(Phase, &str, bool)> {
        match self {
            Commands::Start { lab, json } => Some((Phase::Start, lab.as_str(), *json)),
            Commands::Grade { lab, json } => Some((Phase::Grade, lab.as_str(), *json)),
            Commands::Finish { lab, json } => Some((Phase::Finish, lab.as_str(), *json)),
            Commands::List { .. } => None,
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    debug!("lab CLI {}", env!("CARGO_PKG_VERSION"));

    let outcome = match &cli.command {
        Commands::List { course, json } => {
            commands::list::handle(course.as_deref(), *json).map(|_| commands::EXIT_OK)
        }
        command => match command.phase() {
            Some((phase, lab, json)) => {
                commands::phase::handle(phase, lab, json, cli.config.as_deref()).await
            }
            None => Ok(commands::EXIT_USAGE),
        },
    };

    match outcome {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_phase_commands() {
        let cli = Cli::try_parse_from(["lab", "grade", "review-cr1", "--json"]).unwrap();
        assert!(matches!(
            cli.command.phase(),
            Some((Phase::Grade, "review-cr1", true))
        ));

        let cli = Cli::try_parse_from(["lab", "--log-level", "debug", "start", "review-cr3"]).unwrap();
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command.phase(), Some((Phase::Start, "review-cr3", false))));
    }

    #[test]
    fn test_parse_list() {
        let cli = Cli::try_parse_from(["lab", "list", "--course", "do480"]).unwrap();
        assert!(cli.command.phase().is_none());
        assert!(matches!(cli.command, Commands::List { course: Some(ref c), .. } if c == "do480"));
    }

    #[test]
    fn test_missing_lab_is_rejected() {
        assert!(Cli::try_parse_from(["lab", "finish"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
