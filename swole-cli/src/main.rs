//! Swole CLI - Command-line interface
//!
//! Inspect, look up and export the content packages known to the registry,
//! and manage which project each package belongs to.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use console::style;
use swole::config::{self, ConfigFile};
use swole::logging::init_logging;

use crate::commands::packages::PackagesAction;
use crate::commands::projects::ProjectsAction;
use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "swole", version, about = "Swole content package registry")]
struct Cli {
    /// Path to config.ini (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List, find, inspect and export packages
    Packages {
        #[command(subcommand)]
        action: PackagesAction,
    },
    /// Show and edit project assignments
    Projects {
        #[command(subcommand)]
        action: ProjectsAction,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config::default_path);
    let mut config = ConfigFile::load_from(&config_path).map_err(|e| CliError::Config(e.to_string()))?;

    match cli.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }
    let _guard = init_logging(&config.logging).map_err(|e| CliError::Logging(e.to_string()))?;
    tracing::debug!(config = %config_path.display(), "Loaded configuration");

    match cli.command {
        Commands::Packages { action } => commands::packages::run(action, &config),
        Commands::Projects { action } => commands::projects::run(action, &config),
    }
}
