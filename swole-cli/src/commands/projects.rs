//! Project CLI commands.

use clap::Subcommand;
use console::style;
use swole::config::ConfigFile;
use swole::registry::ProjectSaveOutcome;

use super::open_registry;
use crate::error::CliError;

/// Project subcommands.
#[derive(Debug, Subcommand)]
pub enum ProjectsAction {
    /// List projects and the packages assigned to them
    List,
    /// Assign a package (by name) to a project
    Assign { package: String, project: String },
    /// Remove a package's project assignment
    Unassign { package: String },
}

/// Run a projects subcommand.
pub fn run(action: ProjectsAction, config: &ConfigFile) -> Result<(), CliError> {
    let mut registry = open_registry(config);

    match action {
        ProjectsAction::List => {
            let projects = registry.projects();
            if projects.projects().is_empty() && projects.data().package_projects.is_empty() {
                println!("No projects in {}", projects.path().display());
                return Ok(());
            }
            for record in projects.projects() {
                println!("{} {}", style(&record.name).bold(), style(record.path.display()).dim());
                for path in &record.external_paths {
                    println!("    + {}", path.display());
                }
            }

            let mut names: Vec<&str> = projects
                .data()
                .package_projects
                .values()
                .map(String::as_str)
                .collect();
            names.sort_unstable();
            names.dedup();
            for name in names {
                let indexed = registry.packages_in_project(name).len();
                println!("{}", style(name).bold());
                for package in projects.packages_in_project(name) {
                    println!("  {}", package);
                }
                println!("  {}", style(format!("{} indexed package versions", indexed)).dim());
            }
            Ok(())
        }
        ProjectsAction::Assign { package, project } => {
            let previous = registry.projects_mut().assign(&package, &project);
            save(&registry)?;
            match previous {
                Some(previous) if previous != project => {
                    println!("Moved {} from {} to {}", package, previous, project)
                }
                _ => println!("Assigned {} to {}", package, project),
            }
            Ok(())
        }
        ProjectsAction::Unassign { package } => {
            if registry.projects_mut().unassign(&package).is_none() {
                println!("{} was not assigned to a project", package);
                return Ok(());
            }
            save(&registry)?;
            println!("Unassigned {}", package);
            Ok(())
        }
    }
}

fn save(registry: &swole::Registry) -> Result<(), CliError> {
    match registry.save_projects() {
        ProjectSaveOutcome::Saved => Ok(()),
        ProjectSaveOutcome::Dropped => Err(CliError::Projects("another save is in progress".to_string())),
        ProjectSaveOutcome::Failed(reason) => Err(CliError::Projects(reason)),
    }
}
