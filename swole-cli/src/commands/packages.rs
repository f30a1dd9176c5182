//! Package CLI commands.

use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};
use console::style;
use swole::config::ConfigFile;
use swole::content::Content;
use swole::registry::{MatchMode, PackageFilter, PackageMatch, PackageRef, Registry};

use super::{open_registry, parse_version};
use crate::error::CliError;

/// Which packages a command looks at.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Source {
    Local,
    External,
    All,
}

impl From<Source> for PackageFilter {
    fn from(source: Source) -> Self {
        match source {
            Source::Local => PackageFilter::Local,
            Source::External => PackageFilter::External,
            Source::All => PackageFilter::Any,
        }
    }
}

/// Package subcommands.
#[derive(Debug, Subcommand)]
pub enum PackagesAction {
    /// List indexed packages
    List {
        #[arg(long, value_enum, default_value = "all")]
        source: Source,
    },
    /// Find a package by name, highest version unless one is given
    Find {
        name: String,
        version: Option<String>,
        #[arg(long, value_enum, default_value = "all")]
        source: Source,
    },
    /// Show the manifest and content of a package
    Inspect {
        name: String,
        version: Option<String>,
        #[arg(long, value_enum, default_value = "all")]
        source: Source,
    },
    /// Pack a package into a .swole archive
    Export {
        name: String,
        version: Option<String>,
        /// Directory to write the archive into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

/// Run a packages subcommand.
pub fn run(action: PackagesAction, config: &ConfigFile) -> Result<(), CliError> {
    let registry = open_registry(config);

    match action {
        PackagesAction::List { source } => {
            list(&registry, source.into());
            Ok(())
        }
        PackagesAction::Find { name, version, source } => {
            let found = find(&registry, &name, version.as_deref(), source.into())?;
            print_match(&found);
            Ok(())
        }
        PackagesAction::Inspect { name, version, source } => {
            let found = find(&registry, &name, version.as_deref(), source.into())?;
            print_match(&found);
            inspect(found.package);
            Ok(())
        }
        PackagesAction::Export { name, version, out } => {
            let found = find(&registry, &name, version.as_deref(), PackageFilter::Any)?;
            let Some(id) = found.package.identifier() else {
                return Err(CliError::Export(format!("{} has no valid identity", name)));
            };
            match registry.export_archive(&id, found.package.kind_filter(), &out) {
                Some(path) => {
                    println!("Exported {} to {}", style(&id).bold(), path.display());
                    Ok(())
                }
                None => Err(CliError::Export(format!("could not export {}", id))),
            }
        }
    }
}

fn find<'a>(
    registry: &'a Registry,
    name: &str,
    version: Option<&str>,
    filter: PackageFilter,
) -> Result<PackageMatch<'a>, CliError> {
    let version = parse_version(version)?;
    registry
        .find_package(name, version.as_ref(), filter)
        .ok_or_else(|| match &version {
            Some(v) => CliError::PackageNotFound(format!("{} {}", name, v)),
            None => CliError::PackageNotFound(name.to_string()),
        })
}

fn list(registry: &Registry, filter: PackageFilter) {
    if filter != PackageFilter::External {
        println!("{}", style("Local packages").bold().underlined());
        for package in registry.local_packages() {
            print_row(PackageRef::Local(package));
        }
    }
    if filter != PackageFilter::Local {
        println!("{}", style("External packages").bold().underlined());
        for package in registry.external_packages() {
            print_row(PackageRef::External(package));
        }
    }
}

fn print_row(package: PackageRef<'_>) {
    let count = package.content().map(|c| c.len()).unwrap_or(0);
    println!(
        "  {:<40} {:>5} items  {}",
        package.display_name(),
        count,
        style(package.location().display()).dim()
    );
}

fn print_match(found: &PackageMatch<'_>) {
    let mode = match found.mode {
        MatchMode::Exact => style("exact").green(),
        MatchMode::Liberal => style("liberal").yellow(),
    };
    println!(
        "{} ({}, {} match)",
        style(found.package.display_name()).bold(),
        found.package.kind(),
        mode
    );
}

fn inspect(package: PackageRef<'_>) {
    let Some(content) = package.content() else {
        println!("  (no content)");
        return;
    };
    let info = &content.manifest().info;
    println!("  Location:    {}", package.location().display());
    if !info.curator.is_empty() {
        println!("  Curator:     {}", info.curator);
    }
    if !info.description.is_empty() {
        println!("  Description: {}", info.description);
    }
    if let Some(url) = &info.url {
        println!("  URL:         {}", url);
    }

    let dependencies = &content.manifest().dependencies;
    println!("  Dependencies ({}):", dependencies.len());
    for dependency in dependencies {
        println!("    {}", dependency);
    }

    println!("  Content ({}):", content.len());
    for item in content.iter() {
        println!("    {:<32} {}", item.name(), style(item.kind()).dim());
    }
}
