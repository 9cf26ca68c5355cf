//! Dependency and identity queries.

use clap::Subcommand;
use varindex::{BaseName, DependencyRef, PackageIndex};

use super::common::{format_bytes, parse_key};
use crate::error::CliError;

/// Query subcommands.
#[derive(Debug, Subcommand)]
pub enum QueryAction {
    /// Show a package record
    Show {
        /// Package key, e.g. Alice.Outfit.3
        key: String,
    },
    /// List the packages depending on a package
    Dependents {
        /// Package key, e.g. Alice.Outfit.3
        key: String,
    },
    /// List the resolved dependencies of a package
    Dependencies {
        /// Package key, e.g. Alice.Outfit.3
        key: String,
        /// Follow dependencies transitively
        #[arg(long)]
        transitive: bool,
    },
    /// Resolve a dependency reference such as Alice.Outfit.latest
    Resolve {
        reference: String,
    },
    /// Show the duplicate group of a base name, or list all groups
    Duplicates {
        /// Base name, e.g. Alice.Outfit
        base: Option<String>,
    },
}

/// Run a query subcommand against a loaded index.
pub fn run(index: &PackageIndex, action: QueryAction) -> Result<(), CliError> {
    match action {
        QueryAction::Show { key } => show(index, &key),
        QueryAction::Dependents { key } => {
            let key = parse_key(&key)?;
            let dependents = index.dependents(&key);
            println!("{} dependents of {}", dependents.len(), key);
            for dependent in dependents {
                println!("  {}", dependent);
            }
            Ok(())
        }
        QueryAction::Dependencies { key, transitive } => {
            let key = parse_key(&key)?;
            let resolved = if transitive {
                index.transitive_dependencies(&key)
            } else {
                index.dependencies(&key)
            };
            println!("{} dependencies of {}", resolved.len(), key);
            for dependency in resolved {
                println!("  {}", dependency);
            }
            let missing = index.missing_dependencies(&key);
            if !missing.is_empty() {
                println!("Missing:");
                for reference in missing {
                    println!("  {}", reference);
                }
            }
            Ok(())
        }
        QueryAction::Resolve { reference } => {
            let reference: DependencyRef = reference.parse()?;
            match index.resolve(&reference) {
                Some(key) => {
                    println!("{} -> {}", reference, key);
                    Ok(())
                }
                None => Err(CliError::NotFound(format!("no package satisfies {}", reference))),
            }
        }
        QueryAction::Duplicates { base } => duplicates(index, base.as_deref()),
    }
}

fn show(index: &PackageIndex, raw: &str) -> Result<(), CliError> {
    let key = parse_key(raw)?;
    let record = index
        .get(&key)
        .ok_or_else(|| CliError::NotFound(key.to_string()))?;

    println!("{}", record.key);
    println!("  Status:       {}", record.status);
    println!("  Path:         {}", record.path.display());
    if let Some(destination) = record.destination() {
        println!("  Destination:  {}", destination);
    }
    println!("  Size:         {}", format_bytes(record.size));
    println!("  Latest:       {}", if index.is_latest_version(&key) { "yes" } else { "no" });
    println!("  Dependents:   {}", index.dependents_count(&key));
    println!("  Dependencies: {}", record.dependencies.len());
    if record.is_duplicate() {
        println!(
            "  Duplicate:    {} locations{}",
            record.duplicate_location_count,
            if record.duplicate_representative { " (representative)" } else { "" }
        );
    }
    if let Some(reason) = &record.damage {
        println!("  Damaged:      {}", reason);
    }
    Ok(())
}

fn duplicates(index: &PackageIndex, base: Option<&str>) -> Result<(), CliError> {
    match base {
        Some(raw) => {
            let base: BaseName = raw.parse()?;
            let group = index
                .duplicate_group(&base)
                .ok_or_else(|| CliError::NotFound(format!("no duplicates of {}", base)))?;
            println!("{} ({} locations)", group.base, group.location_count());
            for member in &group.members {
                let marker = if *member == group.representative { "*" } else { " " };
                println!(" {} {}", marker, member);
            }
        }
        None => {
            let snapshot = index.snapshot();
            let groups = snapshot.duplicates().groups();
            println!("{} duplicate groups", groups.len());
            for group in groups {
                println!(
                    "  {:<40} {} locations, representative {}",
                    group.base.as_str(),
                    group.location_count(),
                    group.representative
                );
            }
        }
    }
    Ok(())
}
