//! Incremental refresh against the configured roots.
//!
//! The CLI has no archive reader, so files found by a refresh are identified
//! from their file names only. Their dependencies stay unknown until a
//! proper scan manifest is produced for them.

use std::path::{Path, PathBuf};

use clap::Args;
use varindex::manifest::write_manifest;
use varindex::package::{parse_package_filename, EntryFields, ParsedFields};
use varindex::scanner::ListedFile;
use varindex::{PackageIndex, PackageParser, ScanEntry};

use crate::error::CliError;

/// Arguments of the `refresh` command.
#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Write the refreshed entries back to this manifest
    #[arg(long)]
    pub write: Option<PathBuf>,

    /// Print every changed path
    #[arg(long)]
    pub list: bool,
}

/// Identifies packages from their file names.
pub struct FilenameParser {
    extension: String,
}

impl FilenameParser {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }
}

impl PackageParser for FilenameParser {
    fn parse(&self, path: &Path, file: &ListedFile) -> ScanEntry {
        let fields = match parse_package_filename(path, &self.extension) {
            Some((base, version)) => EntryFields::Parsed(ParsedFields {
                creator: base.creator().to_string(),
                name: base.name().to_string(),
                version,
                dependencies: Vec::new(),
                content: Default::default(),
                category: None,
                license: None,
            }),
            None => EntryFields::Failed("file name is not Creator.Name.Version".to_string()),
        };

        ScanEntry {
            path: path.to_path_buf(),
            origin: file.origin.clone(),
            size: file.stamp.size,
            created: file.stamp.modified,
            modified: file.stamp.modified,
            fields,
        }
    }
}

/// Run the `refresh` command against a loaded index.
pub fn run(index: &PackageIndex, args: RefreshArgs) -> Result<(), CliError> {
    let parser = FilenameParser::new(index.config().package_extension.clone());
    let before = index.generation();
    let outcome = index.refresh_incrementally(&parser)?;
    let diff = &outcome.diff;

    if diff.recommend_full_rescan {
        println!("Too many changes for an incremental refresh; a full rescan is recommended.");
        return Ok(());
    }

    println!(
        "Added: {}  Modified: {}  Removed: {}",
        diff.added.len(),
        diff.modified.len(),
        diff.removed.len()
    );
    println!("Generation: {} -> {}", before, outcome.generation);

    if args.list {
        for (label, paths) in [("+", &diff.added), ("~", &diff.modified), ("-", &diff.removed)] {
            for path in paths {
                println!("  {} {}", label, path.display());
            }
        }
    }

    if let Some(path) = args.write {
        let entries = index.entries();
        write_manifest(&path, &entries)?;
        println!("Wrote {} entries to {}", entries.len(), path.display());
    }
    Ok(())
}
