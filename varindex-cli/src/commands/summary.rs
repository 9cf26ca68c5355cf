//! Index overview.

use varindex::PackageIndex;

use super::common::format_bytes;
use crate::error::CliError;

/// Print record, damage, duplicate and destination totals.
pub fn run(index: &PackageIndex) -> Result<(), CliError> {
    let snapshot = index.snapshot();
    let total_size: u64 = snapshot.records().iter().map(|r| r.size).sum();
    let with_missing = snapshot
        .records()
        .iter()
        .filter(|r| !index.missing_dependencies(&r.key).is_empty())
        .count();

    println!("Generation:        {}", snapshot.generation());
    println!("Packages:          {}", snapshot.len());
    println!("Total size:        {}", format_bytes(total_size));
    println!("Damaged:           {}", snapshot.damaged().count());
    println!("Duplicate groups:  {}", snapshot.duplicates().len());
    println!("Missing deps in:   {} packages", with_missing);

    let totals = index.destination_totals();
    if !totals.is_empty() {
        println!("Destinations:");
        for (name, count) in totals {
            println!("  {:<20} {}", name, count);
        }
    }
    Ok(())
}
