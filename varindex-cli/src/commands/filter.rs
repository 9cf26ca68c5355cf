//! Filtered listings and facet counts.

use clap::{Args, ValueEnum};
use varindex::filter::{Facet, FilterCriterion, FilterState, OriginSelection, RangeField, RecordFlag};
use varindex::{Outcome, PackageIndex, PackageStatus};

use crate::error::CliError;

/// Origin selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OriginArg {
    All,
    Local,
    External,
}

impl From<OriginArg> for OriginSelection {
    fn from(origin: OriginArg) -> Self {
        match origin {
            OriginArg::All => OriginSelection::All,
            OriginArg::Local => OriginSelection::Local,
            OriginArg::External => OriginSelection::External,
        }
    }
}

/// Facet selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FacetArg {
    Creator,
    Category,
    Status,
    License,
    Content,
    Destination,
    Origin,
}

impl From<FacetArg> for Facet {
    fn from(facet: FacetArg) -> Self {
        match facet {
            FacetArg::Creator => Facet::Creator,
            FacetArg::Category => Facet::Category,
            FacetArg::Status => Facet::Status,
            FacetArg::License => Facet::License,
            FacetArg::Content => Facet::ContentType,
            FacetArg::Destination => Facet::Destination,
            FacetArg::Origin => Facet::Origin,
        }
    }
}

/// Arguments of the `filter` command.
#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Case-insensitive text search
    #[arg(short, long, default_value = "")]
    pub search: String,

    /// Only packages by these creators
    #[arg(long)]
    pub creator: Vec<String>,

    /// Only packages with these statuses
    #[arg(long)]
    pub status: Vec<String>,

    /// Only packages in these external destinations
    #[arg(long)]
    pub destination: Vec<String>,

    #[arg(long, value_enum, default_value = "all")]
    pub origin: OriginArg,

    /// Minimum file size in bytes
    #[arg(long)]
    pub min_size: Option<u64>,

    /// Maximum file size in bytes
    #[arg(long)]
    pub max_size: Option<u64>,

    /// Only damaged packages
    #[arg(long)]
    pub damaged: bool,

    /// Show one record per duplicate group
    #[arg(long)]
    pub collapse: bool,

    /// Print counts for a facet instead of the matching records
    #[arg(long, value_enum)]
    pub facet: Option<FacetArg>,

    /// Count only matching records when printing facets
    #[arg(long)]
    pub cascade: bool,

    /// Maximum number of records to print
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

impl FilterArgs {
    fn to_state(&self) -> Result<FilterState, CliError> {
        let mut state = FilterState::new()
            .with_search(self.search.clone())
            .with_origin(self.origin.into())
            .with_collapse_duplicates(self.collapse)
            .with_cascading(self.cascade);

        if !self.creator.is_empty() {
            state = state.with_criterion(FilterCriterion::one_of(Facet::Creator, self.creator.clone()));
        }
        if !self.status.is_empty() {
            let statuses = self
                .status
                .iter()
                .map(|s| s.parse::<PackageStatus>().map(|s| s.as_str()))
                .collect::<Result<Vec<_>, _>>()?;
            state = state.with_criterion(FilterCriterion::one_of(Facet::Status, statuses));
        }
        if self.min_size.is_some() || self.max_size.is_some() {
            state = state.with_criterion(FilterCriterion::range(
                RangeField::FileSize,
                self.min_size,
                self.max_size,
            ));
        }
        if self.damaged {
            state = state.with_criterion(FilterCriterion::flag(RecordFlag::Damaged, true));
        }
        for destination in &self.destination {
            state = state.with_destination(destination.clone());
        }
        Ok(state)
    }
}

/// Run the `filter` command against a loaded index.
pub fn run(index: &PackageIndex, args: FilterArgs) -> Result<(), CliError> {
    let state = args.to_state()?;
    let snapshot = index.capture_snapshot(&state);

    if let Some(facet) = args.facet {
        let cascade = state.cascading.then_some(&snapshot);
        for (label, count) in index.facet_counts(facet.into(), cascade) {
            println!("{:>8}  {}", count, label);
        }
        return Ok(());
    }

    let records = match index.filter(&snapshot) {
        Outcome::Completed(records) => records,
        Outcome::Cancelled => return Err(CliError::Cancelled),
    };

    println!("{} matching packages", records.len());
    for record in records.iter().take(args.limit) {
        println!("  {:<48} {:<10} {}", record.key.to_string(), record.status.as_str(), record.path.display());
    }
    if records.len() > args.limit {
        println!("  ... {} more", records.len() - args.limit);
    }
    Ok(())
}
