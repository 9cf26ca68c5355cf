//! Filter criteria and the record dimensions they test.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::package::PackageRecord;

/// Label used for records without a category.
pub const UNCATEGORIZED_LABEL: &str = "uncategorized";

/// Label used for records without a license.
pub const UNLICENSED_LABEL: &str = "unspecified";

/// A categorical dimension of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Creator,
    Category,
    Status,
    License,
    ContentType,
    /// External destination name. Local records have no label.
    Destination,
    /// `local` or `external`.
    Origin,
}

impl Facet {
    /// Labels the record contributes to this facet.
    ///
    /// Most facets yield exactly one label; `ContentType` yields one per
    /// content type present and `Destination` none for local records.
    pub fn labels(self, record: &PackageRecord) -> Vec<String> {
        match self {
            Facet::Creator => vec![record.creator().to_string()],
            Facet::Category => vec![record
                .category
                .clone()
                .unwrap_or_else(|| UNCATEGORIZED_LABEL.to_string())],
            Facet::Status => vec![record.status.as_str().to_string()],
            Facet::License => vec![record
                .license
                .clone()
                .unwrap_or_else(|| UNLICENSED_LABEL.to_string())],
            Facet::ContentType => record
                .content
                .present()
                .map(|content| content.label().to_string())
                .collect(),
            Facet::Destination => record.destination().map(str::to_string).into_iter().collect(),
            Facet::Origin => vec![if record.is_external() { "external" } else { "local" }.to_string()],
        }
    }
}

/// A numeric dimension of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeField {
    FileSize,
    Version,
    DependencyCount,
    /// Modification time in seconds since the Unix epoch.
    Modified,
}

impl RangeField {
    pub fn value(self, record: &PackageRecord) -> u64 {
        match self {
            RangeField::FileSize => record.size,
            RangeField::Version => u64::from(record.version()),
            RangeField::DependencyCount => record.dependencies.len() as u64,
            RangeField::Modified => record.modified_secs(),
        }
    }
}

/// A boolean property of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFlag {
    Damaged,
    HasDependencies,
    Duplicate,
}

impl RecordFlag {
    pub fn value(self, record: &PackageRecord) -> bool {
        match self {
            RecordFlag::Damaged => record.is_damaged(),
            RecordFlag::HasDependencies => !record.dependencies.is_empty(),
            RecordFlag::Duplicate => record.is_duplicate(),
        }
    }
}

/// One condition a record must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterCriterion {
    /// At least one of the record's facet labels is in `values`.
    OneOf {
        facet: Facet,
        values: BTreeSet<String>,
    },
    /// Inclusive range; an absent bound is open.
    Range {
        field: RangeField,
        min: Option<u64>,
        max: Option<u64>,
    },
    Flag {
        flag: RecordFlag,
        expected: bool,
    },
    /// Case-insensitive substring of the key, creator, name or file name.
    Contains {
        text: String,
    },
}

impl FilterCriterion {
    pub fn one_of<I, S>(facet: Facet, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterCriterion::OneOf {
            facet,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn range(field: RangeField, min: Option<u64>, max: Option<u64>) -> Self {
        FilterCriterion::Range { field, min, max }
    }

    pub fn flag(flag: RecordFlag, expected: bool) -> Self {
        FilterCriterion::Flag { flag, expected }
    }

    /// Build a `Contains` criterion; the text is stored lowercased.
    pub fn contains(text: &str) -> Self {
        FilterCriterion::Contains {
            text: text.to_lowercase(),
        }
    }

    pub fn matches(&self, record: &PackageRecord) -> bool {
        match self {
            FilterCriterion::OneOf { facet, values } => facet
                .labels(record)
                .iter()
                .any(|label| values.contains(label)),
            FilterCriterion::Range { field, min, max } => {
                let value = field.value(record);
                min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
            }
            FilterCriterion::Flag { flag, expected } => flag.value(record) == *expected,
            FilterCriterion::Contains { text } => text_matches(record, &text.to_lowercase()),
        }
    }
}

/// Whether `needle` (already lowercase) occurs in the record's searchable
/// text.
pub(crate) fn text_matches(record: &PackageRecord, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    [
        record.key.to_string(),
        record.creator().to_string(),
        record.name().to_string(),
        record.file_name().to_string(),
    ]
    .iter()
    .any(|haystack| haystack.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{ContentCounts, EntryOrigin, PackageStatus};
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};

    fn record() -> PackageRecord {
        PackageRecord {
            key: "Alice.Outfit.3".parse().unwrap(),
            status: PackageStatus::Installed,
            path: PathBuf::from("/lib/Alice.Outfit.3.var"),
            origin: EntryOrigin::Root {
                root: PathBuf::from("/lib"),
                status: PackageStatus::Installed,
            },
            size: 2_048,
            created: SystemTime::UNIX_EPOCH,
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(500),
            dependencies: vec!["Bob.Hair.latest".parse().unwrap()],
            content: ContentCounts {
                clothing: 2,
                textures: 5,
                ..Default::default()
            },
            category: Some("Clothing".to_string()),
            license: None,
            duplicate_location_count: 1,
            duplicate_representative: false,
            damage: None,
        }
    }

    #[test]
    fn test_facet_labels() {
        let record = record();
        assert_eq!(Facet::Creator.labels(&record), vec!["Alice"]);
        assert_eq!(Facet::License.labels(&record), vec![UNLICENSED_LABEL]);
        assert_eq!(Facet::ContentType.labels(&record), vec!["clothing", "textures"]);
        assert!(Facet::Destination.labels(&record).is_empty());
        assert_eq!(Facet::Origin.labels(&record), vec!["local"]);
    }

    #[test]
    fn test_one_of_matches_any_label() {
        let record = record();
        assert!(FilterCriterion::one_of(Facet::ContentType, ["textures", "scenes"]).matches(&record));
        assert!(!FilterCriterion::one_of(Facet::Creator, ["Bob"]).matches(&record));
    }

    #[test]
    fn test_range_is_inclusive() {
        let record = record();
        assert!(FilterCriterion::range(RangeField::FileSize, Some(2_048), Some(2_048)).matches(&record));
        assert!(FilterCriterion::range(RangeField::Version, None, Some(3)).matches(&record));
        assert!(!FilterCriterion::range(RangeField::Modified, Some(501), None).matches(&record));
        assert!(FilterCriterion::range(RangeField::DependencyCount, Some(1), None).matches(&record));
    }

    #[test]
    fn test_flags() {
        let record = record();
        assert!(FilterCriterion::flag(RecordFlag::HasDependencies, true).matches(&record));
        assert!(FilterCriterion::flag(RecordFlag::Damaged, false).matches(&record));
        assert!(!FilterCriterion::flag(RecordFlag::Duplicate, true).matches(&record));
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let record = record();
        assert!(FilterCriterion::contains("OUTFIT").matches(&record));
        assert!(FilterCriterion::contains("alice.outfit.3").matches(&record));
        assert!(!FilterCriterion::contains("scene").matches(&record));
    }

    #[test]
    fn test_criterion_serde_tagged() {
        let criterion = FilterCriterion::flag(RecordFlag::Damaged, true);
        let json = serde_json::to_string(&criterion).unwrap();
        assert_eq!(json, r#"{"type":"flag","flag":"damaged","expected":true}"#);
    }
}
