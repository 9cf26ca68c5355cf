//! Mutable filter selection and its immutable captured form.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::criterion::FilterCriterion;
use crate::config::ExternalDestination;

/// Which side of the library a view shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginSelection {
    #[default]
    All,
    Local,
    External,
}

/// The user's current selection. Freely mutable; capture it into a
/// [`FilterSnapshot`] before evaluating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub criteria: Vec<FilterCriterion>,

    /// Free-text search, applied to local and external records alike.
    pub search: String,

    pub collapse_duplicates: bool,
    pub origin: OriginSelection,

    /// Destinations to show. Empty means all visible destinations.
    pub selected_destinations: BTreeSet<String>,

    /// When set, facet counts only include records passing the filter.
    pub cascading: bool,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_criterion(mut self, criterion: FilterCriterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_collapse_duplicates(mut self, collapse: bool) -> Self {
        self.collapse_duplicates = collapse;
        self
    }

    pub fn with_origin(mut self, origin: OriginSelection) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_destination(mut self, name: impl Into<String>) -> Self {
        self.selected_destinations.insert(name.into());
        self
    }

    pub fn with_cascading(mut self, cascading: bool) -> Self {
        self.cascading = cascading;
        self
    }

    /// Freeze the selection together with the destination visibility in
    /// effect right now.
    pub fn capture(&self, destinations: &[ExternalDestination]) -> FilterSnapshot {
        let visible_destinations = destinations
            .iter()
            .map(|d| (d.name.clone(), d.is_valid() && d.show_in_main_table))
            .collect();

        FilterSnapshot {
            criteria: self.criteria.clone(),
            search: self.search.trim().to_lowercase(),
            collapse_duplicates: self.collapse_duplicates,
            origin: self.origin,
            selected_destinations: self.selected_destinations.clone(),
            visible_destinations,
            cascading: self.cascading,
        }
    }
}

/// Immutable filter value evaluated by the
/// [`FilterEngine`](super::FilterEngine).
///
/// Never changes after capture, so one snapshot can be evaluated from many
/// threads while the user keeps editing the [`FilterState`].
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSnapshot {
    criteria: Vec<FilterCriterion>,
    search: String,
    collapse_duplicates: bool,
    origin: OriginSelection,
    selected_destinations: BTreeSet<String>,
    visible_destinations: HashMap<String, bool>,
    cascading: bool,
}

impl FilterSnapshot {
    pub fn criteria(&self) -> &[FilterCriterion] {
        &self.criteria
    }

    /// Lowercased, trimmed search text.
    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn collapse_duplicates(&self) -> bool {
        self.collapse_duplicates
    }

    pub fn origin(&self) -> OriginSelection {
        self.origin
    }

    pub fn cascading(&self) -> bool {
        self.cascading
    }

    /// Whether a destination is known, valid and shown in the main table.
    pub fn is_destination_visible(&self, name: &str) -> bool {
        self.visible_destinations.get(name).copied().unwrap_or(false)
    }

    /// Whether the destination selection admits `name`.
    pub fn is_destination_selected(&self, name: &str) -> bool {
        self.selected_destinations.is_empty() || self.selected_destinations.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_capture_records_visibility() {
        let dir = TempDir::new().unwrap();
        let destinations = vec![
            ExternalDestination::new("shown", dir.path()),
            ExternalDestination::new("hidden", dir.path()).with_show_in_main_table(false),
            ExternalDestination::new("gone", dir.path().join("missing")),
        ];

        let snapshot = FilterState::new().capture(&destinations);

        assert!(snapshot.is_destination_visible("shown"));
        assert!(!snapshot.is_destination_visible("hidden"));
        assert!(!snapshot.is_destination_visible("gone"));
        assert!(!snapshot.is_destination_visible("unknown"));
    }

    #[test]
    fn test_capture_is_independent_of_later_edits() {
        let mut state = FilterState::new().with_search("  Outfit ");
        let snapshot = state.capture(&[]);

        state.search = "scene".to_string();
        state.collapse_duplicates = true;

        assert_eq!(snapshot.search(), "outfit");
        assert!(!snapshot.collapse_duplicates());
    }

    #[test]
    fn test_destination_selection() {
        let snapshot = FilterState::new().capture(&[]);
        assert!(snapshot.is_destination_selected("any"));

        let snapshot = FilterState::new().with_destination("nas").capture(&[]);
        assert!(snapshot.is_destination_selected("nas"));
        assert!(!snapshot.is_destination_selected("usb"));
    }
}
