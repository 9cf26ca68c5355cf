//! Package identity types.
//!
//! A package is identified by `Creator.Name.Version`. The same version may be
//! present in several locations at once (installed, archived, on an external
//! drive), so the [`MetadataKey`] carries an optional suffix that keeps every
//! record's identity unique inside the store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::record::PackageStatus;
use crate::error::IndexError;

/// Version-less package identity: `Creator.Name`.
///
/// # Example
///
/// ```
/// use varindex::package::BaseName;
///
/// let base = BaseName::new("Alice", "Outfit");
/// assert_eq!(base.as_str(), "Alice.Outfit");
/// assert_eq!(base.creator(), "Alice");
/// assert_eq!(base.name(), "Outfit");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BaseName(String);

impl BaseName {
    /// Create a base name from its creator and package name.
    pub fn new(creator: &str, name: &str) -> Self {
        Self(format!("{}.{}", creator, name))
    }

    /// The full `Creator.Name` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The creator component.
    pub fn creator(&self) -> &str {
        self.0.split_once('.').map(|(c, _)| c).unwrap_or(&self.0)
    }

    /// The package name component.
    pub fn name(&self) -> &str {
        self.0.split_once('.').map(|(_, n)| n).unwrap_or("")
    }
}

impl fmt::Display for BaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BaseName {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match split_base(s) {
            Some((creator, name)) => Ok(Self::new(creator, name)),
            None => Err(IndexError::InvalidKey(s.to_string())),
        }
    }
}

impl TryFrom<String> for BaseName {
    type Error = IndexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BaseName> for String {
    fn from(base: BaseName) -> Self {
        base.0
    }
}

/// Disambiguating suffix of a [`MetadataKey`].
///
/// Rendered as `#<status>` for the first extra record of a status and
/// `#<status>-<n>` for every further one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeySuffix {
    pub status: PackageStatus,
    pub ordinal: u32,
}

impl fmt::Display for KeySuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ordinal <= 1 {
            write!(f, "#{}", self.status)
        } else {
            write!(f, "#{}-{}", self.status, self.ordinal)
        }
    }
}

/// Stable identity of a record in the store: `Creator.Name.Version[#suffix]`.
///
/// # Example
///
/// ```
/// use varindex::package::MetadataKey;
///
/// let key: MetadataKey = "Alice.Outfit.2#archived".parse().unwrap();
/// assert_eq!(key.base().as_str(), "Alice.Outfit");
/// assert_eq!(key.version(), 2);
/// assert_eq!(key.to_string(), "Alice.Outfit.2#archived");
/// assert_eq!(key.without_suffix().to_string(), "Alice.Outfit.2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetadataKey {
    base: BaseName,
    version: u32,
    suffix: Option<KeySuffix>,
}

impl MetadataKey {
    /// Create a plain key with no location suffix.
    pub fn new(base: BaseName, version: u32) -> Self {
        Self {
            base,
            version,
            suffix: None,
        }
    }

    /// Set the location suffix (builder pattern).
    pub fn with_suffix(mut self, suffix: Option<KeySuffix>) -> Self {
        self.suffix = suffix;
        self
    }

    /// The base name this key belongs to.
    pub fn base(&self) -> &BaseName {
        &self.base
    }

    /// The package version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The location suffix, if the key was disambiguated.
    pub fn suffix(&self) -> Option<KeySuffix> {
        self.suffix
    }

    /// The same key with the location suffix stripped.
    pub fn without_suffix(&self) -> Self {
        Self::new(self.base.clone(), self.version)
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.base, self.version)?;
        if let Some(suffix) = self.suffix {
            write!(f, "{}", suffix)?;
        }
        Ok(())
    }
}

impl FromStr for MetadataKey {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IndexError::InvalidKey(s.to_string());

        let (ident, suffix) = match s.split_once('#') {
            Some((ident, suffix)) => (ident, Some(parse_suffix(suffix).ok_or_else(invalid)?)),
            None => (s, None),
        };
        let (base, version) = ident.rsplit_once('.').ok_or_else(invalid)?;
        let version = version.parse::<u32>().map_err(|_| invalid())?;
        let base = base.parse::<BaseName>().map_err(|_| invalid())?;

        Ok(Self::new(base, version).with_suffix(suffix))
    }
}

impl TryFrom<String> for MetadataKey {
    type Error = IndexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MetadataKey> for String {
    fn from(key: MetadataKey) -> Self {
        key.to_string()
    }
}

/// A dependency reference as written in a package's metadata.
///
/// # Example
///
/// ```
/// use varindex::package::DependencyRef;
///
/// let dep: DependencyRef = "Alice.Outfit.latest".parse().unwrap();
/// assert!(dep.is_alias());
/// assert_eq!(dep.base().as_str(), "Alice.Outfit");
///
/// let dep: DependencyRef = "Alice.Outfit.3".parse().unwrap();
/// assert!(!dep.is_alias());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DependencyRef {
    /// `Creator.Name.Version`
    Exact { base: BaseName, version: u32 },
    /// `Creator.Name.latest`
    Latest { base: BaseName },
    /// `Creator.Name.minN`: the latest version, provided it is at least `N`.
    Minimum { base: BaseName, version: u32 },
}

impl DependencyRef {
    /// The base name this reference points at.
    pub fn base(&self) -> &BaseName {
        match self {
            Self::Exact { base, .. } | Self::Latest { base } | Self::Minimum { base, .. } => base,
        }
    }

    /// Whether the reference must be resolved against the current versions.
    pub fn is_alias(&self) -> bool {
        !matches!(self, Self::Exact { .. })
    }
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact { base, version } => write!(f, "{}.{}", base, version),
            Self::Latest { base } => write!(f, "{}.latest", base),
            Self::Minimum { base, version } => write!(f, "{}.min{}", base, version),
        }
    }
}

impl FromStr for DependencyRef {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IndexError::InvalidDependency(s.to_string());

        let (base, version) = s.trim().rsplit_once('.').ok_or_else(invalid)?;
        let base = base.parse::<BaseName>().map_err(|_| invalid())?;
        let lower = version.to_ascii_lowercase();

        if lower == "latest" {
            return Ok(Self::Latest { base });
        }
        if let Some(min) = lower.strip_prefix("min") {
            let version = min.parse::<u32>().map_err(|_| invalid())?;
            return Ok(Self::Minimum { base, version });
        }
        let version = version.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self::Exact { base, version })
    }
}

impl TryFrom<String> for DependencyRef {
    type Error = IndexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DependencyRef> for String {
    fn from(dep: DependencyRef) -> Self {
        dep.to_string()
    }
}

/// Split `Creator.Name` into its two non-empty components.
pub(crate) fn split_base(s: &str) -> Option<(&str, &str)> {
    let (creator, name) = s.split_once('.')?;
    let valid = |part: &str| !part.is_empty() && !part.contains(['.', '#']) && part.trim() == part;
    (valid(creator) && valid(name)).then_some((creator, name))
}

fn parse_suffix(s: &str) -> Option<KeySuffix> {
    let (status, ordinal) = match s.split_once('-') {
        Some((status, ordinal)) => (status, ordinal.parse::<u32>().ok().filter(|n| *n >= 2)?),
        None => (s, 1),
    };
    let status = status.parse::<PackageStatus>().ok()?;
    Some(KeySuffix { status, ordinal })
}
