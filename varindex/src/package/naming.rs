//! Package file naming conventions.
//!
//! Package files are named `Creator.Name.Version.<ext>`. When the parser
//! fails on a file, its identity is recovered from this naming scheme so the
//! damaged record still lands under a sensible key.

use std::path::Path;

use super::key::{split_base, BaseName};

/// Creator used for damaged files whose name does not follow the convention.
pub const UNKNOWN_CREATOR: &str = "unknown";

/// Build the canonical file name for a package.
///
/// # Example
///
/// ```
/// use varindex::package::{package_filename, BaseName};
///
/// let base = BaseName::new("Alice", "Outfit");
/// assert_eq!(package_filename(&base, 3, "var"), "Alice.Outfit.3.var");
/// ```
pub fn package_filename(base: &BaseName, version: u32, extension: &str) -> String {
    format!("{}.{}.{}", base, version, extension)
}

/// Parse `Creator.Name.Version.<ext>` into its base name and version.
///
/// The extension comparison is case-insensitive. Returns `None` when the
/// file name does not follow the convention.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use varindex::package::parse_package_filename;
///
/// let (base, version) =
///     parse_package_filename(Path::new("/lib/Alice.Outfit.3.var"), "var").unwrap();
/// assert_eq!(base.as_str(), "Alice.Outfit");
/// assert_eq!(version, 3);
/// ```
pub fn parse_package_filename(path: &Path, extension: &str) -> Option<(BaseName, u32)> {
    let file_name = path.file_name()?.to_str()?;
    let (stem, ext) = file_name.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case(extension) {
        return None;
    }
    let (base, version) = stem.rsplit_once('.')?;
    let version = version.parse::<u32>().ok()?;
    let (creator, name) = split_base(base)?;
    Some((BaseName::new(creator, name), version))
}

/// Identity for a damaged file: parsed from the name when possible,
/// otherwise `unknown.<stem>` at version 0.
pub fn fallback_identity(path: &Path, extension: &str) -> (BaseName, u32) {
    if let Some(identity) = parse_package_filename(path, extension) {
        return identity;
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.replace(['.', '#'], "_"))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "unnamed".to_string());
    (BaseName::new(UNKNOWN_CREATOR, stem.trim()), 0)
}

/// Whether a path carries the package extension.
pub fn has_package_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}
