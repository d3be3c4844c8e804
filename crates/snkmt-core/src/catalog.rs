//! Ordered catalog of known database schema versions.
//!
//! The catalog is an explicit immutable value injected into the connectors,
//! not a module-level global, so tests can run against alternate version
//! ranges. Versions are sorted oldest to newest and fixed at construction.

use snkmt_types::error::VersionParseError;
use snkmt_types::version::DbVersion;

/// Revision id of the initial schema (workflows, rules, jobs, files).
pub const REVISION_1_0: &str = "a088a7b93fe5";
/// Revision id of the schema adding the errors table and the updated_at index.
pub const REVISION_1_1: &str = "c59016d243cc";

/// The ordered set of schema versions a build knows how to reach.
#[derive(Debug, Clone)]
pub struct VersionCatalog {
    versions: Vec<DbVersion>,
}

impl VersionCatalog {
    /// Build a catalog from versions sorted oldest to newest.
    ///
    /// # Panics
    ///
    /// Panics if `versions` is empty or not strictly ascending; the catalog
    /// is build-time configuration, so a bad one is a programming error.
    pub fn new(versions: Vec<DbVersion>) -> Self {
        assert!(!versions.is_empty(), "version catalog must not be empty");
        assert!(
            versions.windows(2).all(|w| w[0] < w[1]),
            "version catalog must be strictly ascending"
        );
        Self { versions }
    }

    /// All known versions, oldest to newest.
    pub fn versions(&self) -> &[DbVersion] {
        &self.versions
    }

    /// Oldest schema version this build supports.
    pub fn min(&self) -> &DbVersion {
        &self.versions[0]
    }

    /// Newest schema version this build supports. `"latest"` resolves here.
    pub fn max(&self) -> &DbVersion {
        self.versions.last().expect("catalog is never empty")
    }

    /// Look up the catalog entry for an exact `(major, minor)` pair.
    pub fn find(&self, major: i32, minor: i32) -> Option<&DbVersion> {
        self.versions
            .iter()
            .find(|v| v.major == major && v.minor == minor)
    }

    /// Parse a version string: `"latest"`, `"<major>"`, or `"<major>.<minor>"`.
    pub fn parse(&self, version_str: &str) -> Result<DbVersion, VersionParseError> {
        if version_str == "latest" {
            return Ok(self.max().clone());
        }

        let invalid = || VersionParseError::InvalidFormat(version_str.to_string());
        let (major, minor) = match version_str.split_once('.') {
            None => (version_str.parse::<i32>().map_err(|_| invalid())?, 0),
            Some((maj, min)) => {
                if min.contains('.') {
                    return Err(invalid());
                }
                (
                    maj.parse::<i32>().map_err(|_| invalid())?,
                    min.parse::<i32>().map_err(|_| invalid())?,
                )
            }
        };

        self.find(major, minor)
            .cloned()
            .ok_or_else(|| VersionParseError::UnknownVersion(version_str.to_string()))
    }
}

impl Default for VersionCatalog {
    /// The catalog shipped with this build.
    fn default() -> Self {
        Self::new(vec![
            DbVersion::new(REVISION_1_0, 1, 0),
            DbVersion::new(REVISION_1_1, 1, 1),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latest_is_max() {
        let catalog = VersionCatalog::default();
        assert_eq!(catalog.parse("latest").unwrap(), *catalog.max());
    }

    #[test]
    fn test_parse_round_trips_all_known_versions() {
        let catalog = VersionCatalog::default();
        for v in catalog.versions() {
            assert_eq!(catalog.parse(&v.to_string()).unwrap(), *v);
        }
    }

    #[test]
    fn test_parse_major_only_means_minor_zero() {
        let catalog = VersionCatalog::default();
        let v = catalog.parse("1").unwrap();
        assert_eq!((v.major, v.minor), (1, 0));
        assert_eq!(v.revision, REVISION_1_0);
    }

    #[test]
    fn test_parse_unknown_version() {
        let catalog = VersionCatalog::default();
        assert_eq!(
            catalog.parse("7.3"),
            Err(VersionParseError::UnknownVersion("7.3".to_string()))
        );
    }

    #[test]
    fn test_parse_invalid_format() {
        let catalog = VersionCatalog::default();
        assert_eq!(
            catalog.parse("1.2.3"),
            Err(VersionParseError::InvalidFormat("1.2.3".to_string()))
        );
        assert_eq!(
            catalog.parse("one"),
            Err(VersionParseError::InvalidFormat("one".to_string()))
        );
    }

    #[test]
    fn test_min_max_window() {
        let catalog = VersionCatalog::default();
        assert_eq!((catalog.min().major, catalog.min().minor), (1, 0));
        assert_eq!((catalog.max().major, catalog.max().minor), (1, 1));
    }

    #[test]
    #[should_panic(expected = "strictly ascending")]
    fn test_catalog_rejects_unsorted_versions() {
        VersionCatalog::new(vec![
            DbVersion::new("bbb", 1, 1),
            DbVersion::new("aaa", 1, 0),
        ]);
    }
}
