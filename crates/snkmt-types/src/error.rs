//! Error types shared across the persistence boundary.

use thiserror::Error;

/// Errors from repository operations (used by the trait definitions in
/// snkmt-core). Ordinary "entity not found" lookups are *not* errors -- they
/// come back as `Ok(None)` / `Ok(false)`; these variants cover true
/// anomalies.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,
}

/// Errors from parsing a version string such as `"1.1"` or `"latest"`.
///
/// Surfaced at the CLI/config boundary, before any database is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("invalid db version format: {0}")]
    InvalidFormat(String),

    #[error("unknown db version: {0}")]
    UnknownVersion(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_version_parse_error_display() {
        let err = VersionParseError::InvalidFormat("1.2.3".to_string());
        assert_eq!(err.to_string(), "invalid db version format: 1.2.3");
        let err = VersionParseError::UnknownVersion("7".to_string());
        assert_eq!(err.to_string(), "unknown db version: 7");
    }
}
