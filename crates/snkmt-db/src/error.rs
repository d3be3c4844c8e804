//! Connector and migration errors.

use thiserror::Error;

/// Errors raised by the connectors and the migration engine.
///
/// `NotFound` is recoverable (the caller asked us not to create anything).
/// `Version` and `Migration` are fatal to the current operation and always
/// carry the versions or revision involved -- never silently defaulted.
#[derive(Debug, Error)]
pub enum DbError {
    /// Database file or its directory is absent and creation was disabled.
    #[error("{0}")]
    NotFound(String),

    /// Unsupported or incompatible schema version, or post-migration
    /// version bookkeeping inconsistency.
    #[error("{0}")]
    Version(String),

    /// A migration step failed mid-sequence. The version record still
    /// reflects the last successfully-reached version.
    #[error("migration step {revision} failed: {source}")]
    Migration {
        revision: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}
