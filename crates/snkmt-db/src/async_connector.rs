//! The pooled connector for concurrent writer tasks.
//!
//! [`AsyncDatabase`] serves many short-lived repository sessions at once.
//! It never migrates an outdated schema itself: running ordered migration
//! DDL inside a concurrent session pool would interleave with in-flight
//! reads, so an outdated stored version is always fatal here and callers
//! are directed to the explicit migrate operation on
//! [`crate::connector::Database`]. A brand-new file is the one exception --
//! it is initialized by delegating to a temporary `Database`, the sole
//! migration executor.

use std::path::{Path, PathBuf};

use snkmt_core::catalog::VersionCatalog;
use snkmt_types::version::DbVersion;

use crate::connector::{Database, DatabaseOptions, resolve_db_path};
use crate::error::DbError;
use crate::pool::DatabasePool;
use crate::schema::{ensure_version_table, read_version};

/// Options for opening an [`AsyncDatabase`].
///
/// There is deliberately no `auto_migrate` flag: this connector never
/// migrates, regardless of configuration.
#[derive(Debug, Clone)]
pub struct AsyncDatabaseOptions {
    /// Storage file path; `None` resolves to the per-user default.
    pub path: Option<PathBuf>,
    /// Create the file (and its parent directory) when absent.
    pub create_db: bool,
}

impl Default for AsyncDatabaseOptions {
    fn default() -> Self {
        Self {
            path: None,
            create_db: true,
        }
    }
}

/// Pooled connector for the snkmt SQLite database.
#[derive(Debug)]
pub struct AsyncDatabase {
    path: PathBuf,
    pool: DatabasePool,
    catalog: VersionCatalog,
}

impl AsyncDatabase {
    /// Open the database for concurrent repository use.
    ///
    /// Fails with a version error whenever the stored version differs from
    /// the newest version this build supports -- older directs the caller
    /// to the explicit migrate operation, newer cannot be operated on
    /// safely at all.
    pub async fn open(
        opts: AsyncDatabaseOptions,
        catalog: VersionCatalog,
    ) -> Result<Self, DbError> {
        let path = resolve_db_path(opts.path, opts.create_db)?;
        let pool = DatabasePool::connect(&path, true).await?;
        ensure_version_table(&pool.writer).await?;

        let current = read_version(&pool.writer).await?;
        let latest = catalog.max().clone();

        if current.is_null() {
            // Brand-new database: hand initialization to the migration
            // executor, then continue on our own pool.
            let db = Database::open(
                DatabaseOptions {
                    path: Some(path.clone()),
                    create_db: false,
                    auto_migrate: false,
                    ignore_version: true,
                },
                catalog.clone(),
            )
            .await?;
            db.close().await;
        } else if current < latest {
            return Err(DbError::Version(format!(
                "database version {current} is incompatible with {latest}: \
                 auto-migration is not supported on the pooled connector; \
                 run the explicit migrate operation"
            )));
        } else if current > latest {
            return Err(DbError::Version(format!(
                "database is too new for this program: {current} > {latest}"
            )));
        }

        Ok(Self {
            path,
            pool,
            catalog,
        })
    }

    /// The current stored schema version.
    pub async fn get_version(&self) -> Result<DbVersion, DbError> {
        read_version(&self.pool.reader).await
    }

    /// The version catalog this connector was opened with.
    pub fn catalog(&self) -> &VersionCatalog {
        &self.catalog
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The pool backing this connector, for constructing a repository.
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Consume the connector, keeping only its pool.
    pub fn into_pool(self) -> DatabasePool {
        self.pool
    }

    /// Close all sessions and release the file.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snkmt_core::catalog::{REVISION_1_0, REVISION_1_1};

    fn opts(path: &Path) -> AsyncDatabaseOptions {
        AsyncDatabaseOptions {
            path: Some(path.to_path_buf()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fresh_database_is_initialized_to_max() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        let db = AsyncDatabase::open(opts(&path), VersionCatalog::default())
            .await
            .unwrap();
        assert_eq!(db.get_version().await.unwrap().revision, REVISION_1_1);

        let backups = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .contains("_backup_")
            })
            .count();
        assert_eq!(backups, 0, "initializing a fresh db takes no backup");
    }

    #[tokio::test]
    async fn test_outdated_database_always_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        // Seed a database stuck at 1.0.
        let seeded = Database::open(
            DatabaseOptions {
                path: Some(path.clone()),
                ..Default::default()
            },
            VersionCatalog::new(vec![DbVersion::new(REVISION_1_0, 1, 0)]),
        )
        .await
        .unwrap();
        seeded.close().await;

        let err = AsyncDatabase::open(opts(&path), VersionCatalog::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Version(_)));
        assert!(err.to_string().contains("migrate"));
    }

    #[tokio::test]
    async fn test_missing_file_without_create_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        let mut o = opts(&path);
        o.create_db = false;
        let err = AsyncDatabase::open(o, VersionCatalog::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_up_to_date_database_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        let seeded = Database::open(
            DatabaseOptions {
                path: Some(path.clone()),
                ..Default::default()
            },
            VersionCatalog::default(),
        )
        .await
        .unwrap();
        seeded.close().await;

        let db = AsyncDatabase::open(opts(&path), VersionCatalog::default())
            .await
            .unwrap();
        assert_eq!(db.get_version().await.unwrap().revision, REVISION_1_1);
    }
}
