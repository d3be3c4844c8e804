//! The migration-capable database connector.
//!
//! [`Database`] owns the storage file and is the single entry point for
//! schema-compatibility enforcement. It is the *only* type allowed to run
//! migration DDL: migration steps must never interleave with a concurrent
//! session pool, so the pooled [`crate::async_connector::AsyncDatabase`]
//! delegates here and otherwise refuses outdated schemas outright.

use std::path::{Path, PathBuf};

use chrono::Local;
use snkmt_core::catalog::VersionCatalog;
use snkmt_types::version::DbVersion;

use crate::error::DbError;
use crate::migrations::run_steps;
use crate::pool::{DatabasePool, default_db_path};
use crate::schema::{ensure_version_table, read_version, table_names, write_version};

/// Options for opening a [`Database`].
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    /// Storage file path; `None` resolves to the per-user default.
    pub path: Option<PathBuf>,
    /// Create the file (and its parent directory) when absent.
    pub create_db: bool,
    /// Migrate an outdated database to the newest version on open.
    pub auto_migrate: bool,
    /// With `auto_migrate` off, open an outdated database anyway.
    pub ignore_version: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            path: None,
            create_db: true,
            auto_migrate: true,
            ignore_version: false,
        }
    }
}

/// Path, tables, and schema revision -- diagnostics for the `db info` view.
#[derive(Debug, Clone)]
pub struct DbInfo {
    pub path: PathBuf,
    pub tables: Vec<String>,
    pub schema_revision: String,
}

/// Connector for the snkmt SQLite database.
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    pool: DatabasePool,
    catalog: VersionCatalog,
}

/// Resolve the storage path and enforce the `create_db` contract on the
/// file and its parent directory. Shared by both connectors.
pub(crate) fn resolve_db_path(
    path: Option<PathBuf>,
    create_db: bool,
) -> Result<PathBuf, DbError> {
    let db_file = path.unwrap_or_else(default_db_path);

    if let Some(parent) = db_file.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        if create_db {
            std::fs::create_dir_all(parent)?;
        } else {
            return Err(DbError::NotFound(format!(
                "no database directory: {}",
                parent.display()
            )));
        }
    }

    if !db_file.exists() && !create_db {
        return Err(DbError::NotFound(format!(
            "database file not found: {}",
            db_file.display()
        )));
    }

    Ok(db_file)
}

impl Database {
    /// Open (and if needed create) the database, enforcing schema
    /// compatibility before any repository call can execute.
    ///
    /// - A brand-new database (no version row) is migrated to the newest
    ///   version with no backup; there is nothing to back up.
    /// - An outdated database is migrated when `auto_migrate` is set;
    ///   otherwise opening fails unless `ignore_version` is set.
    /// - A database newer than this build's catalog always fails.
    pub async fn open(opts: DatabaseOptions, catalog: VersionCatalog) -> Result<Self, DbError> {
        let path = resolve_db_path(opts.path, opts.create_db)?;
        let pool = DatabasePool::connect(&path, true).await?;
        ensure_version_table(&pool.writer).await?;

        let mut db = Self {
            path,
            pool,
            catalog,
        };

        let current = db.get_version().await?;
        let latest = db.catalog.max().clone();

        if current.is_null() {
            db.migrate(None, false, false).await?;
        } else if current < latest {
            if opts.auto_migrate {
                db.migrate(None, true, true).await?;
            } else if !opts.ignore_version {
                return Err(DbError::Version(format!(
                    "database version {current} needs migration to {latest} but \
                     auto_migrate is disabled; run the explicit migrate operation"
                )));
            }
        } else if current > latest {
            return Err(DbError::Version(format!(
                "database is too new for this program: {current} > {latest}"
            )));
        }

        Ok(db)
    }

    /// The current stored schema version, or the null sentinel when no
    /// version table or row exists yet.
    pub async fn get_version(&self) -> Result<DbVersion, DbError> {
        read_version(&self.pool.writer).await
    }

    /// Migrate the database to `desired_version` (newest known version when
    /// `None`).
    ///
    /// The ordered steps between the current and desired versions run as a
    /// single logical operation: any step failure aborts the migration and
    /// leaves the version record at the last successfully-reached version.
    /// Only after every step succeeds is the version record rewritten, in
    /// its own transaction.
    pub async fn migrate(
        &mut self,
        desired_version: Option<&DbVersion>,
        upgrade_only: bool,
        create_backup: bool,
    ) -> Result<(), DbError> {
        let latest = self.catalog.max().clone();
        let desired = desired_version.unwrap_or(&latest).clone();
        let current = self.get_version().await?;

        if current == desired {
            tracing::info!(version = %current, "already at desired db version, no migrations performed");
            return Ok(());
        }

        if current > latest {
            return Err(DbError::Version(format!(
                "database is too new for this program: {current} > {latest}"
            )));
        }

        if current > desired && upgrade_only {
            tracing::info!(version = %current, "downgrade suppressed, upgrade_only is set");
            return Ok(());
        }

        // Fail closed: a backup failure aborts before any schema change.
        if create_backup && !current.is_null() {
            let backup_path = self.create_backup(&current).await?;
            tracing::info!(backup = %backup_path.display(), "created database backup");
        }

        if desired > current {
            tracing::info!(from = %current, to = %desired, "upgrading database");
        } else {
            tracing::info!(from = %current, to = %desired, "downgrading database");
        }
        run_steps(&self.pool.writer, &self.catalog, &current, &desired).await?;

        // Version bookkeeping is its own transaction; if it fails the schema
        // has still migrated, which is a reportable inconsistency.
        if let Err(e) = write_version(&self.pool.writer, &desired).await {
            return Err(DbError::Version(format!(
                "migration succeeded but failed to update the version record; \
                 database schema is at {desired} but the record may show {current}: {e}"
            )));
        }

        tracing::info!(version = %desired, "database version updated");
        Ok(())
    }

    /// Copy the storage file to a timestamped sibling named with the current
    /// version's revision id. The connector's own sessions are closed for
    /// the duration of the copy so the file is quiescent, then reopened.
    async fn create_backup(&mut self, current: &DbVersion) -> Result<PathBuf, DbError> {
        let stem = self.path.file_stem().and_then(|s| s.to_str()).unwrap_or("snkmt");
        let suffix = self
            .path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let backup_name = format!("{stem}_backup_{timestamp}_{}_{suffix}", current.revision);
        let backup_path = self
            .path
            .parent()
            .map(|p| p.join(&backup_name))
            .unwrap_or_else(|| PathBuf::from(&backup_name));

        self.pool.close().await;
        let copied = std::fs::copy(&self.path, &backup_path);
        self.pool = DatabasePool::connect(&self.path, false).await?;
        copied?;

        Ok(backup_path)
    }

    /// Path, tables, and schema revision for diagnostics.
    pub async fn db_info(&self) -> Result<DbInfo, DbError> {
        Ok(DbInfo {
            path: self.path.clone(),
            tables: table_names(&self.pool.reader).await?,
            schema_revision: self.get_version().await?.revision,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The pool backing this connector, for constructing a repository.
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
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
    use crate::schema::table_exists;

    fn catalog_at_1_0() -> VersionCatalog {
        VersionCatalog::new(vec![DbVersion::new(REVISION_1_0, 1, 0)])
    }

    fn opts(path: &Path) -> DatabaseOptions {
        DatabaseOptions {
            path: Some(path.to_path_buf()),
            ..Default::default()
        }
    }

    fn backup_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains("_backup_"))
            .collect()
    }

    #[tokio::test]
    async fn test_fresh_database_migrates_to_max_without_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        let db = Database::open(opts(&path), VersionCatalog::default())
            .await
            .unwrap();

        let version = db.get_version().await.unwrap();
        assert_eq!(version, *VersionCatalog::default().max());
        assert!(backup_files(dir.path()).is_empty(), "no backup for a brand-new db");
    }

    #[tokio::test]
    async fn test_missing_directory_without_create_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snkmt.db");

        let mut o = opts(&path);
        o.create_db = false;
        let err = Database::open(o, VersionCatalog::default()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_file_without_create_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        let mut o = opts(&path);
        o.create_db = false;
        let err = Database::open(o, VersionCatalog::default()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_auto_migrate_advances_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        // Seed a database stuck at 1.0.
        let db = Database::open(opts(&path), catalog_at_1_0()).await.unwrap();
        assert_eq!(db.get_version().await.unwrap().revision, REVISION_1_0);
        db.close().await;

        let db = Database::open(opts(&path), VersionCatalog::default())
            .await
            .unwrap();
        assert_eq!(db.get_version().await.unwrap().revision, REVISION_1_1);

        let backups = backup_files(dir.path());
        assert_eq!(backups.len(), 1);
        assert!(backups[0].starts_with("snkmt_backup_"));
        assert!(backups[0].contains(REVISION_1_0), "backup named with pre-migration revision");
        assert!(backups[0].ends_with(".db"));
    }

    #[tokio::test]
    async fn test_outdated_without_auto_migrate_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        let db = Database::open(opts(&path), catalog_at_1_0()).await.unwrap();
        db.close().await;

        let mut o = opts(&path);
        o.auto_migrate = false;
        let err = Database::open(o, VersionCatalog::default()).await.unwrap_err();
        assert!(matches!(err, DbError::Version(_)));
        assert!(err.to_string().contains("1.0"));
        assert!(err.to_string().contains("1.1"));
    }

    #[tokio::test]
    async fn test_outdated_with_ignore_version_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        let db = Database::open(opts(&path), catalog_at_1_0()).await.unwrap();
        db.close().await;

        let mut o = opts(&path);
        o.auto_migrate = false;
        o.ignore_version = true;
        let db = Database::open(o, VersionCatalog::default()).await.unwrap();
        assert_eq!(db.get_version().await.unwrap().revision, REVISION_1_0);
    }

    #[tokio::test]
    async fn test_too_new_database_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        let db = Database::open(opts(&path), VersionCatalog::default())
            .await
            .unwrap();
        // Forge a version row from the future.
        sqlx::query("DELETE FROM snkmt_db_version")
            .execute(&db.pool().writer)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO snkmt_db_version (revision, major, minor, timestamp) VALUES ('ffffffffffff', 9, 0, '2030-01-01T00:00:00Z')",
        )
        .execute(&db.pool().writer)
        .await
        .unwrap();
        db.close().await;

        let err = Database::open(opts(&path), VersionCatalog::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Version(_)));
        assert!(err.to_string().contains("too new"));
    }

    #[tokio::test]
    async fn test_migrate_to_current_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        let mut db = Database::open(opts(&path), VersionCatalog::default())
            .await
            .unwrap();
        let desired = db.catalog.max().clone();
        db.migrate(Some(&desired), false, true).await.unwrap();

        assert!(backup_files(dir.path()).is_empty(), "no-op migration takes no backup");
    }

    #[tokio::test]
    async fn test_migrate_upgrade_only_suppresses_downgrade() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        let mut db = Database::open(opts(&path), VersionCatalog::default())
            .await
            .unwrap();
        let older = db.catalog.min().clone();
        db.migrate(Some(&older), true, false).await.unwrap();

        assert_eq!(db.get_version().await.unwrap().revision, REVISION_1_1);
    }

    #[tokio::test]
    async fn test_explicit_downgrade_drops_newer_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        let mut db = Database::open(opts(&path), VersionCatalog::default())
            .await
            .unwrap();
        let older = db.catalog.min().clone();
        db.migrate(Some(&older), false, false).await.unwrap();

        assert_eq!(db.get_version().await.unwrap().revision, REVISION_1_0);
        assert!(!table_exists(&db.pool().writer, "errors").await.unwrap());
        assert!(table_exists(&db.pool().writer, "workflows").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_step_leaves_version_record_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        let db = Database::open(opts(&path), VersionCatalog::default())
            .await
            .unwrap();
        db.close().await;

        // A catalog that knows a 2.0 this build ships no step for.
        let mut versions = VersionCatalog::default().versions().to_vec();
        versions.push(DbVersion::new("feedbeefcafe", 2, 0));
        let mut o = opts(&path);
        o.auto_migrate = false;
        o.ignore_version = true;
        let mut db = Database::open(o, VersionCatalog::new(versions))
            .await
            .unwrap();

        let err = db.migrate(None, false, false).await.unwrap_err();
        assert!(err.to_string().contains("feedbeefcafe"));

        // The version record still names the last fully-applied version.
        assert_eq!(db.get_version().await.unwrap().revision, REVISION_1_1);
    }

    #[tokio::test]
    async fn test_db_info_reports_tables_and_revision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snkmt.db");

        let db = Database::open(opts(&path), VersionCatalog::default())
            .await
            .unwrap();
        let info = db.db_info().await.unwrap();

        assert_eq!(info.path, path);
        assert_eq!(info.schema_revision, REVISION_1_1);
        assert!(info.tables.iter().any(|t| t == "workflows"));
        assert!(info.tables.iter().any(|t| t == "snkmt_db_version"));
    }
}
