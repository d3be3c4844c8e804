//! Version-table DDL and stored-version access.
//!
//! Entity tables are owned by the migration steps in [`crate::migrations`];
//! only the version table itself is created eagerly, so a brand-new file can
//! report the null version before its first migration.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::DbError;
use snkmt_types::version::DbVersion;

/// Name of the one-row version table.
pub const VERSION_TABLE: &str = "snkmt_db_version";

const CREATE_VERSION_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS snkmt_db_version (
    revision  TEXT PRIMARY KEY,
    major     INTEGER NOT NULL,
    minor     INTEGER NOT NULL,
    timestamp TEXT NOT NULL
)";

/// Create the version table if it does not exist yet.
pub async fn ensure_version_table(pool: &SqlitePool) -> Result<(), DbError> {
    sqlx::query(CREATE_VERSION_TABLE).execute(pool).await?;
    Ok(())
}

/// Whether a table of the given name exists in the database.
pub async fn table_exists(pool: &SqlitePool, name: &str) -> Result<bool, DbError> {
    let row = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// All table names in the database, for diagnostics.
pub async fn table_names(pool: &SqlitePool) -> Result<Vec<String>, DbError> {
    let rows = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let mut names = Vec::with_capacity(rows.len());
    for row in &rows {
        names.push(row.try_get::<String, _>("name")?);
    }
    Ok(names)
}

/// Read the stored schema version, or the null sentinel when no version
/// table or row exists yet.
pub async fn read_version(pool: &SqlitePool) -> Result<DbVersion, DbError> {
    if !table_exists(pool, VERSION_TABLE).await? {
        return Ok(DbVersion::null());
    }

    let row = sqlx::query(
        "SELECT revision, major, minor, timestamp FROM snkmt_db_version \
         ORDER BY major DESC, minor DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let revision: String = row.try_get("revision")?;
            let major: i32 = row.try_get("major")?;
            let minor: i32 = row.try_get("minor")?;
            let timestamp: String = row.try_get("timestamp")?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            Ok(DbVersion {
                revision,
                major,
                minor,
                timestamp,
            })
        }
        None => Ok(DbVersion::null()),
    }
}

/// Atomically replace the version table's content with a single row for
/// `version`. Runs as its own transaction; on failure the transaction is
/// rolled back and the previous row(s) remain.
pub async fn write_version(pool: &SqlitePool, version: &DbVersion) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM snkmt_db_version")
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO snkmt_db_version (revision, major, minor, timestamp) VALUES (?, ?, ?, ?)")
        .bind(&version.revision)
        .bind(version.major)
        .bind(version.minor)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;
    tx.commit().await
}
