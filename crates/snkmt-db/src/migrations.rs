//! Ordered schema migration steps.
//!
//! Each step pairs a catalog revision with the SQL that reaches it from the
//! previous version (`up`) and the SQL that leaves it again (`down`). Steps
//! run one per transaction; a failed step aborts the whole migration and
//! leaves the version record at the last successfully-reached version.

use snkmt_core::catalog::{REVISION_1_0, REVISION_1_1, VersionCatalog};
use snkmt_types::version::DbVersion;
use sqlx::SqlitePool;

use crate::error::DbError;

/// One reversible schema transformation between two catalog versions.
pub struct MigrationStep {
    pub revision: &'static str,
    pub up_sql: &'static str,
    pub down_sql: &'static str,
}

const V1_0_UP: &str = "\
CREATE TABLE IF NOT EXISTS workflows (
    id              TEXT PRIMARY KEY,
    snakefile       TEXT,
    status          TEXT NOT NULL,
    total_job_count INTEGER NOT NULL DEFAULT 0,
    jobs_finished   INTEGER NOT NULL DEFAULT 0,
    started_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    end_time        TEXT,
    dryrun          INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS rules (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    workflow_id     TEXT NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
    total_job_count INTEGER NOT NULL DEFAULT 0,
    jobs_finished   INTEGER NOT NULL DEFAULT 0,
    updated_at      TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS jobs (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    snakemake_id INTEGER NOT NULL,
    workflow_id  TEXT NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
    rule_id      INTEGER NOT NULL REFERENCES rules(id) ON DELETE CASCADE,
    status       TEXT NOT NULL,
    threads      INTEGER NOT NULL DEFAULT 1,
    started_at   TEXT NOT NULL,
    end_time     TEXT,
    message      TEXT,
    wildcards    TEXT,
    reason       TEXT,
    resources    TEXT,
    shellcmd     TEXT,
    priority     INTEGER,
    group_id     TEXT
);
CREATE TABLE IF NOT EXISTS files (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    path      TEXT NOT NULL,
    file_type TEXT NOT NULL,
    job_id    INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_rules_workflow_id ON rules(workflow_id);
CREATE INDEX IF NOT EXISTS idx_jobs_workflow_id ON jobs(workflow_id);
CREATE INDEX IF NOT EXISTS idx_jobs_rule_id ON jobs(rule_id);
CREATE INDEX IF NOT EXISTS idx_files_job_id ON files(job_id);
";

const V1_0_DOWN: &str = "\
DROP TABLE IF EXISTS files;
DROP TABLE IF EXISTS jobs;
DROP TABLE IF EXISTS rules;
DROP TABLE IF EXISTS workflows;
";

const V1_1_UP: &str = "\
CREATE TABLE IF NOT EXISTS errors (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    rule_id   INTEGER NOT NULL REFERENCES rules(id) ON DELETE CASCADE,
    message   TEXT NOT NULL,
    exception TEXT,
    location  TEXT,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_errors_rule_id ON errors(rule_id);
CREATE INDEX IF NOT EXISTS idx_workflows_updated_at ON workflows(updated_at);
CREATE INDEX IF NOT EXISTS idx_rules_updated_at ON rules(updated_at);
";

const V1_1_DOWN: &str = "\
DROP INDEX IF EXISTS idx_rules_updated_at;
DROP INDEX IF EXISTS idx_workflows_updated_at;
DROP TABLE IF EXISTS errors;
";

/// The steps this build ships, aligned 1:1 with the default catalog.
pub fn migration_steps() -> &'static [MigrationStep] {
    &[
        MigrationStep {
            revision: REVISION_1_0,
            up_sql: V1_0_UP,
            down_sql: V1_0_DOWN,
        },
        MigrationStep {
            revision: REVISION_1_1,
            up_sql: V1_1_UP,
            down_sql: V1_1_DOWN,
        },
    ]
}

fn step_for(revision: &str) -> Result<&'static MigrationStep, DbError> {
    migration_steps()
        .iter()
        .find(|s| s.revision == revision)
        .ok_or_else(|| {
            DbError::Version(format!(
                "no migration step registered for revision {revision}"
            ))
        })
}

async fn apply(pool: &SqlitePool, revision: &str, sql: &str) -> Result<(), DbError> {
    let mut tx = pool.begin().await.map_err(|source| DbError::Migration {
        revision: revision.to_string(),
        source,
    })?;
    sqlx::raw_sql(sql)
        .execute(&mut *tx)
        .await
        .map_err(|source| DbError::Migration {
            revision: revision.to_string(),
            source,
        })?;
    tx.commit().await.map_err(|source| DbError::Migration {
        revision: revision.to_string(),
        source,
    })
}

/// Run the ordered steps between `current` and `desired` on the writer
/// connection: ascending `up` steps for an upgrade, descending `down` steps
/// for a downgrade. Does not touch the version record.
pub async fn run_steps(
    pool: &SqlitePool,
    catalog: &VersionCatalog,
    current: &DbVersion,
    desired: &DbVersion,
) -> Result<(), DbError> {
    if desired > current {
        for version in catalog.versions() {
            if version > current && version <= desired {
                let step = step_for(&version.revision)?;
                tracing::debug!(revision = step.revision, "applying upgrade step");
                apply(pool, step.revision, step.up_sql).await?;
            }
        }
    } else {
        for version in catalog.versions().iter().rev() {
            if version <= current && version > desired {
                let step = step_for(&version.revision)?;
                tracing::debug!(revision = step.revision, "applying downgrade step");
                apply(pool, step.revision, step.down_sql).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DatabasePool;
    use crate::schema::table_exists;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        DatabasePool::connect(&path, true).await.unwrap()
    }

    #[tokio::test]
    async fn test_upgrade_from_null_creates_all_tables() {
        let pool = test_pool().await;
        let catalog = VersionCatalog::default();

        run_steps(
            &pool.writer,
            &catalog,
            &DbVersion::null(),
            catalog.max(),
        )
        .await
        .unwrap();

        for table in ["workflows", "rules", "jobs", "files", "errors"] {
            assert!(
                table_exists(&pool.writer, table).await.unwrap(),
                "{table} missing"
            );
        }
    }

    #[tokio::test]
    async fn test_downgrade_drops_errors_table_only() {
        let pool = test_pool().await;
        let catalog = VersionCatalog::default();

        run_steps(&pool.writer, &catalog, &DbVersion::null(), catalog.max())
            .await
            .unwrap();
        run_steps(&pool.writer, &catalog, catalog.max(), catalog.min())
            .await
            .unwrap();

        assert!(!table_exists(&pool.writer, "errors").await.unwrap());
        assert!(table_exists(&pool.writer, "workflows").await.unwrap());
        assert!(table_exists(&pool.writer, "jobs").await.unwrap());
    }

    #[tokio::test]
    async fn test_unregistered_revision_is_an_error() {
        let pool = test_pool().await;
        let catalog = VersionCatalog::new(vec![DbVersion::new("feedbeefcafe", 9, 0)]);

        let err = run_steps(&pool.writer, &catalog, &DbVersion::null(), catalog.max())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("feedbeefcafe"));
    }
}
