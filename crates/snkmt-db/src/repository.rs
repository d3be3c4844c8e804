//! SQLite workflow repository implementation.
//!
//! Implements `WorkflowRepository` from `snkmt-core` using sqlx with split
//! read/write pools. Rows are mapped through plain row structs into the
//! DTOs exposed at the boundary; entity relationships are foreign keys
//! resolved by query, never in-memory back-references.

use chrono::{DateTime, SecondsFormat, Utc};
use snkmt_core::repository::{ListQuery, WorkflowRepository};
use snkmt_types::dto::{
    CreateError, CreateFile, CreateJob, CreateRule, ErrorDto, FileDto, JobCounts, JobDto, RuleDto,
    UpdateJob, UpdateRule, UpdateWorkflow, WorkflowDto,
};
use snkmt_types::enums::Status;
use snkmt_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use crate::pool::DatabasePool;

/// SQLite-backed implementation of `WorkflowRepository`.
pub struct SqliteWorkflowRepository {
    pool: DatabasePool,
}

impl SqliteWorkflowRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn rule_ids(&self, workflow_id: &Uuid) -> Result<Vec<i64>, RepositoryError> {
        let rows = sqlx::query("SELECT id FROM rules WHERE workflow_id = ? ORDER BY id ASC")
            .bind(workflow_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            ids.push(
                row.try_get::<i64, _>("id")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?,
            );
        }
        Ok(ids)
    }

    async fn workflow_exists(&self, workflow_id: &Uuid) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM workflows WHERE id = ?")
            .bind(workflow_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.is_some())
    }

    /// Whether the rule exists and belongs to the given workflow.
    async fn rule_in_workflow(
        &self,
        workflow_id: &Uuid,
        rule_id: i64,
    ) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM rules WHERE id = ? AND workflow_id = ?")
            .bind(rule_id)
            .bind(workflow_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.is_some())
    }

    /// Whether the job exists and belongs to the given workflow.
    async fn job_in_workflow(
        &self,
        workflow_id: &Uuid,
        job_id: i64,
    ) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM jobs WHERE id = ? AND workflow_id = ?")
            .bind(job_id)
            .bind(workflow_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn fetch_rule(
        &self,
        workflow_id: &Uuid,
        rule_id: i64,
    ) -> Result<Option<RuleDto>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM rules WHERE id = ? AND workflow_id = ?")
            .bind(rule_id)
            .bind(workflow_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r =
                    RuleRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_dto()?))
            }
            None => Ok(None),
        }
    }

    async fn fetch_job(
        &self,
        workflow_id: &Uuid,
        job_id: i64,
    ) -> Result<Option<JobDto>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ? AND workflow_id = ?")
            .bind(job_id)
            .bind(workflow_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r =
                    JobRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_dto()?))
            }
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct WorkflowRow {
    id: String,
    snakefile: Option<String>,
    status: String,
    total_job_count: i64,
    jobs_finished: i64,
    started_at: String,
    updated_at: String,
    end_time: Option<String>,
    dryrun: bool,
}

impl WorkflowRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            snakefile: row.try_get("snakefile")?,
            status: row.try_get("status")?,
            total_job_count: row.try_get("total_job_count")?,
            jobs_finished: row.try_get("jobs_finished")?,
            started_at: row.try_get("started_at")?,
            updated_at: row.try_get("updated_at")?,
            end_time: row.try_get("end_time")?,
            dryrun: row.try_get("dryrun")?,
        })
    }

    fn into_dto(self, rule_ids: Vec<i64>) -> Result<WorkflowDto, RepositoryError> {
        let id = parse_uuid(&self.id)?;
        let started_at = parse_datetime(&self.started_at)?;
        let updated_at = parse_datetime(&self.updated_at)?;
        let end_time = self.end_time.as_deref().map(parse_datetime).transpose()?;
        let name = self
            .snakefile
            .clone()
            .unwrap_or_else(|| "unnamed".to_string());

        Ok(WorkflowDto {
            id,
            name,
            snakefile: self.snakefile,
            status: Status::parse(&self.status),
            total_job_count: self.total_job_count,
            jobs_finished: self.jobs_finished,
            started_at,
            updated_at,
            end_time,
            dryrun: self.dryrun,
            rule_ids,
        })
    }
}

struct RuleRow {
    id: i64,
    name: String,
    workflow_id: String,
    total_job_count: i64,
    jobs_finished: i64,
    updated_at: String,
}

impl RuleRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            workflow_id: row.try_get("workflow_id")?,
            total_job_count: row.try_get("total_job_count")?,
            jobs_finished: row.try_get("jobs_finished")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_dto(self) -> Result<RuleDto, RepositoryError> {
        Ok(RuleDto {
            id: self.id,
            workflow_id: parse_uuid(&self.workflow_id)?,
            name: self.name,
            total_job_count: self.total_job_count,
            jobs_finished: self.jobs_finished,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct JobRow {
    id: i64,
    snakemake_id: i64,
    workflow_id: String,
    rule_id: i64,
    status: String,
    threads: i64,
    started_at: String,
    end_time: Option<String>,
    message: Option<String>,
    wildcards: Option<String>,
    reason: Option<String>,
    resources: Option<String>,
    shellcmd: Option<String>,
    priority: Option<i64>,
    group_id: Option<String>,
}

impl JobRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            snakemake_id: row.try_get("snakemake_id")?,
            workflow_id: row.try_get("workflow_id")?,
            rule_id: row.try_get("rule_id")?,
            status: row.try_get("status")?,
            threads: row.try_get("threads")?,
            started_at: row.try_get("started_at")?,
            end_time: row.try_get("end_time")?,
            message: row.try_get("message")?,
            wildcards: row.try_get("wildcards")?,
            reason: row.try_get("reason")?,
            resources: row.try_get("resources")?,
            shellcmd: row.try_get("shellcmd")?,
            priority: row.try_get("priority")?,
            group_id: row.try_get("group_id")?,
        })
    }

    fn into_dto(self) -> Result<JobDto, RepositoryError> {
        let wildcards = self.wildcards.as_deref().map(parse_json).transpose()?;
        let resources = self.resources.as_deref().map(parse_json).transpose()?;

        Ok(JobDto {
            id: self.id,
            snakemake_id: self.snakemake_id,
            workflow_id: parse_uuid(&self.workflow_id)?,
            rule_id: self.rule_id,
            status: Status::parse(&self.status),
            threads: self.threads,
            started_at: parse_datetime(&self.started_at)?,
            end_time: self.end_time.as_deref().map(parse_datetime).transpose()?,
            message: self.message,
            wildcards,
            reason: self.reason,
            resources,
            shellcmd: self.shellcmd,
            priority: self.priority,
            group_id: self.group_id,
        })
    }
}

struct ErrorRow {
    id: i64,
    rule_id: i64,
    message: String,
    exception: Option<String>,
    location: Option<String>,
    timestamp: String,
}

impl ErrorRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            rule_id: row.try_get("rule_id")?,
            message: row.try_get("message")?,
            exception: row.try_get("exception")?,
            location: row.try_get("location")?,
            timestamp: row.try_get("timestamp")?,
        })
    }

    fn into_dto(self) -> Result<ErrorDto, RepositoryError> {
        Ok(ErrorDto {
            id: self.id,
            rule_id: self.rule_id,
            message: self.message,
            exception: self.exception,
            location: self.location,
            timestamp: parse_datetime(&self.timestamp)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-precision RFC 3339, so lexicographic comparison in SQL matches
/// chronological order (the `since` filter relies on this).
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_json(s: &str) -> Result<serde_json::Value, RepositoryError> {
    serde_json::from_str(s).map_err(|e| RepositoryError::Query(format!("invalid JSON: {e}")))
}

fn to_json(value: &Option<serde_json::Value>) -> Result<Option<String>, RepositoryError> {
    value
        .as_ref()
        .map(|v| {
            serde_json::to_string(v).map_err(|e| RepositoryError::Query(e.to_string()))
        })
        .transpose()
}

/// Whitelisted ORDER BY column for workflows; unknown names fall back to
/// the default.
fn workflow_order_column(name: Option<&str>) -> &'static str {
    match name {
        Some("updated_at") => "updated_at",
        Some("status") => "status",
        Some("snakefile") => "snakefile",
        Some("end_time") => "end_time",
        _ => "started_at",
    }
}

fn rule_order_column(name: Option<&str>) -> &'static str {
    match name {
        Some("name") => "name",
        Some("id") => "id",
        _ => "updated_at",
    }
}

// ---------------------------------------------------------------------------
// WorkflowRepository impl
// ---------------------------------------------------------------------------

impl WorkflowRepository for SqliteWorkflowRepository {
    async fn get(&self, workflow_id: &Uuid) -> Result<Option<WorkflowDto>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workflows WHERE id = ?")
            .bind(workflow_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = WorkflowRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                let rule_ids = self.rule_ids(workflow_id).await?;
                Ok(Some(r.into_dto(rule_ids)?))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, workflow_id: &Uuid) -> Result<bool, RepositoryError> {
        // Descendant rules, jobs, files, and errors go with it (ON DELETE
        // CASCADE, foreign keys enforced by the pool).
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(workflow_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn create(&self, workflow: &WorkflowDto) -> Result<Uuid, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO workflows
               (id, snakefile, status, total_job_count, jobs_finished,
                started_at, updated_at, end_time, dryrun)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.snakefile)
        .bind(workflow.status.as_str())
        .bind(workflow.total_job_count)
        .bind(workflow.jobs_finished)
        .bind(format_datetime(&workflow.started_at))
        .bind(format_datetime(&workflow.updated_at))
        .bind(workflow.end_time.as_ref().map(format_datetime))
        .bind(workflow.dryrun)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(workflow.id)
    }

    async fn update(&self, update: &UpdateWorkflow) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE workflows SET
                 status = COALESCE(?, status),
                 total_job_count = COALESCE(?, total_job_count),
                 jobs_finished = COALESCE(?, jobs_finished),
                 end_time = COALESCE(?, end_time),
                 updated_at = ?
               WHERE id = ?"#,
        )
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.total_job_count)
        .bind(update.jobs_finished)
        .bind(update.end_time.as_ref().map(format_datetime))
        .bind(format_datetime(&Utc::now()))
        .bind(update.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<WorkflowDto>, RepositoryError> {
        let column = workflow_order_column(query.order_by.as_deref());
        let direction = if query.descending { "DESC" } else { "ASC" };

        let mut sql = String::from("SELECT * FROM workflows");
        if query.since.is_some() {
            sql.push_str(" WHERE updated_at >= ?");
        }
        sql.push_str(&format!(" ORDER BY {column} {direction} LIMIT ? OFFSET ?"));

        let mut q = sqlx::query(&sql);
        if let Some(since) = &query.since {
            q = q.bind(format_datetime(since));
        }
        q = q
            .bind(query.limit.map(|l| l as i64).unwrap_or(-1))
            .bind(query.offset as i64);

        let rows = q
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut workflows = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = WorkflowRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let workflow_id = parse_uuid(&r.id)?;
            let rule_ids = self.rule_ids(&workflow_id).await?;
            workflows.push(r.into_dto(rule_ids)?);
        }
        Ok(workflows)
    }

    async fn list_rules(
        &self,
        workflow_id: &Uuid,
        status: Option<Status>,
        query: &ListQuery,
    ) -> Result<Vec<RuleDto>, RepositoryError> {
        let column = rule_order_column(query.order_by.as_deref());
        let direction = if query.descending { "DESC" } else { "ASC" };

        // A rule "has status X" iff at least one of its jobs does, hence
        // the join when filtering.
        let mut sql = if status.is_some() {
            String::from(
                "SELECT DISTINCT r.id, r.name, r.workflow_id, r.total_job_count, \
                 r.jobs_finished, r.updated_at \
                 FROM rules r JOIN jobs j ON j.rule_id = r.id \
                 WHERE r.workflow_id = ? AND j.status = ?",
            )
        } else {
            String::from(
                "SELECT r.id, r.name, r.workflow_id, r.total_job_count, \
                 r.jobs_finished, r.updated_at \
                 FROM rules r WHERE r.workflow_id = ?",
            )
        };
        if query.since.is_some() {
            sql.push_str(" AND r.updated_at >= ?");
        }
        sql.push_str(&format!(" ORDER BY r.{column} {direction} LIMIT ? OFFSET ?"));

        let mut q = sqlx::query(&sql).bind(workflow_id.to_string());
        if let Some(status) = status {
            q = q.bind(status.as_str());
        }
        if let Some(since) = &query.since {
            q = q.bind(format_datetime(since));
        }
        q = q
            .bind(query.limit.map(|l| l as i64).unwrap_or(-1))
            .bind(query.offset as i64);

        let rows = q
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = RuleRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            rules.push(r.into_dto()?);
        }
        Ok(rules)
    }

    async fn create_rule(
        &self,
        workflow_id: &Uuid,
        rule: &CreateRule,
    ) -> Result<Option<RuleDto>, RepositoryError> {
        if !self.workflow_exists(workflow_id).await? {
            return Ok(None);
        }

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO rules (name, workflow_id, total_job_count, jobs_finished, updated_at) \
             VALUES (?, ?, ?, 0, ?)",
        )
        .bind(&rule.name)
        .bind(workflow_id.to_string())
        .bind(rule.total_job_count)
        .bind(format_datetime(&now))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(Some(RuleDto {
            id: result.last_insert_rowid(),
            workflow_id: *workflow_id,
            name: rule.name.clone(),
            total_job_count: rule.total_job_count,
            jobs_finished: 0,
            updated_at: now,
        }))
    }

    async fn update_rule(
        &self,
        workflow_id: &Uuid,
        update: &UpdateRule,
    ) -> Result<Option<RuleDto>, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE rules SET
                 total_job_count = COALESCE(?, total_job_count),
                 jobs_finished = COALESCE(?, jobs_finished),
                 updated_at = ?
               WHERE id = ? AND workflow_id = ?"#,
        )
        .bind(update.total_job_count)
        .bind(update.jobs_finished)
        .bind(format_datetime(&Utc::now()))
        .bind(update.id)
        .bind(workflow_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_rule(workflow_id, update.id).await
    }

    async fn get_rule_job_counts(
        &self,
        workflow_id: &Uuid,
        rule_id: i64,
    ) -> Result<Option<JobCounts>, RepositoryError> {
        let rule = sqlx::query("SELECT total_job_count FROM rules WHERE id = ? AND workflow_id = ?")
            .bind(rule_id)
            .bind(workflow_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(rule) = rule else {
            return Ok(None);
        };
        let total: i64 = rule
            .try_get("total_job_count")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let row = sqlx::query(
            r#"SELECT
                 COALESCE(SUM(CASE WHEN status = 'RUNNING' THEN 1 ELSE 0 END), 0) AS running,
                 COALESCE(SUM(CASE WHEN status = 'ERROR' THEN 1 ELSE 0 END), 0) AS failed,
                 COALESCE(SUM(CASE WHEN status = 'SUCCESS' THEN 1 ELSE 0 END), 0) AS success
               FROM jobs WHERE rule_id = ?"#,
        )
        .bind(rule_id)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let running: i64 = row
            .try_get("running")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let failed: i64 = row
            .try_get("failed")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let success: i64 = row
            .try_get("success")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(Some(JobCounts::new(total, running, failed, success)))
    }

    async fn list_rule_jobs(
        &self,
        workflow_id: &Uuid,
        rule_id: i64,
    ) -> Result<Vec<JobDto>, RepositoryError> {
        let rows =
            sqlx::query("SELECT * FROM jobs WHERE workflow_id = ? AND rule_id = ? ORDER BY id ASC")
                .bind(workflow_id.to_string())
                .bind(rule_id)
                .fetch_all(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = JobRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            jobs.push(r.into_dto()?);
        }
        Ok(jobs)
    }

    async fn create_job(
        &self,
        workflow_id: &Uuid,
        rule_id: i64,
        job: &CreateJob,
    ) -> Result<Option<JobDto>, RepositoryError> {
        // Verify the rule belongs to the workflow before writing.
        if !self.rule_in_workflow(workflow_id, rule_id).await? {
            return Ok(None);
        }

        let wildcards = to_json(&job.wildcards)?;
        let resources = to_json(&job.resources)?;

        let result = sqlx::query(
            r#"INSERT INTO jobs
               (snakemake_id, workflow_id, rule_id, status, threads, started_at,
                end_time, message, wildcards, reason, resources, shellcmd,
                priority, group_id)
               VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(job.snakemake_id)
        .bind(workflow_id.to_string())
        .bind(rule_id)
        .bind(job.status.as_str())
        .bind(job.threads)
        .bind(format_datetime(&job.started_at))
        .bind(&job.message)
        .bind(&wildcards)
        .bind(&job.reason)
        .bind(&resources)
        .bind(&job.shellcmd)
        .bind(job.priority)
        .bind(&job.group_id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        self.fetch_job(workflow_id, result.last_insert_rowid()).await
    }

    async fn get_job(
        &self,
        workflow_id: &Uuid,
        job_id: i64,
    ) -> Result<Option<JobDto>, RepositoryError> {
        self.fetch_job(workflow_id, job_id).await
    }

    async fn update_job(
        &self,
        workflow_id: &Uuid,
        rule_id: i64,
        update: &UpdateJob,
    ) -> Result<Option<JobDto>, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE jobs SET
                 status = COALESCE(?, status),
                 end_time = COALESCE(?, end_time)
               WHERE id = ? AND rule_id = ? AND workflow_id = ?"#,
        )
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.end_time.as_ref().map(format_datetime))
        .bind(update.id)
        .bind(rule_id)
        .bind(workflow_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_job(workflow_id, update.id).await
    }

    async fn create_file(
        &self,
        workflow_id: &Uuid,
        job_id: i64,
        file: &CreateFile,
    ) -> Result<Option<FileDto>, RepositoryError> {
        // Verify the job belongs to the workflow before writing.
        if !self.job_in_workflow(workflow_id, job_id).await? {
            return Ok(None);
        }

        let result = sqlx::query("INSERT INTO files (path, file_type, job_id) VALUES (?, ?, ?)")
            .bind(&file.path)
            .bind(file.file_type.as_str())
            .bind(job_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(Some(FileDto {
            id: result.last_insert_rowid(),
            job_id,
            path: file.path.clone(),
            file_type: file.file_type,
        }))
    }

    async fn create_error(
        &self,
        workflow_id: &Uuid,
        rule_id: i64,
        error: &CreateError,
    ) -> Result<Option<ErrorDto>, RepositoryError> {
        if !self.rule_in_workflow(workflow_id, rule_id).await? {
            return Ok(None);
        }

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO errors (rule_id, message, exception, location, timestamp) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(rule_id)
        .bind(&error.message)
        .bind(&error.exception)
        .bind(&error.location)
        .bind(format_datetime(&now))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(Some(ErrorDto {
            id: result.last_insert_rowid(),
            rule_id,
            message: error.message.clone(),
            exception: error.exception.clone(),
            location: error.location.clone(),
            timestamp: now,
        }))
    }

    async fn list_rule_errors(
        &self,
        workflow_id: &Uuid,
        rule_id: i64,
    ) -> Result<Vec<ErrorDto>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT e.id, e.rule_id, e.message, e.exception, e.location, e.timestamp \
             FROM errors e JOIN rules r ON r.id = e.rule_id \
             WHERE e.rule_id = ? AND r.workflow_id = ? \
             ORDER BY e.timestamp DESC, e.id DESC",
        )
        .bind(rule_id)
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut errors = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = ErrorRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            errors.push(r.into_dto()?);
        }
        Ok(errors)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
