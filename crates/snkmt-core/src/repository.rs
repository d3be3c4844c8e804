//! Workflow repository trait definition.
//!
//! The storage interface over workflow execution state: workflows, rules,
//! jobs, files, and errors. The infrastructure layer (snkmt-db) implements
//! this trait with SQLite persistence. The boundary speaks DTOs only, so
//! callers are insulated from the storage schema.
//!
//! Ordinary "not found" outcomes are `Ok(None)` / `Ok(false)`, never errors.
//! Nested creates validate the full ownership chain (workflow -> rule ->
//! job) and return `Ok(None)` when any link is missing, so a writer can
//! never produce orphaned or cross-workflow rows.
//!
//! Uses native async fn in traits (Rust 2024 edition, no async_trait macro).

use chrono::{DateTime, Utc};
use snkmt_types::dto::{
    CreateError, CreateFile, CreateJob, CreateRule, ErrorDto, FileDto, JobCounts, JobDto, RuleDto,
    UpdateJob, UpdateRule, UpdateWorkflow, WorkflowDto,
};
use snkmt_types::enums::Status;
use snkmt_types::error::RepositoryError;
use uuid::Uuid;

/// Pagination, ordering, and incremental-refresh parameters for list queries.
///
/// `since` is the dashboard's delta mechanism: rows with
/// `updated_at >= since` are returned, so a polling loop can re-fetch only
/// what changed instead of the whole table.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub offset: u32,
    /// Column name to order by; unknown names fall back to the default
    /// column of the listed entity.
    pub order_by: Option<String>,
    pub descending: bool,
    pub since: Option<DateTime<Utc>>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: None,
            offset: 0,
            order_by: None,
            descending: true,
            since: None,
        }
    }
}

/// Repository trait for workflow execution state.
pub trait WorkflowRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Workflows
    // -----------------------------------------------------------------------

    /// Get a workflow by id.
    fn get(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowDto>, RepositoryError>> + Send;

    /// Delete a workflow and all descendant rules, jobs, files, and errors.
    /// Returns `true` if it existed.
    fn delete(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Create a new workflow, returning its id.
    fn create(
        &self,
        workflow: &WorkflowDto,
    ) -> impl std::future::Future<Output = Result<Uuid, RepositoryError>> + Send;

    /// Sparse update of a workflow. Returns `false` when the id is unknown.
    fn update(
        &self,
        update: &UpdateWorkflow,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// List workflows for the dashboard table.
    fn list(
        &self,
        query: &ListQuery,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowDto>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Rules
    // -----------------------------------------------------------------------

    /// List a workflow's rules, optionally only those with at least one job
    /// in the given status.
    fn list_rules(
        &self,
        workflow_id: &Uuid,
        status: Option<Status>,
        query: &ListQuery,
    ) -> impl std::future::Future<Output = Result<Vec<RuleDto>, RepositoryError>> + Send;

    /// Create a rule under a workflow. `Ok(None)` when the workflow is gone.
    fn create_rule(
        &self,
        workflow_id: &Uuid,
        rule: &CreateRule,
    ) -> impl std::future::Future<Output = Result<Option<RuleDto>, RepositoryError>> + Send;

    /// Sparse update of a rule scoped to its workflow.
    fn update_rule(
        &self,
        workflow_id: &Uuid,
        update: &UpdateRule,
    ) -> impl std::future::Future<Output = Result<Option<RuleDto>, RepositoryError>> + Send;

    /// Aggregated job counts for one rule, computed by a dedicated query.
    fn get_rule_job_counts(
        &self,
        workflow_id: &Uuid,
        rule_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<JobCounts>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Jobs
    // -----------------------------------------------------------------------

    /// List all jobs of one rule within a workflow.
    fn list_rule_jobs(
        &self,
        workflow_id: &Uuid,
        rule_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<JobDto>, RepositoryError>> + Send;

    /// Create a job under a rule. Validates that the rule belongs to the
    /// workflow before writing.
    fn create_job(
        &self,
        workflow_id: &Uuid,
        rule_id: i64,
        job: &CreateJob,
    ) -> impl std::future::Future<Output = Result<Option<JobDto>, RepositoryError>> + Send;

    /// Get a job scoped to its workflow.
    fn get_job(
        &self,
        workflow_id: &Uuid,
        job_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<JobDto>, RepositoryError>> + Send;

    /// Sparse update of a job scoped to its rule and workflow.
    fn update_job(
        &self,
        workflow_id: &Uuid,
        rule_id: i64,
        update: &UpdateJob,
    ) -> impl std::future::Future<Output = Result<Option<JobDto>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    /// Attach a file to a job. Validates that the job belongs to the
    /// workflow before writing.
    fn create_file(
        &self,
        workflow_id: &Uuid,
        job_id: i64,
        file: &CreateFile,
    ) -> impl std::future::Future<Output = Result<Option<FileDto>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    /// Record a failure detail against a rule.
    fn create_error(
        &self,
        workflow_id: &Uuid,
        rule_id: i64,
        error: &CreateError,
    ) -> impl std::future::Future<Output = Result<Option<ErrorDto>, RepositoryError>> + Send;

    /// List the recorded errors of one rule, newest first.
    fn list_rule_errors(
        &self,
        workflow_id: &Uuid,
        rule_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ErrorDto>, RepositoryError>> + Send;
}
