//! Data transfer objects exposed at the repository boundary.
//!
//! Callers (the dashboard and the log-event writer) only ever see these
//! plain value types, never the storage schema. Update DTOs are sparse:
//! only fields set to `Some` are applied to the stored entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{FileType, Status};

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// One execution run of the monitored engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDto {
    pub id: Uuid,
    /// Display name; falls back to the snakefile path when unnamed.
    pub name: String,
    pub snakefile: Option<String>,
    pub status: Status,
    pub total_job_count: i64,
    pub jobs_finished: i64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub dryrun: bool,
    /// Ids of the rules owned by this workflow, in insertion order.
    #[serde(default)]
    pub rule_ids: Vec<i64>,
}

impl WorkflowDto {
    /// Fraction of jobs finished, `0.0` when no jobs are expected.
    pub fn progress(&self) -> f64 {
        progress(self.jobs_finished, self.total_job_count)
    }
}

/// Sparse update for a workflow. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWorkflow {
    pub id: Uuid,
    pub status: Option<Status>,
    pub total_job_count: Option<i64>,
    pub jobs_finished: Option<i64>,
    pub end_time: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A named unit of work within a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDto {
    pub id: i64,
    pub workflow_id: Uuid,
    pub name: String,
    pub total_job_count: i64,
    pub jobs_finished: i64,
    pub updated_at: DateTime<Utc>,
}

impl RuleDto {
    pub fn progress(&self) -> f64 {
        progress(self.jobs_finished, self.total_job_count)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRule {
    pub name: String,
    pub total_job_count: i64,
}

/// Sparse update for a rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRule {
    pub id: i64,
    pub total_job_count: Option<i64>,
    pub jobs_finished: Option<i64>,
}

/// Aggregated job counts for one rule, computed on demand.
///
/// Jobs the engine has not yet logged are implicitly pending:
/// `pending = total - (running + failed + success)`, clamped at zero so a
/// race between count updates and job inserts can never report a negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub total: i64,
    pub running: i64,
    pub pending: i64,
    pub failed: i64,
    pub success: i64,
}

impl JobCounts {
    pub fn new(total: i64, running: i64, failed: i64, success: i64) -> Self {
        let pending = (total - running - failed - success).max(0);
        Self {
            total,
            running,
            pending,
            failed,
            success,
        }
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One concrete task instance executing a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDto {
    pub id: i64,
    /// Engine-native job id.
    pub snakemake_id: i64,
    pub workflow_id: Uuid,
    pub rule_id: i64,
    pub status: Status,
    pub threads: i64,
    pub started_at: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub wildcards: Option<serde_json::Value>,
    pub reason: Option<String>,
    pub resources: Option<serde_json::Value>,
    pub shellcmd: Option<String>,
    pub priority: Option<i64>,
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub snakemake_id: i64,
    pub status: Status,
    pub threads: i64,
    pub started_at: DateTime<Utc>,
    pub message: Option<String>,
    pub wildcards: Option<serde_json::Value>,
    pub reason: Option<String>,
    pub resources: Option<serde_json::Value>,
    pub shellcmd: Option<String>,
    pub priority: Option<i64>,
    pub group_id: Option<String>,
}

/// Sparse update for a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateJob {
    pub id: i64,
    pub status: Option<Status>,
    pub end_time: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDto {
    pub id: i64,
    pub job_id: i64,
    pub path: String,
    pub file_type: FileType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFile {
    pub path: String,
    pub file_type: FileType,
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Failure detail captured for a rule, feeding the error summary panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDto {
    pub id: i64,
    pub rule_id: i64,
    pub message: String,
    pub exception: Option<String>,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateError {
    pub message: String,
    pub exception: Option<String>,
    pub location: Option<String>,
}

fn progress(finished: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        finished as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_zero_total_is_zero() {
        let rule = RuleDto {
            id: 1,
            workflow_id: Uuid::new_v4(),
            name: "align".to_string(),
            total_job_count: 0,
            jobs_finished: 0,
            updated_at: Utc::now(),
        };
        assert_eq!(rule.progress(), 0.0);
    }

    #[test]
    fn test_progress_fraction() {
        let wf = WorkflowDto {
            id: Uuid::new_v4(),
            name: "Snakefile".to_string(),
            snakefile: Some("Snakefile".to_string()),
            status: Status::Running,
            total_job_count: 4,
            jobs_finished: 1,
            started_at: Utc::now(),
            updated_at: Utc::now(),
            end_time: None,
            dryrun: false,
            rule_ids: vec![],
        };
        assert_eq!(wf.progress(), 0.25);
    }

    #[test]
    fn test_job_counts_pending() {
        let counts = JobCounts::new(10, 2, 1, 3);
        assert_eq!(counts.pending, 4);
        assert_eq!(counts.total, 10);
    }

    #[test]
    fn test_job_counts_pending_clamped_at_zero() {
        // Count updates can race job inserts; never report negative pending.
        let counts = JobCounts::new(2, 2, 1, 1);
        assert_eq!(counts.pending, 0);
    }

    #[test]
    fn test_sparse_update_default_is_all_none() {
        let upd = UpdateWorkflow {
            id: Uuid::new_v4(),
            ..Default::default()
        };
        assert!(upd.status.is_none());
        assert!(upd.total_job_count.is_none());
        assert!(upd.jobs_finished.is_none());
        assert!(upd.end_time.is_none());
    }
}
