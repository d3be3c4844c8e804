//! Status enums shared by entities and DTOs.

use serde::{Deserialize, Serialize};

/// Execution status of a workflow or job, as reported by the monitored engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Running,
    Success,
    Error,
    Unknown,
}

impl Status {
    /// Stable text form used for the `status` TEXT columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Running => "RUNNING",
            Status::Success => "SUCCESS",
            Status::Error => "ERROR",
            Status::Unknown => "UNKNOWN",
        }
    }

    /// Parse the stored text form. Unrecognized values map to `Unknown`
    /// rather than failing a read, so a newer writer cannot poison a reader.
    pub fn parse(s: &str) -> Status {
        match s {
            "RUNNING" => Status::Running,
            "SUCCESS" => Status::Success,
            "ERROR" => Status::Error,
            _ => Status::Unknown,
        }
    }
}

/// Role of a file attached to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    Input,
    Output,
    Log,
    Benchmark,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Input => "INPUT",
            FileType::Output => "OUTPUT",
            FileType::Log => "LOG",
            FileType::Benchmark => "BENCHMARK",
        }
    }

    pub fn parse(s: &str) -> Option<FileType> {
        match s {
            "INPUT" => Some(FileType::Input),
            "OUTPUT" => Some(FileType::Output),
            "LOG" => Some(FileType::Log),
            "BENCHMARK" => Some(FileType::Benchmark),
            _ => None,
        }
    }
}
