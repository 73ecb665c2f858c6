//! Job model
//!
//! A job is created pending when a user submits a request, claimed by exactly
//! one worker, and ends completed or failed. The log is append-only.

use super::import_params::ImportParameters;
use super::move_request::MoveRequest;
use archivist_common::events::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// User who submitted the job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JobUser {
    pub name: String,
    #[serde(default)]
    pub is_administrator: bool,
}

/// One line of the job log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub level: LogLevel,
    pub message: String,
    pub logged_at: DateTime<Utc>,
}

/// Search documents to rebuild after a term rename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentsRequest {
    pub object_ids: Vec<i64>,
    #[serde(default)]
    pub term_id: Option<i64>,
}

/// What a job does, with its parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "parameters", rename_all = "snake_case")]
pub enum JobPayload {
    FileImport(ImportParameters),
    ObjectMove(MoveRequest),
    UpdateDocuments(UpdateDocumentsRequest),
}

impl JobPayload {
    pub fn kind_name(&self) -> &'static str {
        match self {
            JobPayload::FileImport(_) => "file_import",
            JobPayload::ObjectMove(_) => "object_move",
            JobPayload::UpdateDocuments(_) => "update_documents",
        }
    }
}

/// Persistent job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub payload: JobPayload,
    pub user: JobUser,
    pub status: JobStatus,
    pub log: Vec<JobLogEntry>,
    pub warn_count: Option<usize>,
    pub error_count: Option<usize>,
    /// Relative to the root folder, e.g. `downloads/jobs/<id>.zip`
    pub download_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(payload: JobPayload, user: JobUser) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            user,
            status: JobStatus::Pending,
            log: Vec::new(),
            warn_count: None,
            error_count: None,
            download_path: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        self.payload.kind_name()
    }

    pub fn append_log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.log.push(JobLogEntry {
            level,
            message: message.into(),
            logged_at: Utc::now(),
        });
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Move to a terminal state. Terminal jobs are never reopened.
    pub fn finish(&mut self, success: bool) {
        if self.status.is_terminal() {
            return;
        }
        self.status = if success {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        self.ended_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn log_messages(&self) -> Vec<String> {
        self.log.iter().map(|entry| entry.message.clone()).collect()
    }
}

/// Result of running a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub success: bool,
    pub log_lines: Vec<String>,
    pub download_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn move_job() -> Job {
        Job::new(
            JobPayload::ObjectMove(MoveRequest {
                object_id: 5,
                parent_id: None,
                old_position: None,
                new_position: None,
            }),
            JobUser::default(),
        )
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = move_job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.kind_name(), "object_move");
        assert!(job.log.is_empty());
    }

    #[test]
    fn test_terminal_job_stays_terminal() {
        let mut job = move_job();
        job.mark_running();
        job.finish(false);
        job.finish(true);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.ended_at.is_some());
    }

    #[test]
    fn test_payload_serializes_with_kind_tag() {
        let job = move_job();
        let json = serde_json::to_value(&job.payload).unwrap();
        assert_eq!(json["kind"], "object_move");
        assert_eq!(json["parameters"]["objectId"], 5);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("queued"), None);
    }
}
