//! Event types for the archivist event system
//!
//! Job lifecycle events are broadcast via [`EventBus`] and serialized for SSE
//! transmission to the job status UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Severity of a job log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

/// Job lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    /// Job accepted and persisted as pending
    JobQueued {
        job_id: Uuid,
        kind: String,
        timestamp: DateTime<Utc>,
    },

    /// A worker claimed the job
    JobStarted {
        job_id: Uuid,
        worker: usize,
        timestamp: DateTime<Utc>,
    },

    /// A line was appended to the job log
    JobLogAppended {
        job_id: Uuid,
        level: LogLevel,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Job reached a terminal state
    JobFinished {
        job_id: Uuid,
        success: bool,
        download_path: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            JobEvent::JobQueued { .. } => "JobQueued",
            JobEvent::JobStarted { .. } => "JobStarted",
            JobEvent::JobLogAppended { .. } => "JobLogAppended",
            JobEvent::JobFinished { .. } => "JobFinished",
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            JobEvent::JobQueued { job_id, .. }
            | JobEvent::JobStarted { job_id, .. }
            | JobEvent::JobLogAppended { job_id, .. }
            | JobEvent::JobFinished { job_id, .. } => *job_id,
        }
    }
}

/// Broadcast channel for job events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<JobEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: JobEvent) -> Result<usize, broadcast::error::SendError<JobEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let job_id = Uuid::new_v4();

        bus.emit(JobEvent::JobQueued {
            job_id,
            kind: "file_import".to_string(),
            timestamp: Utc::now(),
        })
        .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.job_id(), job_id);
        assert_eq!(event.event_type(), "JobQueued");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        let event = JobEvent::JobStarted {
            job_id: Uuid::new_v4(),
            worker: 0,
            timestamp: Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = JobEvent::JobLogAppended {
            job_id: Uuid::nil(),
            level: LogLevel::Error,
            message: "Invalid object id".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "JobLogAppended");
        assert_eq!(json["level"], "error");
    }
}
