//! Job worker loop
//!
//! Each worker polls the job table, claims one pending job at a time and
//! runs it to completion. Several workers may poll the same database; the
//! atomic claim guarantees a job runs once.

use super::JobRunner;
use crate::db::jobs::{claim_next_pending, force_fail_job, save_job};
use crate::models::JobStatus;
use archivist_common::events::JobEvent;
use archivist_common::Result;
use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct JobWorker {
    id: usize,
    runner: JobRunner,
    poll_interval: Duration,
}

impl JobWorker {
    pub fn new(id: usize, runner: JobRunner, poll_interval: Duration) -> Self {
        Self {
            id,
            runner,
            poll_interval,
        }
    }

    /// Claim and run one pending job
    ///
    /// Returns `Ok(false)` when nothing was pending.
    pub async fn run_once(&self) -> Result<bool> {
        let services = self.runner.services();
        let Some(job) = claim_next_pending(&services.db).await? else {
            return Ok(false);
        };

        let job_id = job.id;
        info!(worker = self.id, job_id = %job_id, kind = job.kind_name(), "Job claimed");
        services.events.emit_lossy(JobEvent::JobStarted {
            job_id,
            worker: self.id,
            timestamp: Utc::now(),
        });

        let finished = self.runner.run(job).await;

        if let Err(e) = save_job(&services.db, &finished).await {
            error!(worker = self.id, job_id = %job_id, error = %e, "Failed to save finished job - attempting direct status update");
            if let Err(fallback) = force_fail_job(&services.db, job_id).await {
                error!(worker = self.id, job_id = %job_id, error = %fallback, "Failed to mark job as failed");
            }
            services.events.emit_lossy(JobEvent::JobFinished {
                job_id,
                success: false,
                download_path: None,
                timestamp: Utc::now(),
            });
            return Err(e);
        }

        services.events.emit_lossy(JobEvent::JobFinished {
            job_id,
            success: finished.status == JobStatus::Completed,
            download_path: finished.download_path.clone(),
            timestamp: Utc::now(),
        });
        Ok(true)
    }

    /// Poll until `cancel` fires
    ///
    /// A running job is always finished before the loop checks for
    /// cancellation again.
    pub async fn run(self, cancel: CancellationToken) {
        info!(worker = self.id, "Job worker started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let ran = match self.run_once().await {
                Ok(ran) => ran,
                Err(e) => {
                    error!(worker = self.id, error = %e, "Job worker iteration failed");
                    false
                }
            };

            if ran {
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {
                    debug!(worker = self.id, "Polling for pending jobs");
                }
            }
        }

        info!(worker = self.id, "Job worker stopped");
    }
}
