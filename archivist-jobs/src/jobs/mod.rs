//! Job runners
//!
//! A [`JobRunner`] takes a claimed job, dispatches on its payload and returns
//! the job in a terminal state. Runners never propagate errors: every failure
//! becomes a `false` outcome plus a localized log line.

pub mod file_import;
pub mod object_move;
pub mod report;
pub mod update_documents;
pub mod worker;

pub use file_import::{FileImportJob, ImportFormat};
pub use object_move::ObjectMoveJob;
pub use report::ReportPackager;
pub use update_documents::UpdateDocumentsJob;
pub use worker::JobWorker;

use crate::importers::ImporterFactory;
use crate::models::{Job, JobOutcome, JobPayload};
use crate::repository::ResourceRepository;
use crate::search::SearchIndex;
use archivist_common::config::TomlConfig;
use archivist_common::events::{EventBus, JobEvent, LogLevel};
use archivist_common::i18n::Catalog;
use chrono::Utc;
use sqlx::SqlitePool;
use std::fmt::Display;
use std::sync::Arc;

/// A running job plus the sinks its log lines go to
pub struct JobContext {
    job: Job,
    events: EventBus,
    catalog: Arc<Catalog>,
}

impl JobContext {
    pub fn new(job: Job, events: EventBus, catalog: Arc<Catalog>) -> Self {
        Self {
            job,
            events,
            catalog,
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn job_mut(&mut self) -> &mut Job {
        &mut self.job
    }

    pub fn into_job(self) -> Job {
        self.job
    }

    pub fn tr(&self, message_id: &str, args: &[&dyn Display]) -> String {
        self.catalog.tr(message_id, args)
    }

    /// Log a catalog message at info level
    pub fn info(&mut self, message_id: &str, args: &[&dyn Display]) {
        let message = self.tr(message_id, args);
        self.log(LogLevel::Info, message);
    }

    /// Log a catalog message at error level
    pub fn error(&mut self, message_id: &str, args: &[&dyn Display]) {
        let message = self.tr(message_id, args);
        self.log(LogLevel::Error, message);
    }

    /// Append a line to the job log, mirror it to tracing and broadcast it
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => tracing::info!(job_id = %self.job.id, "{}", message),
            LogLevel::Error => tracing::error!(job_id = %self.job.id, "{}", message),
        }

        self.events.emit_lossy(JobEvent::JobLogAppended {
            job_id: self.job.id,
            level,
            message: message.clone(),
            timestamp: Utc::now(),
        });
        self.job.append_log(level, message);
    }

    pub fn outcome(&self, success: bool) -> JobOutcome {
        JobOutcome {
            success,
            log_lines: self.job.log_messages(),
            download_path: self.job.download_path.clone(),
        }
    }
}

/// Persist a new pending job and announce it
pub async fn submit(db: &SqlitePool, events: &EventBus, job: &Job) -> archivist_common::Result<()> {
    crate::db::jobs::save_job(db, job).await?;
    tracing::info!(job_id = %job.id, kind = job.kind_name(), user = %job.user.name, "Job queued");
    events.emit_lossy(JobEvent::JobQueued {
        job_id: job.id,
        kind: job.kind_name().to_string(),
        timestamp: Utc::now(),
    });
    Ok(())
}

/// Everything a job runner needs
#[derive(Clone)]
pub struct JobServices {
    pub db: SqlitePool,
    pub repository: Arc<dyn ResourceRepository>,
    pub search: Arc<dyn SearchIndex>,
    pub importers: Arc<dyn ImporterFactory>,
    pub packager: ReportPackager,
    pub events: EventBus,
    pub catalog: Arc<Catalog>,
    pub toml: Arc<TomlConfig>,
}

/// Dispatches a job to the runner for its payload
#[derive(Clone)]
pub struct JobRunner {
    services: JobServices,
}

impl JobRunner {
    pub fn new(services: JobServices) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &JobServices {
        &self.services
    }

    /// Run `job` to a terminal state
    pub async fn run(&self, job: Job) -> Job {
        let services = &self.services;
        let payload = job.payload.clone();
        let mut ctx = JobContext::new(job, services.events.clone(), services.catalog.clone());

        let outcome = match &payload {
            JobPayload::FileImport(params) => {
                match crate::config::resolve_validator_mode(&services.db, &services.toml).await {
                    Ok(mode) => {
                        FileImportJob::new(
                            services.repository.clone(),
                            services.search.clone(),
                            services.importers.clone(),
                            services.packager.clone(),
                            mode,
                        )
                        .run(&mut ctx, params)
                        .await
                    }
                    Err(e) => {
                        ctx.error("job.unexpected_error", &[&e]);
                        ctx.outcome(false)
                    }
                }
            }
            JobPayload::ObjectMove(request) => {
                ObjectMoveJob::new(services.repository.clone(), services.search.clone())
                    .run(&mut ctx, request)
                    .await
            }
            JobPayload::UpdateDocuments(request) => {
                UpdateDocumentsJob::new(services.repository.clone(), services.search.clone())
                    .run(&mut ctx, request)
                    .await
            }
        };

        let mut job = ctx.into_job();
        job.finish(outcome.success);
        tracing::info!(
            job_id = %job.id,
            kind = job.kind_name(),
            status = job.status.as_str(),
            "Job finished"
        );
        job
    }
}
