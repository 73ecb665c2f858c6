//! Job database operations
//!
//! Jobs are persisted when submitted, when claimed by a worker and when they
//! finish. Claiming is an atomic `UPDATE ... WHERE status = 'pending'`, so
//! two workers never run the same job.

use crate::models::{Job, JobLogEntry, JobPayload, JobStatus, JobUser};
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use archivist_common::events::LogLevel;
use archivist_common::i18n::Catalog;
use archivist_common::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

const JOB_COLUMNS: &str = "id, kind, payload, user_name, user_is_admin, status, log, \
     warn_count, error_count, download_path, created_at, started_at, ended_at";

/// Insert or update a job
pub async fn save_job(pool: &SqlitePool, job: &Job) -> Result<()> {
    // Serialize before touching the database
    let id = job.id.to_string();
    let payload = serde_json::to_string(&job.payload)
        .map_err(|e| Error::Internal(format!("Failed to serialize payload: {}", e)))?;
    let log = serde_json::to_string(&job.log)
        .map_err(|e| Error::Internal(format!("Failed to serialize log: {}", e)))?;
    let created_at = job.created_at.to_rfc3339();
    let started_at = job.started_at.map(|dt| dt.to_rfc3339());
    let ended_at = job.ended_at.map(|dt| dt.to_rfc3339());
    let warn_count = job.warn_count.map(|n| n as i64);
    let error_count = job.error_count.map(|n| n as i64);

    retry_on_lock("save_job", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, kind, payload, user_name, user_is_admin, status, log,
                warn_count, error_count, download_path, created_at, started_at, ended_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                log = excluded.log,
                warn_count = excluded.warn_count,
                error_count = excluded.error_count,
                download_path = excluded.download_path,
                started_at = excluded.started_at,
                ended_at = excluded.ended_at
            "#,
        )
        .bind(&id)
        .bind(job.kind_name())
        .bind(&payload)
        .bind(&job.user.name)
        .bind(job.user.is_administrator)
        .bind(job.status.as_str())
        .bind(&log)
        .bind(warn_count)
        .bind(error_count)
        .bind(&job.download_path)
        .bind(&created_at)
        .bind(&started_at)
        .bind(&ended_at)
        .execute(pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    })
    .await
}

/// Load a job by id
pub async fn load_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<Job>> {
    let row = sqlx::query(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
        .bind(job_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|row| job_from_row(&row)).transpose()
}

/// Most recent jobs first
pub async fn list_jobs(pool: &SqlitePool, limit: i64) -> Result<Vec<Job>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM jobs ORDER BY created_at DESC LIMIT ?",
        JOB_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// Claim the oldest pending job, marking it running
///
/// Returns `None` when nothing is pending or another worker won the race.
pub async fn claim_next_pending(pool: &SqlitePool) -> Result<Option<Job>> {
    let candidate: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM jobs WHERE status = 'pending' ORDER BY created_at ASC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    let Some((id,)) = candidate else {
        return Ok(None);
    };

    let started_at = Utc::now().to_rfc3339();
    let claimed = retry_on_lock("claim_job", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'running', started_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(&started_at)
        .bind(&id)
        .execute(pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() == 1)
    })
    .await?;

    if !claimed {
        tracing::debug!(job_id = %id, "Job claimed by another worker");
        return Ok(None);
    }

    let row = sqlx::query(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
        .bind(&id)
        .fetch_optional(pool)
        .await?;
    row.map(|row| job_from_row(&row)).transpose()
}

/// Mark a job failed without rewriting its log
///
/// Fallback for when the full job record could not be saved.
pub async fn force_fail_job(pool: &SqlitePool, job_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE jobs SET status = 'failed', ended_at = ? WHERE id = ? AND status = 'running'")
        .bind(Utc::now().to_rfc3339())
        .bind(job_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Fail jobs left running by a previous process
///
/// Called once at startup, before workers start.
pub async fn fail_stale_jobs(pool: &SqlitePool, catalog: &Catalog) -> Result<usize> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM jobs WHERE status = 'running'",
        JOB_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    let mut recovered = 0;
    for row in rows {
        let mut job = job_from_row(&row)?;
        job.append_log(LogLevel::Error, catalog.tr("job.interrupted", &[]));
        job.finish(false);
        save_job(pool, &job).await?;
        tracing::warn!(job_id = %job.id, kind = job.kind_name(), "Marked stale running job as failed");
        recovered += 1;
    }

    Ok(recovered)
}

fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("Invalid job id {}: {}", id, e)))?;

    let payload: String = row.get("payload");
    let payload: JobPayload = serde_json::from_str(&payload)
        .map_err(|e| Error::Internal(format!("Failed to deserialize payload: {}", e)))?;

    let status: String = row.get("status");
    let status = JobStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown job status: {}", status)))?;

    let log: String = row.get("log");
    let log: Vec<JobLogEntry> = serde_json::from_str(&log)
        .map_err(|e| Error::Internal(format!("Failed to deserialize log: {}", e)))?;

    let created_at: String = row.get("created_at");
    let started_at: Option<String> = row.get("started_at");
    let ended_at: Option<String> = row.get("ended_at");

    Ok(Job {
        id,
        payload,
        user: JobUser {
            name: row.get("user_name"),
            is_administrator: row.get("user_is_admin"),
        },
        status,
        log,
        warn_count: row.get::<Option<i64>, _>("warn_count").map(|n| n as usize),
        error_count: row.get::<Option<i64>, _>("error_count").map(|n| n as usize),
        download_path: row.get("download_path"),
        created_at: parse_timestamp(&created_at)?,
        started_at: started_at.as_deref().map(parse_timestamp).transpose()?,
        ended_at: ended_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp {}: {}", value, e)))
}
