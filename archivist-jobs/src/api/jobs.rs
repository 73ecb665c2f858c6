//! Job API handlers
//!
//! POST /jobs/import, POST /jobs/move, GET /jobs, GET /jobs/:id,
//! GET /jobs/:id/download

use super::RequestUser;
use crate::error::{ApiError, ApiResult};
use crate::jobs::submit;
use crate::models::{ImportParameters, Job, JobPayload, JobStatus, MoveRequest};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

/// Response for accepted job submissions
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: Uuid,
    pub kind: String,
    pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

async fn accept(state: &AppState, job: Job) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    submit(&state.db, &state.event_bus, &job).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job_id: job.id,
            kind: job.kind_name().to_string(),
            status: job.status,
        }),
    ))
}

/// POST /jobs/import
///
/// The file must already sit in the uploads folder. The import type is not
/// checked here: an unknown type fails the job with a log line.
pub async fn submit_import(
    State(state): State<AppState>,
    user: RequestUser,
    Json(params): Json<ImportParameters>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    if let Some(file) = &params.file {
        let uploads = tokio::fs::canonicalize(state.layout.uploads_dir())
            .await
            .map_err(|e| ApiError::Internal(format!("Uploads folder unavailable: {}", e)))?;
        let uploaded = tokio::fs::canonicalize(&file.tmp_name).await.map_err(|_| {
            ApiError::BadRequest(format!("Uploaded file not found: {}", file.name))
        })?;
        if !uploaded.starts_with(&uploads) {
            return Err(ApiError::BadRequest(format!(
                "Uploaded file must be inside the uploads folder: {}",
                file.name
            )));
        }
    }

    accept(&state, Job::new(JobPayload::FileImport(params), user.0)).await
}

/// POST /jobs/move
pub async fn submit_move(
    State(state): State<AppState>,
    user: RequestUser,
    Json(request): Json<MoveRequest>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    accept(&state, Job::new(JobPayload::ObjectMove(request), user.0)).await
}

/// GET /jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    let job = crate::db::jobs::load_job(&state.db, job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))?;
    Ok(Json(job))
}

/// GET /jobs?limit=N
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    Ok(Json(crate::db::jobs::list_jobs(&state.db, limit).await?))
}

/// GET /jobs/:id/download
///
/// Only the submitting user or an administrator may fetch the archive.
pub async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: RequestUser,
) -> ApiResult<impl IntoResponse> {
    let job = crate::db::jobs::load_job(&state.db, job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))?;

    if !user.is_administrator() && user.name() != job.user.name {
        return Err(ApiError::Forbidden(format!(
            "Job {} belongs to another user",
            job_id
        )));
    }

    let relative = job
        .download_path
        .ok_or_else(|| ApiError::NotFound(format!("Job {} has no download", job_id)))?;
    let bytes = tokio::fs::read(state.packager.resolve(&relative)).await?;

    tracing::info!(job_id = %job_id, user = user.name(), bytes = bytes.len(), "Job download served");

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.zip\"", job_id),
            ),
        ],
        bytes,
    ))
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/import", post(submit_import))
        .route("/jobs/move", post(submit_move))
        .route("/jobs/events", get(super::job_event_stream))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/download", get(download))
}
