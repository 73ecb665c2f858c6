//! Term API
//!
//! POST /terms/:id/rename

use super::RequestUser;
use crate::error::ApiResult;
use crate::terms::RenameOutcome;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

pub async fn rename_term(
    State(state): State<AppState>,
    Path(term_id): Path<i64>,
    user: RequestUser,
    Json(request): Json<RenameRequest>,
) -> ApiResult<Json<RenameOutcome>> {
    let outcome = state.terms.rename(term_id, &request.name, user.0).await?;
    Ok(Json(outcome))
}

/// Build term routes
pub fn term_routes() -> Router<AppState> {
    Router::new().route("/terms/:id/rename", post(rename_term))
}
