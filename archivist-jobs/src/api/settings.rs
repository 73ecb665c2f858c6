//! Settings API
//!
//! GET/PUT /settings/csv-validator. The database value is authoritative and
//! applies to the next import job without a restart.

use super::RequestUser;
use crate::error::{ApiError, ApiResult};
use crate::models::ValidatorMode;
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidatorModeBody {
    /// `off`, `permissive` or `strict`
    pub mode: String,
}

/// GET /settings/csv-validator
pub async fn get_validator_mode(State(state): State<AppState>) -> ApiResult<Json<ValidatorModeBody>> {
    let mode = crate::config::resolve_validator_mode(&state.db, &state.toml).await?;
    Ok(Json(ValidatorModeBody {
        mode: mode.to_string(),
    }))
}

/// PUT /settings/csv-validator
///
/// Administrators only.
pub async fn set_validator_mode(
    State(state): State<AppState>,
    user: RequestUser,
    Json(body): Json<ValidatorModeBody>,
) -> ApiResult<Json<ValidatorModeBody>> {
    if !user.is_administrator() {
        return Err(ApiError::Forbidden(
            "Only administrators may change the CSV validator mode".to_string(),
        ));
    }

    let mode: ValidatorMode = body.mode.parse().map_err(ApiError::BadRequest)?;
    crate::db::settings::set_csv_validator_mode(&state.db, mode).await?;
    info!(mode = %mode, user = user.name(), "CSV validator mode changed");

    Ok(Json(ValidatorModeBody {
        mode: mode.to_string(),
    }))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route(
        "/settings/csv-validator",
        get(get_validator_mode).put(set_validator_mode),
    )
}
