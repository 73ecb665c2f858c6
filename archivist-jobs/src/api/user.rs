//! Requesting user, as asserted by the fronting application

use crate::error::ApiError;
use crate::models::JobUser;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

pub const USER_HEADER: &str = "x-archivist-user";
pub const ADMIN_HEADER: &str = "x-archivist-admin";

/// User taken from the `x-archivist-user` / `x-archivist-admin` headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUser(pub JobUser);

impl RequestUser {
    pub fn is_administrator(&self) -> bool {
        self.0.is_administrator
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let name = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ApiError::Forbidden(format!("{} header required", USER_HEADER)))?;

        let is_administrator = parts
            .headers
            .get(ADMIN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(is_truthy)
            .unwrap_or(false);

        Ok(RequestUser(JobUser {
            name: name.to_string(),
            is_administrator,
        }))
    }
}
