//! archivist-jobs library interface
//!
//! Background job service for an archival description database: file
//! imports (CSV, EAD XML, SKOS) with pre-flight validation, object moves in
//! nested-set trees, and search document maintenance.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod importers;
pub mod jobs;
pub mod models;
pub mod repository;
pub mod search;
pub mod terms;
pub mod utils;
pub mod validators;

pub use crate::error::{ApiError, ApiResult};

use crate::config::JobsConfig;
use crate::importers::DefaultImporters;
use crate::jobs::{JobServices, ReportPackager};
use crate::repository::SqliteRepository;
use crate::search::SqliteSearchIndex;
use crate::terms::TermService;
use archivist_common::config::{RootLayout, TomlConfig};
use archivist_common::events::EventBus;
use archivist_common::i18n::Catalog;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Wire the SQLite-backed repository, search index and importers together
pub fn job_services(
    db: SqlitePool,
    layout: &RootLayout,
    toml: Arc<TomlConfig>,
    catalog: Arc<Catalog>,
    events: EventBus,
) -> JobServices {
    let config = JobsConfig::from_toml(&toml);
    JobServices {
        repository: Arc::new(SqliteRepository::new(db.clone())),
        search: Arc::new(SqliteSearchIndex::new(db.clone())),
        importers: Arc::new(DefaultImporters::new(
            config.culture,
            config.csv_transform_command,
        )),
        packager: ReportPackager::new(layout),
        db,
        events,
        catalog,
        toml,
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub layout: RootLayout,
    pub packager: ReportPackager,
    pub toml: Arc<TomlConfig>,
    pub terms: TermService,
    pub worker_count: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(services: &JobServices, layout: RootLayout, worker_count: usize) -> Self {
        Self {
            db: services.db.clone(),
            event_bus: services.events.clone(),
            packager: services.packager.clone(),
            toml: services.toml.clone(),
            terms: TermService::new(
                services.db.clone(),
                services.repository.clone(),
                services.events.clone(),
                services.catalog.clone(),
            ),
            layout,
            worker_count,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::job_routes())
        .merge(api::term_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
