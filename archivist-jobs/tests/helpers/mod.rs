//! Test Helper Utilities
//!
//! Shared fixtures for archivist-jobs integration tests: a temporary root
//! folder, an in-memory database and job services wired to the SQLite search
//! index, with importer construction observable through [`SpyImporters`].

#![allow(dead_code)]

use archivist_common::config::{RootLayout, TomlConfig};
use archivist_common::events::EventBus;
use archivist_common::i18n::Catalog;
use archivist_jobs::db::init_memory_pool;
use archivist_jobs::db::jobs::load_job;
use archivist_jobs::importers::{
    CsvImportOptions, DefaultImporters, FormatImporter, ImportSource, ImporterFactory,
    SkosImportRequest, XmlImportOptions,
};
use archivist_jobs::jobs::{submit, JobRunner, JobServices, JobWorker};
use archivist_jobs::models::{Job, JobPayload, JobUser, NewRecord, UploadedFile};
use archivist_jobs::repository::{ResourceRepository, SqliteRepository};
use archivist_jobs::search::{SearchIndex, SqliteSearchIndex};
use archivist_jobs::validators::ImportValidator;
use archivist_jobs::{build_router, job_services, AppState};
use axum::Router;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Delegates to the production importers and records what was built
pub struct SpyImporters {
    inner: DefaultImporters,
    calls: Mutex<Vec<&'static str>>,
}

impl SpyImporters {
    pub fn new() -> Self {
        Self {
            inner: DefaultImporters::new("en", None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ImporterFactory for SpyImporters {
    fn csv_validator(&self) -> Box<dyn ImportValidator> {
        self.record("validator");
        self.inner.csv_validator()
    }

    fn csv(
        &self,
        source: ImportSource,
        object_type: String,
        options: CsvImportOptions,
    ) -> Box<dyn FormatImporter> {
        self.record("csv");
        self.inner.csv(source, object_type, options)
    }

    fn xml(&self, source: ImportSource, options: XmlImportOptions) -> Box<dyn FormatImporter> {
        self.record("xml");
        self.inner.xml(source, options)
    }

    fn skos(&self, request: SkosImportRequest) -> Box<dyn FormatImporter> {
        self.record("skos");
        self.inner.skos(request)
    }
}

/// Temporary root folder plus job services
///
/// Keep the value alive for the whole test; dropping it removes the folder.
pub struct TestEnv {
    _dir: TempDir,
    pub layout: RootLayout,
    pub services: JobServices,
    pub repository: Arc<SqliteRepository>,
    pub search: Arc<SqliteSearchIndex>,
    pub importers: Arc<SpyImporters>,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_toml(TomlConfig::default()).await
    }

    pub async fn with_toml(toml: TomlConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let layout = RootLayout::new(dir.path().join("root"));
        layout.ensure_directories().unwrap();

        let db = init_memory_pool().await.unwrap();
        let repository = Arc::new(SqliteRepository::new(db.clone()));
        let search = Arc::new(SqliteSearchIndex::new(db.clone()));
        let importers = Arc::new(SpyImporters::new());

        let mut services = job_services(
            db,
            &layout,
            Arc::new(toml),
            Arc::new(Catalog::english()),
            EventBus::new(256),
        );
        services.repository = repository.clone();
        services.search = search.clone();
        services.importers = importers.clone();

        Self {
            _dir: dir,
            layout,
            services,
            repository,
            search,
            importers,
        }
    }

    pub fn db(&self) -> &sqlx::SqlitePool {
        &self.services.db
    }

    /// Place a file in the uploads folder the way the upload form would
    pub fn upload(&self, name: &str, content: &str) -> UploadedFile {
        let tmp_name = self
            .layout
            .uploads_dir()
            .join(format!("upload-{}", uuid::Uuid::new_v4()));
        std::fs::write(&tmp_name, content).unwrap();
        UploadedFile {
            name: name.to_string(),
            tmp_name,
        }
    }

    /// Submit a job, let one worker claim and run it, and reload it
    pub async fn run_job(&self, payload: JobPayload, user: JobUser) -> Job {
        let job = Job::new(payload, user);
        submit(self.db(), &self.services.events, &job).await.unwrap();

        let worker = JobWorker::new(0, JobRunner::new(self.services.clone()), Duration::from_millis(10));
        assert!(worker.run_once().await.unwrap(), "no pending job was claimed");

        load_job(self.db(), job.id).await.unwrap().unwrap()
    }

    pub fn app(&self) -> Router {
        build_router(AppState::new(&self.services, self.layout.clone(), 1))
    }

    /// Insert a description as the last child of `parent` and index it
    pub async fn add_description(&self, parent: i64, title: &str) -> i64 {
        let record = self
            .repository
            .insert_child(parent, NewRecord::information_object(Some(title.to_string())))
            .await
            .unwrap();
        self.reindex(record.id).await;
        record.id
    }

    /// Rebuild the full search document for `id`
    pub async fn reindex(&self, id: i64) {
        let doc = self.repository.document_for(id).await.unwrap().unwrap();
        self.search.index_document(&doc).await.unwrap();
    }
}

pub fn user(name: &str) -> JobUser {
    JobUser {
        name: name.to_string(),
        is_administrator: false,
    }
}

pub fn admin(name: &str) -> JobUser {
    JobUser {
        name: name.to_string(),
        is_administrator: true,
    }
}
