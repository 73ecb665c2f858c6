//! Term rename with asynchronous refresh of linked descriptions
//!
//! Descriptions embed the names of their place, subject and genre access
//! points in their search documents. Renaming such a term queues an
//! `update_documents` job instead of reindexing inline.

use crate::jobs::submit;
use crate::models::record::{GENRE_TAXONOMY_ID, PLACE_TAXONOMY_ID, SUBJECT_TAXONOMY_ID, TERM_ROOT_ID};
use crate::models::{Job, JobPayload, JobUser, RecordKind, UpdateDocumentsRequest};
use crate::repository::ResourceRepository;
use archivist_common::events::EventBus;
use archivist_common::i18n::Catalog;
use archivist_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Taxonomies whose term names are part of description search documents
pub const DOCUMENT_TAXONOMIES: &[i64] = &[PLACE_TAXONOMY_ID, SUBJECT_TAXONOMY_ID, GENRE_TAXONOMY_ID];

/// Where users follow job progress
pub const JOBS_PAGE_PATH: &str = "/jobs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameOutcome {
    pub term_id: i64,
    pub renamed: bool,
    /// Localized notice when linked descriptions are being updated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct TermService {
    db: SqlitePool,
    repository: Arc<dyn ResourceRepository>,
    events: EventBus,
    catalog: Arc<Catalog>,
}

impl TermService {
    pub fn new(
        db: SqlitePool,
        repository: Arc<dyn ResourceRepository>,
        events: EventBus,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            db,
            repository,
            events,
            catalog,
        }
    }

    pub async fn rename(&self, term_id: i64, name: &str, user: JobUser) -> Result<RenameOutcome> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Term name cannot be empty".to_string()));
        }
        if term_id == TERM_ROOT_ID {
            return Err(Error::InvalidInput("The term root cannot be renamed".to_string()));
        }

        let term = match self.repository.get_by_id(term_id).await? {
            Some(term) if term.kind == RecordKind::Term => term,
            _ => return Err(Error::NotFound(format!("Term {}", term_id))),
        };

        let mut outcome = RenameOutcome {
            term_id,
            renamed: false,
            notice: None,
            job_id: None,
        };
        if term.title.as_deref() == Some(name) {
            return Ok(outcome);
        }

        self.repository.rename(term_id, name).await?;
        outcome.renamed = true;
        tracing::info!(term_id, name, "Term renamed");

        let in_documents = term
            .taxonomy_id
            .map(|id| DOCUMENT_TAXONOMIES.contains(&id))
            .unwrap_or(false);
        if !in_documents {
            return Ok(outcome);
        }

        let object_ids = self.repository.linked_object_ids(term_id).await?;
        if object_ids.is_empty() {
            return Ok(outcome);
        }

        let job = Job::new(
            JobPayload::UpdateDocuments(UpdateDocumentsRequest {
                object_ids,
                term_id: Some(term_id),
            }),
            user,
        );
        submit(&self.db, &self.events, &job).await?;

        outcome.job_id = Some(job.id);
        outcome.notice = Some(self.catalog.tr("term.updated_notice", &[&JOBS_PAGE_PATH]));
        Ok(outcome)
    }
}
