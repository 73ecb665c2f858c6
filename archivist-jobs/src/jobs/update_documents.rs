//! Rebuild search documents for descriptions linked to a renamed term

use super::JobContext;
use crate::models::{JobOutcome, UpdateDocumentsRequest};
use crate::repository::ResourceRepository;
use crate::search::{IndexingContext, SearchIndex};
use archivist_common::Error;
use std::sync::Arc;

pub struct UpdateDocumentsJob {
    repository: Arc<dyn ResourceRepository>,
    indexing: IndexingContext,
}

impl UpdateDocumentsJob {
    pub fn new(repository: Arc<dyn ResourceRepository>, search: Arc<dyn SearchIndex>) -> Self {
        Self {
            repository,
            indexing: IndexingContext::enabled(search),
        }
    }

    pub async fn run(&self, ctx: &mut JobContext, request: &UpdateDocumentsRequest) -> JobOutcome {
        ctx.info("documents.start", &[&request.object_ids.len()]);

        // Term names may be cached on the records
        self.repository.clear_cache();

        for &id in &request.object_ids {
            if let Err(e) = self.update(ctx, id).await {
                ctx.error("job.unexpected_error", &[&e]);
                return ctx.outcome(false);
            }
        }

        ctx.info("documents.complete", &[]);
        ctx.outcome(true)
    }

    async fn update(&self, ctx: &mut JobContext, id: i64) -> Result<(), Error> {
        match self.repository.document_for(id).await? {
            Some(doc) => {
                ctx.info("documents.updating", &[&id]);
                self.indexing.index_document(&doc).await
            }
            None => {
                ctx.error("documents.missing", &[&id]);
                Ok(())
            }
        }
    }
}
