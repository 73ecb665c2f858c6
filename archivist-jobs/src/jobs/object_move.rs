//! Object move job
//!
//! `fetch object → [reparent] → [reorder] → complete`. The reparent and the
//! reorder are separate writes: a reparent that succeeded stays applied when
//! the reorder step fails afterwards.

use super::JobContext;
use crate::models::record::TERM_ROOT_ID;
use crate::models::{HierarchicalRecord, JobOutcome, MoveRequest, RecordKind};
use crate::repository::{ResourceRepository, SiblingPlacement};
use crate::search::{IndexingContext, SearchIndex};
use archivist_common::events::LogLevel;
use archivist_common::Error;
use serde_json::json;
use std::sync::Arc;

pub struct ObjectMoveJob {
    repository: Arc<dyn ResourceRepository>,
    indexing: IndexingContext,
}

impl ObjectMoveJob {
    pub fn new(repository: Arc<dyn ResourceRepository>, search: Arc<dyn SearchIndex>) -> Self {
        Self {
            repository,
            indexing: IndexingContext::enabled(search),
        }
    }

    pub async fn run(&self, ctx: &mut JobContext, request: &MoveRequest) -> JobOutcome {
        match self.execute(ctx, request).await {
            Ok(success) => ctx.outcome(success),
            Err(e) => {
                ctx.error("job.unexpected_error", &[&e]);
                ctx.outcome(false)
            }
        }
    }

    /// `Ok(false)` is a handled failure that was already logged
    async fn execute(&self, ctx: &mut JobContext, request: &MoveRequest) -> Result<bool, Error> {
        ctx.info("move.start", &[&request.object_id]);

        let Some(object) = self.repository.get_by_id(request.object_id).await? else {
            ctx.error("move.invalid_object", &[]);
            return Ok(false);
        };

        let mut parent_id = object.parent_id;

        if let Some(requested) = request.parent_id {
            let Some(parent) = self.repository.get_by_id(requested).await? else {
                ctx.error("move.invalid_parent", &[&requested]);
                return Ok(false);
            };

            // The term tree is shown under its taxonomy, but hangs from the term root
            let new_parent_id = if object.kind == RecordKind::Term && parent.kind == RecordKind::Taxonomy {
                TERM_ROOT_ID
            } else {
                parent.id
            };

            if object.parent_id != Some(new_parent_id) {
                ctx.info("move.to_parent", &[&requested]);
                if let Err(e) = self.repository.reparent(object.id, new_parent_id).await {
                    ctx.log(LogLevel::Error, e.to_string());
                    return Ok(false);
                }
            }
            parent_id = Some(new_parent_id);
        }

        if let Some((old_position, new_position)) = request.positions() {
            ctx.info("move.between_siblings", &[]);
            if !self
                .reorder(ctx, &object, parent_id, old_position, new_position)
                .await?
            {
                return Ok(false);
            }
        }

        ctx.info("move.complete", &[]);
        Ok(true)
    }

    async fn reorder(
        &self,
        ctx: &mut JobContext,
        object: &HierarchicalRecord,
        parent_id: Option<i64>,
        old_position: i64,
        new_position: i64,
    ) -> Result<bool, Error> {
        let siblings = match parent_id {
            Some(parent_id) => self.repository.ordered_sibling_ids(parent_id).await?,
            None => Vec::new(),
        };

        let current = siblings
            .iter()
            .position(|&id| id == object.id)
            .and_then(|index| i64::try_from(index).ok());
        if current != Some(old_position) {
            ctx.error("move.position_mismatch", &[]);
            return Ok(false);
        }

        if new_position >= siblings.len() as i64 {
            ctx.error("move.out_of_range", &[]);
            return Ok(false);
        }

        // Negative positions pass the range check and fail here
        let target_id = match usize::try_from(new_position)
            .ok()
            .and_then(|index| siblings.get(index))
        {
            Some(&id) => id,
            None => {
                ctx.error("move.invalid_target", &[&new_position]);
                return Ok(false);
            }
        };
        if self.repository.get_by_id(target_id).await?.is_none() {
            ctx.error("move.invalid_target", &[&target_id]);
            return Ok(false);
        }

        if new_position == old_position {
            ctx.info("move.same_position", &[&old_position]);
        } else {
            let placement = if new_position > old_position {
                ctx.info("move.after", &[&target_id]);
                SiblingPlacement::After
            } else {
                ctx.info("move.before", &[&target_id]);
                SiblingPlacement::Before
            };

            match self
                .repository
                .move_relative_to(object.id, target_id, placement, &siblings)
                .await
            {
                Ok(()) => {}
                Err(Error::Conflict(message)) => {
                    ctx.error("move.conflict", &[&message]);
                    return Ok(false);
                }
                Err(e) => {
                    ctx.log(LogLevel::Error, e.to_string());
                    return Ok(false);
                }
            }
        }

        let (start, end) = if new_position > old_position {
            (old_position, new_position)
        } else {
            (new_position, old_position)
        };
        self.reindex_range(ctx, &siblings, start as usize, end as usize)
            .await?;
        Ok(true)
    }

    /// Push fresh `lft` values for `siblings[start..=end]`, in list order
    async fn reindex_range(
        &self,
        ctx: &mut JobContext,
        siblings: &[i64],
        start: usize,
        end: usize,
    ) -> Result<(), Error> {
        self.repository.clear_cache();

        for &id in &siblings[start..=end] {
            let Some(record) = self.repository.get_by_id(id).await? else {
                continue;
            };

            ctx.info("move.reindexing", &[&id]);
            if let Err(e) = self.indexing.partial_update(id, json!({ "lft": record.lft })).await {
                tracing::warn!(job_id = %ctx.job().id, object_id = id, error = %e, "Partial update failed");
                ctx.log(LogLevel::Error, e.to_string());
            }
        }
        Ok(())
    }
}
