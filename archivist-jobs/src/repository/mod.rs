//! Resource repository: CRUD and tree operations on hierarchical records
//!
//! Importers and job runners depend on the [`ResourceRepository`] trait;
//! [`SqliteRepository`] is the production implementation.

pub mod nested_set;
pub mod sqlite;

pub use sqlite::SqliteRepository;

use crate::models::{HierarchicalRecord, NewRecord, RecordKind, RecordUpdate};
use crate::search::SearchDocument;
use archivist_common::Result;
use async_trait::async_trait;

/// Where to put a record relative to a sibling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingPlacement {
    /// Immediately before the target
    Before,
    /// Immediately after the target
    After,
}

/// Restricts matching to one repository or one collection subtree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeLimit {
    Repository(String),
    Collection(String),
}

/// Criteria for finding an existing record during update imports
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCriteria {
    pub kind: RecordKind,
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub scope: Option<ScopeLimit>,
}

#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Fetch a record; may be served from cache
    async fn get_by_id(&self, id: i64) -> Result<Option<HierarchicalRecord>>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<HierarchicalRecord>>;

    async fn find_by_legacy_id(
        &self,
        kind: RecordKind,
        legacy_id: &str,
    ) -> Result<Option<HierarchicalRecord>>;

    /// Make `id` the last child of `new_parent_id`
    ///
    /// No-op when already a child of that parent. Refuses to move a record
    /// under itself or one of its descendants.
    async fn reparent(&self, id: i64, new_parent_id: i64) -> Result<()>;

    /// Child ids ordered by `lft`
    async fn ordered_sibling_ids(&self, parent_id: i64) -> Result<Vec<i64>>;

    /// Move `id` next to `target_id`
    ///
    /// `expected_siblings` is the order the caller based its decision on; the
    /// move runs only if the stored order still equals it, else
    /// `Error::Conflict`.
    async fn move_relative_to(
        &self,
        id: i64,
        target_id: i64,
        placement: SiblingPlacement,
        expected_siblings: &[i64],
    ) -> Result<()>;

    /// Drop cached records so later reads see fresh tree positions
    fn clear_cache(&self);

    /// Insert as the last child of `parent_id`
    async fn insert_child(&self, parent_id: i64, record: NewRecord) -> Result<HierarchicalRecord>;

    async fn update_fields(&self, id: i64, update: RecordUpdate) -> Result<()>;

    /// Delete a record with all descendants; returns the deleted ids
    async fn delete_subtree(&self, id: i64) -> Result<Vec<i64>>;

    async fn find_match(&self, criteria: &MatchCriteria) -> Result<Option<HierarchicalRecord>>;

    /// Case-insensitive exact name match within a taxonomy
    async fn find_term_by_name(
        &self,
        taxonomy_id: i64,
        name: &str,
    ) -> Result<Option<HierarchicalRecord>>;

    async fn link_term(&self, object_id: i64, term_id: i64) -> Result<()>;

    /// Information objects linked to a term, ascending
    async fn linked_object_ids(&self, term_id: i64) -> Result<Vec<i64>>;

    async fn rename(&self, id: i64, name: &str) -> Result<()>;

    /// Full search document, `None` when the record does not exist
    async fn document_for(&self, id: i64) -> Result<Option<SearchDocument>>;
}
