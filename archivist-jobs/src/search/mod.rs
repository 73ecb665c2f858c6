//! Search index abstraction
//!
//! Jobs never talk to a [`SearchIndex`] directly; they go through an
//! [`IndexingContext`] that decides, per job, whether writes happen.

pub mod sqlite_index;

pub use sqlite_index::SqliteSearchIndex;

use crate::models::{HierarchicalRecord, RecordKind};
use archivist_common::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// A full search document for one record
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDocument {
    pub id: i64,
    pub kind: RecordKind,
    pub body: Value,
}

/// Access point names grouped by taxonomy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessPoints {
    pub subjects: Vec<String>,
    pub places: Vec<String>,
    pub genres: Vec<String>,
}

impl SearchDocument {
    pub fn from_record(record: &HierarchicalRecord, access_points: &AccessPoints) -> Self {
        let body = json!({
            "id": record.id,
            "kind": record.kind.as_str(),
            "slug": record.slug,
            "title": record.title,
            "identifier": record.identifier,
            "parentId": record.parent_id,
            "lft": record.lft,
            "repository": record.repository_slug,
            "taxonomyId": record.taxonomy_id,
            "culture": record.culture,
            "properties": record.properties,
            "accessPoints": {
                "subjects": access_points.subjects,
                "places": access_points.places,
                "genres": access_points.genres,
            },
        });

        Self {
            id: record.id,
            kind: record.kind,
            body,
        }
    }
}

/// Search index backend
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Replace the whole document for `doc.id`
    async fn index_document(&self, doc: &SearchDocument) -> Result<()>;

    /// Merge `delta` into the stored document; the document must exist
    async fn partial_update(&self, id: i64, delta: Value) -> Result<()>;

    async fn delete_document(&self, id: i64) -> Result<()>;
}

/// Job-scoped indexing switch
///
/// Created per job; a disabled context turns every write into a no-op without
/// affecting any other job.
#[derive(Clone)]
pub struct IndexingContext {
    index: Arc<dyn SearchIndex>,
    enabled: bool,
}

impl IndexingContext {
    pub fn enabled(index: Arc<dyn SearchIndex>) -> Self {
        Self {
            index,
            enabled: true,
        }
    }

    pub fn suspended(index: Arc<dyn SearchIndex>) -> Self {
        Self {
            index,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn index_document(&self, doc: &SearchDocument) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.index.index_document(doc).await
    }

    pub async fn partial_update(&self, id: i64, delta: Value) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.index.partial_update(id, delta).await
    }

    pub async fn delete_document(&self, id: i64) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.index.delete_document(id).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every call for assertions
    #[derive(Default)]
    pub struct RecordingIndex {
        pub indexed: Mutex<Vec<i64>>,
        pub partial: Mutex<Vec<(i64, Value)>>,
        pub deleted: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl SearchIndex for RecordingIndex {
        async fn index_document(&self, doc: &SearchDocument) -> Result<()> {
            self.indexed.lock().unwrap().push(doc.id);
            Ok(())
        }

        async fn partial_update(&self, id: i64, delta: Value) -> Result<()> {
            self.partial.lock().unwrap().push((id, delta));
            Ok(())
        }

        async fn delete_document(&self, id: i64) -> Result<()> {
            self.deleted.lock().unwrap().push(id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingIndex;
    use super::*;

    fn document(id: i64) -> SearchDocument {
        SearchDocument {
            id,
            kind: RecordKind::InformationObject,
            body: json!({"id": id}),
        }
    }

    #[tokio::test]
    async fn test_suspended_context_writes_nothing() {
        let index = Arc::new(RecordingIndex::default());
        let ctx = IndexingContext::suspended(index.clone());

        ctx.index_document(&document(4)).await.unwrap();
        ctx.partial_update(4, json!({"lft": 3})).await.unwrap();

        assert!(index.indexed.lock().unwrap().is_empty());
        assert!(index.partial.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_contexts_are_independent() {
        let index = Arc::new(RecordingIndex::default());
        let suspended = IndexingContext::suspended(index.clone());
        let enabled = IndexingContext::enabled(index.clone());

        suspended.index_document(&document(1)).await.unwrap();
        enabled.index_document(&document(2)).await.unwrap();

        assert_eq!(*index.indexed.lock().unwrap(), vec![2]);
    }
}
