//! Hierarchical records: information objects, terms and taxonomies

use serde::{Deserialize, Serialize};

/// Root of the information object tree
pub const INFORMATION_OBJECT_ROOT_ID: i64 = 1;
/// Root of the term tree; moving a term "under a taxonomy" lands here
pub const TERM_ROOT_ID: i64 = 110;

pub const SUBJECT_TAXONOMY_ID: i64 = 35;
pub const PLACE_TAXONOMY_ID: i64 = 42;
pub const GENRE_TAXONOMY_ID: i64 = 78;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    InformationObject,
    Term,
    Taxonomy,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::InformationObject => "information_object",
            RecordKind::Term => "term",
            RecordKind::Taxonomy => "taxonomy",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "information_object" => Some(RecordKind::InformationObject),
            "term" => Some(RecordKind::Term),
            "taxonomy" => Some(RecordKind::Taxonomy),
            _ => None,
        }
    }

    /// Taxonomies are flat; the other kinds each form one nested set
    pub fn is_tree(&self) -> bool {
        !matches!(self, RecordKind::Taxonomy)
    }

    pub fn root_id(&self) -> Option<i64> {
        match self {
            RecordKind::InformationObject => Some(INFORMATION_OBJECT_ROOT_ID),
            RecordKind::Term => Some(TERM_ROOT_ID),
            RecordKind::Taxonomy => None,
        }
    }
}

/// A stored record. `lft`/`rgt` are owned by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalRecord {
    pub id: i64,
    pub kind: RecordKind,
    pub parent_id: Option<i64>,
    pub lft: Option<i64>,
    pub rgt: Option<i64>,
    pub slug: Option<String>,
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub legacy_id: Option<String>,
    pub taxonomy_id: Option<i64>,
    pub repository_slug: Option<String>,
    pub culture: String,
    pub properties: serde_json::Value,
}

impl HierarchicalRecord {
    pub fn is_root(&self) -> bool {
        self.kind.root_id() == Some(self.id)
    }
}

/// Fields for a record about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub kind: RecordKind,
    pub title: Option<String>,
    pub identifier: Option<String>,
    pub legacy_id: Option<String>,
    pub taxonomy_id: Option<i64>,
    pub repository_slug: Option<String>,
    pub culture: String,
    pub properties: serde_json::Value,
}

impl NewRecord {
    pub fn information_object(title: Option<String>) -> Self {
        Self {
            kind: RecordKind::InformationObject,
            title,
            identifier: None,
            legacy_id: None,
            taxonomy_id: None,
            repository_slug: None,
            culture: "en".to_string(),
            properties: serde_json::json!({}),
        }
    }

    pub fn term(taxonomy_id: i64, name: impl Into<String>) -> Self {
        Self {
            kind: RecordKind::Term,
            title: Some(name.into()),
            identifier: None,
            legacy_id: None,
            taxonomy_id: Some(taxonomy_id),
            repository_slug: None,
            culture: "en".to_string(),
            properties: serde_json::json!({}),
        }
    }
}

/// Partial update; `None` leaves the column unchanged.
/// `properties` are merged key by key into the stored object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    pub title: Option<String>,
    pub identifier: Option<String>,
    pub repository_slug: Option<String>,
    pub culture: Option<String>,
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
}
