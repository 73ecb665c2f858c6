//! SKOS importer
//!
//! Loads an RDF/XML SKOS vocabulary from a URL or a local file and creates
//! one term per concept inside the target taxonomy, preserving the
//! `broader`/`narrower` hierarchy.

use super::xml_importer::{attribute, local_name, text_of};
use super::{FormatImporter, ImportContext, ImportError, ImportReport};
use crate::models::record::TERM_ROOT_ID;
use crate::models::{NewRecord, RecordKind};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};

/// Where to load a vocabulary from and where to put it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkosImportRequest {
    pub taxonomy_id: i64,
    /// `http(s)://` URL, `file://` URL or plain path
    pub location: String,
    /// Term to attach top concepts under; the term root when absent
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkosConcept {
    pub uri: String,
    /// `(xml:lang, label)` pairs
    pub labels: Vec<(Option<String>, String)>,
    pub broader: Vec<String>,
    pub narrower: Vec<String>,
    pub scope_note: Option<String>,
}

impl SkosConcept {
    /// Label in `culture`, else an untagged label, else the first one
    pub fn preferred_label(&self, culture: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(lang, _)| lang.as_deref() == Some(culture))
            .or_else(|| self.labels.iter().find(|(lang, _)| lang.is_none()))
            .or_else(|| self.labels.first())
            .map(|(_, label)| label.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    PrefLabel,
    ScopeNote,
}

/// Parse `skos:Concept` and labelled `rdf:Description` nodes
pub fn parse_skos(text: &str) -> Result<Vec<SkosConcept>, ImportError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut concepts = Vec::new();
    let mut current: Option<SkosConcept> = None;
    let mut depth = 0usize;
    let mut current_depth = 0usize;
    // Plain rdf:Description nodes count only when they carry a label
    let mut current_is_concept = false;
    let mut field: Option<(Field, Option<String>)> = None;
    let mut anonymous = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                depth += 1;
                let name = local_name(&element);
                let Some(concept) = current.as_mut() else {
                    if matches!(name.as_str(), "Concept" | "Description") {
                        let uri = attribute(&element, "about").unwrap_or_else(|| {
                            anonymous += 1;
                            format!("_:concept{}", anonymous)
                        });
                        current = Some(SkosConcept {
                            uri,
                            ..Default::default()
                        });
                        current_depth = depth;
                        current_is_concept = name == "Concept";
                    }
                    continue;
                };
                match name.as_str() {
                    "prefLabel" => field = Some((Field::PrefLabel, attribute(&element, "lang"))),
                    "scopeNote" => field = Some((Field::ScopeNote, None)),
                    "broader" => concept.broader.extend(attribute(&element, "resource")),
                    "narrower" => concept.narrower.extend(attribute(&element, "resource")),
                    _ => {}
                }
            }
            Event::Empty(element) => {
                if let Some(concept) = current.as_mut() {
                    match local_name(&element).as_str() {
                        "broader" => concept.broader.extend(attribute(&element, "resource")),
                        "narrower" => concept.narrower.extend(attribute(&element, "resource")),
                        _ => {}
                    }
                }
            }
            Event::Text(content) => {
                if let (Some(concept), Some((kind, lang))) = (current.as_mut(), field.as_ref()) {
                    let value = text_of(&content);
                    match kind {
                        Field::PrefLabel => concept.labels.push((lang.clone(), value)),
                        Field::ScopeNote => concept.scope_note = Some(value),
                    }
                }
            }
            Event::End(_) => {
                field = None;
                if depth == current_depth {
                    if let Some(concept) = current.take() {
                        if current_is_concept || !concept.labels.is_empty() {
                            concepts.push(concept);
                        }
                    }
                    current_depth = 0;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(concepts)
}

pub struct SkosImporter {
    request: SkosImportRequest,
    culture: String,
}

impl SkosImporter {
    pub fn new(request: SkosImportRequest, culture: String) -> Self {
        Self { request, culture }
    }

    async fn load(&self) -> Result<String, ImportError> {
        let location = self.request.location.trim();
        let fetch_error = |message: String| ImportError::Fetch {
            location: location.to_string(),
            message,
        };

        if location.starts_with("http://") || location.starts_with("https://") {
            let response = reqwest::get(location)
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| fetch_error(e.to_string()))?;
            return response.text().await.map_err(|e| fetch_error(e.to_string()));
        }

        let path = location.strip_prefix("file://").unwrap_or(location);
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| fetch_error(e.to_string()))
    }
}

/// Parent concept uri for each concept, from `broader` or a reverse `narrower`
fn broader_links(concepts: &[SkosConcept]) -> HashMap<&str, &str> {
    let mut links = HashMap::new();
    for concept in concepts {
        for child in &concept.narrower {
            links.entry(child.as_str()).or_insert(concept.uri.as_str());
        }
    }
    for concept in concepts {
        if let Some(parent) = concept.broader.first() {
            links.insert(concept.uri.as_str(), parent.as_str());
        }
    }
    links
}

#[async_trait]
impl FormatImporter for SkosImporter {
    fn format_name(&self) -> &'static str {
        "skos"
    }

    async fn import(&self, ctx: &ImportContext<'_>) -> Result<ImportReport, ImportError> {
        let taxonomy_id = self.request.taxonomy_id;
        match ctx.repository.get_by_id(taxonomy_id).await? {
            Some(taxonomy) if taxonomy.kind == RecordKind::Taxonomy => {}
            _ => {
                return Err(ImportError::InvalidTarget(format!(
                    "taxonomy {} does not exist",
                    taxonomy_id
                )))
            }
        }

        let top_id = self.request.parent_id.unwrap_or(TERM_ROOT_ID);
        match ctx.repository.get_by_id(top_id).await? {
            Some(parent) if parent.kind == RecordKind::Term => {}
            _ => {
                return Err(ImportError::InvalidTarget(format!(
                    "parent term {} does not exist",
                    top_id
                )))
            }
        }

        let text = self.load().await?;
        let concepts = parse_skos(&text)?;
        let known: HashSet<&str> = concepts.iter().map(|c| c.uri.as_str()).collect();
        let links = broader_links(&concepts);

        let mut report = ImportReport::default();
        let mut term_ids: HashMap<&str, i64> = HashMap::new();
        let mut pending: Vec<&SkosConcept> = Vec::new();

        for concept in &concepts {
            if let Some(parent) = links.get(concept.uri.as_str()) {
                if !known.contains(parent) {
                    report.soft_error(format!(
                        "Concept {}: broader concept {} is not in the vocabulary; attached at top level.",
                        concept.uri, parent
                    ));
                }
            }
            pending.push(concept);
        }

        // Create parents before children; a cycle is broken by attaching its
        // first remaining member at the top level
        while !pending.is_empty() {
            let ready = pending.iter().position(|concept| {
                match links.get(concept.uri.as_str()) {
                    Some(parent) if known.contains(parent) => term_ids.contains_key(parent),
                    _ => true,
                }
            });

            let (index, parent_id) = match ready {
                Some(index) => {
                    let parent = links
                        .get(pending[index].uri.as_str())
                        .and_then(|uri| term_ids.get(uri))
                        .copied()
                        .unwrap_or(top_id);
                    (index, parent)
                }
                None => {
                    report.soft_error(format!(
                        "Concept {}: circular broader relation; attached at top level.",
                        pending[0].uri
                    ));
                    (0, top_id)
                }
            };

            let concept = pending.remove(index);
            let id = self.create_term(concept, parent_id, ctx, &mut report).await?;
            term_ids.insert(concept.uri.as_str(), id);
        }

        tracing::info!(
            location = %self.request.location,
            taxonomy_id,
            created = report.created,
            skipped = report.skipped,
            "SKOS import finished"
        );
        Ok(report)
    }
}

impl SkosImporter {
    /// Create or reuse the term for `concept`; returns the id children hang from
    async fn create_term(
        &self,
        concept: &SkosConcept,
        parent_id: i64,
        ctx: &ImportContext<'_>,
        report: &mut ImportReport,
    ) -> Result<i64, ImportError> {
        let taxonomy_id = self.request.taxonomy_id;
        let Some(label) = concept.preferred_label(&self.culture) else {
            report.soft_error(format!("Concept {}: no prefLabel; skipped.", concept.uri));
            report.skipped += 1;
            return Ok(parent_id);
        };

        if let Some(existing) = ctx.repository.find_term_by_name(taxonomy_id, label).await? {
            report.skipped += 1;
            return Ok(existing.id);
        }

        let mut properties = Map::new();
        properties.insert("uri".to_string(), json!(concept.uri));
        if let Some(note) = &concept.scope_note {
            properties.insert("scopeNote".to_string(), json!(note));
        }

        let mut record = NewRecord::term(taxonomy_id, label);
        record.culture = self.culture.clone();
        record.properties = Value::Object(properties);

        let term = ctx.repository.insert_child(parent_id, record).await?;
        report.created += 1;

        if let Some(doc) = ctx.repository.document_for(term.id).await? {
            ctx.indexing.index_document(&doc).await?;
        }
        Ok(term.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use crate::models::record::{PLACE_TAXONOMY_ID, SUBJECT_TAXONOMY_ID};
    use crate::repository::{ResourceRepository, SqliteRepository};
    use crate::search::testing::RecordingIndex;
    use crate::search::IndexingContext;
    use std::sync::Arc;

    const VOCABULARY: &str = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:skos="http://www.w3.org/2004/02/skos/core#">
  <skos:Concept rdf:about="http://example.org/harbours">
    <skos:prefLabel xml:lang="fr">Ports</skos:prefLabel>
    <skos:prefLabel xml:lang="en">Harbours</skos:prefLabel>
    <skos:narrower rdf:resource="http://example.org/docks"/>
  </skos:Concept>
  <skos:Concept rdf:about="http://example.org/piers">
    <skos:prefLabel xml:lang="en">Piers</skos:prefLabel>
    <skos:broader rdf:resource="http://example.org/harbours"/>
    <skos:scopeNote>Landing stages</skos:scopeNote>
  </skos:Concept>
  <skos:Concept rdf:about="http://example.org/docks">
    <skos:prefLabel xml:lang="en">Docks</skos:prefLabel>
  </skos:Concept>
</rdf:RDF>"#;

    struct Fixture {
        repo: SqliteRepository,
        index: Arc<RecordingIndex>,
        dir: tempfile::TempDir,
    }

    impl Fixture {
        async fn new() -> Self {
            Self {
                repo: SqliteRepository::new(init_memory_pool().await.unwrap()),
                index: Arc::new(RecordingIndex::default()),
                dir: tempfile::tempdir().unwrap(),
            }
        }

        async fn run(&self, content: &str, taxonomy_id: i64) -> Result<ImportReport, ImportError> {
            let path = self.dir.path().join("vocabulary.rdf");
            std::fs::write(&path, content).unwrap();
            let importer = SkosImporter::new(
                SkosImportRequest {
                    taxonomy_id,
                    location: format!("file://{}", path.display()),
                    parent_id: None,
                },
                "en".to_string(),
            );
            let indexing = IndexingContext::enabled(self.index.clone());
            importer
                .import(&ImportContext {
                    repository: &self.repo,
                    indexing: &indexing,
                })
                .await
        }
    }

    #[test]
    fn test_parse_concepts() {
        let concepts = parse_skos(VOCABULARY).unwrap();
        assert_eq!(concepts.len(), 3);
        assert_eq!(concepts[0].preferred_label("en"), Some("Harbours"));
        assert_eq!(concepts[0].preferred_label("de"), Some("Ports"));
        assert_eq!(concepts[0].narrower, vec!["http://example.org/docks"]);
        assert_eq!(concepts[1].broader, vec!["http://example.org/harbours"]);
        assert_eq!(concepts[1].scope_note.as_deref(), Some("Landing stages"));
    }

    #[tokio::test]
    async fn test_import_builds_hierarchy() {
        let fx = Fixture::new().await;
        let report = fx.run(VOCABULARY, PLACE_TAXONOMY_ID).await.unwrap();
        assert_eq!(report.created, 3);
        assert!(!report.has_errors());
        assert_eq!(fx.index.indexed.lock().unwrap().len(), 3);

        let harbours = fx
            .repo
            .find_term_by_name(PLACE_TAXONOMY_ID, "Harbours")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(harbours.parent_id, Some(TERM_ROOT_ID));

        let children = fx.repo.ordered_sibling_ids(harbours.id).await.unwrap();
        assert_eq!(children.len(), 2);
        let docks = fx
            .repo
            .find_term_by_name(PLACE_TAXONOMY_ID, "Docks")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(docks.parent_id, Some(harbours.id));
    }

    #[tokio::test]
    async fn test_existing_terms_are_reused() {
        let fx = Fixture::new().await;
        fx.run(VOCABULARY, SUBJECT_TAXONOMY_ID).await.unwrap();
        let report = fx.run(VOCABULARY, SUBJECT_TAXONOMY_ID).await.unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.skipped, 3);
    }

    #[tokio::test]
    async fn test_cycle_is_broken_with_soft_error() {
        let fx = Fixture::new().await;
        let cyclic = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:skos="http://www.w3.org/2004/02/skos/core#">
  <skos:Concept rdf:about="a"><skos:prefLabel>A</skos:prefLabel><skos:broader rdf:resource="b"/></skos:Concept>
  <skos:Concept rdf:about="b"><skos:prefLabel>B</skos:prefLabel><skos:broader rdf:resource="a"/></skos:Concept>
</rdf:RDF>"#;
        let report = fx.run(cyclic, SUBJECT_TAXONOMY_ID).await.unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_taxonomy_is_rejected() {
        let fx = Fixture::new().await;
        let err = fx.run(VOCABULARY, 9999).await.unwrap_err();
        assert!(matches!(err, ImportError::InvalidTarget(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_error() {
        let fx = Fixture::new().await;
        let importer = SkosImporter::new(
            SkosImportRequest {
                taxonomy_id: SUBJECT_TAXONOMY_ID,
                location: "/nonexistent/vocabulary.rdf".to_string(),
                parent_id: None,
            },
            "en".to_string(),
        );
        let indexing = IndexingContext::enabled(fx.index.clone());
        let err = importer
            .import(&ImportContext {
                repository: &fx.repo,
                indexing: &indexing,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Fetch { .. }));
    }
}
