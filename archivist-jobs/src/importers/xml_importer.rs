//! XML importer for EAD finding aids
//!
//! Reads the descriptive core of EAD: `archdesc` and nested `c`/`c01`..`c12`
//! components with `did/unittitle`, `did/unitid`, `did/repository` and
//! `scopecontent`. Everything else is ignored.

use super::options::{UpdateMode, XmlImportOptions};
use super::{FormatImporter, ImportContext, ImportError, ImportReport, ImportSource};
use crate::models::record::INFORMATION_OBJECT_ROOT_ID;
use crate::models::{NewRecord, RecordKind, RecordUpdate};
use crate::repository::MatchCriteria;
use crate::utils::slug::slugify;
use async_trait::async_trait;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use serde_json::{json, Map, Value};

/// One described unit and its children
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EadComponent {
    pub level: Option<String>,
    pub title: Option<String>,
    pub identifier: Option<String>,
    pub repository: Option<String>,
    pub scope: Option<String>,
    pub children: Vec<EadComponent>,
}

impl EadComponent {
    fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    fn properties(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        if let Some(scope) = &self.scope {
            properties.insert("scopeAndContent".to_string(), json!(scope));
        }
        if let Some(level) = &self.level {
            properties.insert("levelOfDescription".to_string(), json!(level));
        }
        properties
    }
}

fn is_component(name: &str) -> bool {
    match name {
        "archdesc" | "c" => true,
        _ => {
            name.len() == 3
                && name.starts_with('c')
                && matches!(name[1..].parse::<u8>(), Ok(1..=12))
        }
    }
}

/// Attribute value by local name, entity-unescaped when possible
pub(crate) fn attribute(element: &BytesStart<'_>, name: &str) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name.as_bytes())
        .map(|attr| match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        })
}

pub(crate) fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

pub(crate) fn text_of(text: &BytesText<'_>) -> String {
    match text.unescape() {
        Ok(value) => value.into_owned(),
        Err(_) => String::from_utf8_lossy(text).into_owned(),
    }
}

fn append(field: &mut Option<String>, text: &str, separator: &str) {
    match field {
        Some(existing) if !existing.is_empty() => {
            existing.push_str(separator);
            existing.push_str(text);
        }
        _ => *field = Some(text.to_string()),
    }
}

/// Parse EAD text into top-level components
///
/// With `strict` off, mismatched end tags are tolerated and unclosed
/// components are closed at end of input.
pub fn parse_ead(text: &str, strict: bool) -> Result<Vec<EadComponent>, ImportError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = strict;

    let mut path: Vec<String> = Vec::new();
    // Index into `path` of each open component
    let mut open: Vec<(usize, EadComponent)> = Vec::new();
    let mut roots: Vec<EadComponent> = Vec::new();

    fn close(open: &mut Vec<(usize, EadComponent)>, roots: &mut Vec<EadComponent>) {
        if let Some((_, component)) = open.pop() {
            match open.last_mut() {
                Some((_, parent)) => parent.children.push(component),
                None => roots.push(component),
            }
        }
    }

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                let name = local_name(&element);
                if is_component(&name) {
                    open.push((
                        path.len(),
                        EadComponent {
                            level: attribute(&element, "level"),
                            ..Default::default()
                        },
                    ));
                }
                path.push(name);
            }
            Event::Empty(element) => {
                let name = local_name(&element);
                if is_component(&name) {
                    open.push((
                        path.len(),
                        EadComponent {
                            level: attribute(&element, "level"),
                            ..Default::default()
                        },
                    ));
                    close(&mut open, &mut roots);
                }
            }
            Event::Text(content) => {
                let value = text_of(&content);
                let Some((depth, component)) = open.last_mut() else {
                    continue;
                };
                let inner: Vec<&str> = path[*depth + 1..].iter().map(String::as_str).collect();
                match inner.as_slice() {
                    ["did", "unittitle", ..] => append(&mut component.title, &value, " "),
                    ["did", "unitid", ..] => append(&mut component.identifier, &value, " "),
                    ["did", "repository", ..] => append(&mut component.repository, &value, " "),
                    ["scopecontent", ..] => append(&mut component.scope, &value, "\n"),
                    _ => {}
                }
            }
            Event::End(_) => {
                path.pop();
                if matches!(open.last(), Some((depth, _)) if *depth == path.len()) {
                    close(&mut open, &mut roots);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !open.is_empty() {
        if strict {
            return Err(ImportError::Xml("unexpected end of document".to_string()));
        }
        while !open.is_empty() {
            close(&mut open, &mut roots);
        }
    }

    if roots.is_empty() {
        return Err(ImportError::Unsupported(
            "no <archdesc> element found; only EAD is supported".to_string(),
        ));
    }
    Ok(roots)
}

pub struct XmlImporter {
    source: ImportSource,
    options: XmlImportOptions,
    culture: String,
}

impl XmlImporter {
    pub fn new(source: ImportSource, options: XmlImportOptions, culture: String) -> Self {
        Self {
            source,
            options,
            culture,
        }
    }

    fn new_record(&self, component: &EadComponent) -> NewRecord {
        NewRecord {
            kind: RecordKind::InformationObject,
            title: component.title.clone(),
            identifier: component.identifier.clone(),
            legacy_id: None,
            taxonomy_id: None,
            repository_slug: component.repository.as_deref().map(slugify),
            culture: self.culture.clone(),
            properties: Value::Object(component.properties()),
        }
    }

    /// Insert `component` and its descendants, depth first, in document order
    async fn insert_tree(
        &self,
        component: EadComponent,
        parent_id: i64,
        ctx: &ImportContext<'_>,
        report: &mut ImportReport,
    ) -> Result<(), ImportError> {
        let mut work = vec![(component, parent_id)];

        while let Some((mut component, parent_id)) = work.pop() {
            if component.title.is_none() {
                report.soft_error(format!(
                    "{}: component without <unittitle> imported untitled.",
                    self.source.display_name
                ));
            }

            let record = ctx
                .repository
                .insert_child(parent_id, self.new_record(&component))
                .await?;
            report.created += 1;
            self.index(record.id, ctx).await?;

            let children = std::mem::take(&mut component.children);
            work.extend(children.into_iter().rev().map(|child| (child, record.id)));
        }
        Ok(())
    }

    async fn index(&self, id: i64, ctx: &ImportContext<'_>) -> Result<(), ImportError> {
        if self.options.index {
            if let Some(doc) = ctx.repository.document_for(id).await? {
                ctx.indexing.index_document(&doc).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FormatImporter for XmlImporter {
    fn format_name(&self) -> &'static str {
        "xml"
    }

    async fn import(&self, ctx: &ImportContext<'_>) -> Result<ImportReport, ImportError> {
        let text = tokio::fs::read_to_string(&self.source.path).await?;
        let roots = parse_ead(&text, self.options.strict_xml_parsing)?;

        let parent_id = self.options.parent_id.unwrap_or(INFORMATION_OBJECT_ROOT_ID);
        match ctx.repository.get_by_id(parent_id).await? {
            Some(parent) if parent.kind == RecordKind::InformationObject => {}
            _ => {
                return Err(ImportError::InvalidTarget(format!(
                    "parent description {} does not exist",
                    parent_id
                )))
            }
        }

        let mode = self.options.update.unwrap_or_default();
        let mut report = ImportReport::default();

        for root in roots {
            let needs_match = mode != UpdateMode::ImportAsNew || self.options.skip_matched;
            let matched = if needs_match {
                ctx.repository
                    .find_match(&MatchCriteria {
                        kind: RecordKind::InformationObject,
                        identifier: root.identifier.clone(),
                        title: root.title.clone(),
                        scope: self.options.limit.clone(),
                    })
                    .await?
            } else {
                None
            };

            match (mode, matched) {
                (UpdateMode::ImportAsNew, Some(_)) => {
                    report.skipped += 1 + root.descendant_count();
                }
                (UpdateMode::MatchAndUpdate, Some(existing)) => {
                    ctx.repository
                        .update_fields(
                            existing.id,
                            RecordUpdate {
                                title: root.title.clone(),
                                identifier: root.identifier.clone(),
                                repository_slug: root.repository.as_deref().map(slugify),
                                culture: None,
                                properties: Some(root.properties()),
                            },
                        )
                        .await?;
                    report.updated += 1;
                    // Only the top-level description is updated in place
                    report.skipped += root.descendant_count();
                    self.index(existing.id, ctx).await?;
                }
                (UpdateMode::DeleteAndReplace, Some(existing)) => {
                    let deleted = ctx.repository.delete_subtree(existing.id).await?;
                    for id in &deleted {
                        ctx.indexing.delete_document(*id).await?;
                    }
                    report.deleted += deleted.len();
                    self.insert_tree(root, parent_id, ctx, &mut report).await?;
                }
                (_, None) if mode != UpdateMode::ImportAsNew && self.options.skip_unmatched => {
                    report.skipped += 1 + root.descendant_count();
                }
                (_, None) => {
                    self.insert_tree(root, parent_id, ctx, &mut report).await?;
                }
            }
        }

        tracing::info!(
            file = %self.source.display_name,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            "XML import finished"
        );
        Ok(report)
    }
}
