//! CSV importer for descriptions and events
//!
//! Description rows create or update information objects; event rows attach
//! dated events to descriptions found by legacy id.

use super::options::{CsvImportOptions, UpdateMode};
use super::{
    link_access_points, FormatImporter, ImportContext, ImportError, ImportReport, ImportSource,
    ACCESS_POINT_COLUMNS,
};
use crate::models::record::INFORMATION_OBJECT_ROOT_ID;
use crate::models::{HierarchicalRecord, NewRecord, RecordKind, RecordUpdate};
use crate::repository::MatchCriteria;
use crate::utils::slug::slugify;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Free-text columns copied into record properties
const DESCRIPTIVE_COLUMNS: &[&str] = &[
    "scopeAndContent",
    "levelOfDescription",
    "extentAndMedium",
    "arrangement",
    "accessConditions",
];

/// One data row, keyed by header name
#[derive(Debug, Clone)]
struct CsvRow {
    /// 1-based line number in the file, header is line 1
    line: usize,
    values: HashMap<String, String>,
}

impl CsvRow {
    /// Trimmed value, `None` when blank or missing
    fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn owned(&self, column: &str) -> Option<String> {
        self.get(column).map(str::to_string)
    }
}

pub struct CsvImporter {
    source: ImportSource,
    object_type: String,
    options: CsvImportOptions,
    culture: String,
    transform_command: Option<String>,
}

impl CsvImporter {
    pub fn new(
        source: ImportSource,
        object_type: String,
        options: CsvImportOptions,
        culture: String,
        transform_command: Option<String>,
    ) -> Self {
        Self {
            source,
            object_type,
            options,
            culture,
            transform_command,
        }
    }

    /// Run the configured transform command as `<command> <input> <output>`
    async fn transform(&self, input: &Path) -> Result<PathBuf, ImportError> {
        let Some(command_line) = self.transform_command.as_deref() else {
            return Err(ImportError::Transform(
                "no CSV transform command is configured".to_string(),
            ));
        };
        let mut parts = command_line.split_whitespace();
        let Some(program) = parts.next() else {
            return Err(ImportError::Transform("transform command is blank".to_string()));
        };

        let output = input.with_extension("transformed.csv");
        tracing::info!(command = command_line, input = %input.display(), "Transforming CSV file");

        let status = tokio::process::Command::new(program)
            .args(parts)
            .arg(input)
            .arg(&output)
            .status()
            .await
            .map_err(|e| ImportError::Transform(format!("{}: {}", program, e)))?;

        if !status.success() {
            return Err(ImportError::Transform(format!(
                "{} exited with {}",
                program, status
            )));
        }
        Ok(output)
    }

    fn read_rows(path: &Path) -> Result<Vec<CsvRow>, ImportError> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let values = headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect();
            rows.push(CsvRow {
                line: index + 2,
                values,
            });
        }
        Ok(rows)
    }

    fn row_culture(&self, row: &CsvRow) -> String {
        row.owned("culture").unwrap_or_else(|| self.culture.clone())
    }

    fn row_properties(row: &CsvRow) -> Map<String, Value> {
        DESCRIPTIVE_COLUMNS
            .iter()
            .filter_map(|column| row.get(column).map(|v| (column.to_string(), json!(v))))
            .collect()
    }

    async fn resolve_parent(
        &self,
        row: &CsvRow,
        default_parent: i64,
        imported: &HashMap<String, i64>,
        ctx: &ImportContext<'_>,
        report: &mut ImportReport,
    ) -> Result<i64, ImportError> {
        if let Some(slug) = row.get("qubitParentSlug") {
            return match ctx.repository.find_by_slug(slug).await? {
                Some(parent) if parent.kind == RecordKind::InformationObject => Ok(parent.id),
                _ => {
                    report.soft_error(format!(
                        "Line {}: parent slug '{}' not found; importing as top-level description.",
                        row.line, slug
                    ));
                    Ok(default_parent)
                }
            };
        }

        let Some(parent) = row.get("parentId") else {
            return Ok(default_parent);
        };

        if let Some(id) = imported.get(parent) {
            return Ok(*id);
        }
        if let Some(existing) = ctx
            .repository
            .find_by_legacy_id(RecordKind::InformationObject, parent)
            .await?
        {
            return Ok(existing.id);
        }
        if let Ok(id) = parent.parse::<i64>() {
            if let Some(record) = ctx.repository.get_by_id(id).await? {
                if record.kind == RecordKind::InformationObject {
                    return Ok(id);
                }
            }
        }

        report.soft_error(format!(
            "Line {}: parentId '{}' not found; importing as top-level description.",
            row.line, parent
        ));
        Ok(default_parent)
    }

    async fn create(
        &self,
        row: &CsvRow,
        parent_id: i64,
        ctx: &ImportContext<'_>,
    ) -> Result<HierarchicalRecord, ImportError> {
        let record = NewRecord {
            kind: RecordKind::InformationObject,
            title: row.owned("title"),
            identifier: row.owned("identifier"),
            legacy_id: row.owned("legacyId"),
            taxonomy_id: None,
            repository_slug: row.get("repository").map(slugify),
            culture: self.row_culture(row),
            properties: Value::Object(Self::row_properties(row)),
        };
        Ok(ctx.repository.insert_child(parent_id, record).await?)
    }

    async fn import_descriptions(
        &self,
        rows: Vec<CsvRow>,
        ctx: &ImportContext<'_>,
    ) -> Result<ImportReport, ImportError> {
        let mut report = ImportReport::default();
        let default_parent = self.options.parent_id.unwrap_or(INFORMATION_OBJECT_ROOT_ID);
        match ctx.repository.get_by_id(default_parent).await? {
            Some(parent) if parent.kind == RecordKind::InformationObject => {}
            _ => {
                return Err(ImportError::InvalidTarget(format!(
                    "parent description {} does not exist",
                    default_parent
                )))
            }
        }

        let mode = self.options.update_type.unwrap_or_default();
        let mut imported: HashMap<String, i64> = HashMap::new();

        for row in rows {
            if row.get("title").is_none() {
                report.soft_error(format!("Line {}: description has no title.", row.line));
            }

            let mut parent_id = self
                .resolve_parent(&row, default_parent, &imported, ctx, &mut report)
                .await?;

            let needs_match = mode != UpdateMode::ImportAsNew || self.options.skip_matched;
            let matched = if needs_match {
                let criteria = MatchCriteria {
                    kind: RecordKind::InformationObject,
                    identifier: row.owned("identifier"),
                    title: row.owned("title"),
                    scope: self.options.limit.clone(),
                };
                ctx.repository.find_match(&criteria).await?
            } else {
                None
            };

            let record_id = match (mode, matched) {
                (UpdateMode::ImportAsNew, Some(existing)) => {
                    tracing::debug!(line = row.line, record_id = existing.id, "Skipping matched row");
                    report.skipped += 1;
                    continue;
                }
                (UpdateMode::MatchAndUpdate, Some(existing)) => {
                    let update = RecordUpdate {
                        title: row.owned("title"),
                        identifier: row.owned("identifier"),
                        repository_slug: row.get("repository").map(slugify),
                        culture: row.owned("culture"),
                        properties: Some(Self::row_properties(&row)),
                    };
                    ctx.repository.update_fields(existing.id, update).await?;
                    report.updated += 1;
                    existing.id
                }
                (UpdateMode::DeleteAndReplace, Some(existing)) => {
                    let deleted = ctx.repository.delete_subtree(existing.id).await?;
                    for id in &deleted {
                        ctx.indexing.delete_document(*id).await?;
                    }
                    if deleted.contains(&parent_id) {
                        parent_id = default_parent;
                    }
                    report.deleted += deleted.len();
                    let record = self.create(&row, parent_id, ctx).await?;
                    report.created += 1;
                    record.id
                }
                (_, None) if mode != UpdateMode::ImportAsNew && self.options.skip_unmatched => {
                    tracing::debug!(line = row.line, "Skipping unmatched row");
                    report.skipped += 1;
                    continue;
                }
                (_, None) => {
                    let record = self.create(&row, parent_id, ctx).await?;
                    report.created += 1;
                    record.id
                }
            };

            if let Some(legacy_id) = row.owned("legacyId") {
                imported.insert(legacy_id, record_id);
            }

            for (column, taxonomy_id) in ACCESS_POINT_COLUMNS {
                if let Some(names) = row.get(column) {
                    link_access_points(ctx.repository, record_id, *taxonomy_id, names).await?;
                }
            }

            if self.options.index_during_import {
                if let Some(doc) = ctx.repository.document_for(record_id).await? {
                    ctx.indexing.index_document(&doc).await?;
                }
            }
        }

        Ok(report)
    }

    async fn import_events(
        &self,
        rows: Vec<CsvRow>,
        ctx: &ImportContext<'_>,
    ) -> Result<ImportReport, ImportError> {
        let mut report = ImportReport::default();

        for row in rows {
            let Some(legacy_id) = row.get("legacyId") else {
                report.soft_error(format!("Line {}: event has no legacyId; skipped.", row.line));
                report.skipped += 1;
                continue;
            };

            let Some(description) = ctx
                .repository
                .find_by_legacy_id(RecordKind::InformationObject, legacy_id)
                .await?
            else {
                report.soft_error(format!(
                    "Line {}: no description with legacyId '{}'; event skipped.",
                    row.line, legacy_id
                ));
                report.skipped += 1;
                continue;
            };

            let mut events = match description.properties.get("events") {
                Some(Value::Array(events)) => events.clone(),
                _ => Vec::new(),
            };
            let actors: Vec<&str> = row
                .get("eventActors")
                .map(|a| a.split('|').map(str::trim).filter(|a| !a.is_empty()).collect())
                .unwrap_or_default();
            events.push(json!({
                "type": row.get("eventType").unwrap_or("creation"),
                "dates": row.get("eventDates"),
                "actors": actors,
            }));

            let mut properties = Map::new();
            properties.insert("events".to_string(), Value::Array(events));
            ctx.repository
                .update_fields(
                    description.id,
                    RecordUpdate {
                        properties: Some(properties),
                        ..Default::default()
                    },
                )
                .await?;
            report.updated += 1;
        }

        Ok(report)
    }
}

#[async_trait]
impl FormatImporter for CsvImporter {
    fn format_name(&self) -> &'static str {
        "csv"
    }

    async fn import(&self, ctx: &ImportContext<'_>) -> Result<ImportReport, ImportError> {
        let transformed = if self.options.do_csv_transform {
            Some(self.transform(&self.source.path).await?)
        } else {
            None
        };
        let path = transformed.as_deref().unwrap_or(self.source.path.as_path());

        let rows = Self::read_rows(path);

        if let Some(transformed) = &transformed {
            if let Err(e) = std::fs::remove_file(transformed) {
                tracing::warn!(path = %transformed.display(), error = %e, "Failed to remove transformed CSV");
            }
        }

        let rows = rows?;
        tracing::info!(
            file = %self.source.display_name,
            object_type = %self.object_type,
            rows = rows.len(),
            "Importing CSV rows"
        );

        let report = match self.object_type.as_str() {
            "" | "informationObject" => self.import_descriptions(rows, ctx).await?,
            "event" => self.import_events(rows, ctx).await?,
            other => {
                return Err(ImportError::Unsupported(format!(
                    "CSV object type '{}'",
                    other
                )))
            }
        };

        tracing::info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            deleted = report.deleted,
            "CSV import finished"
        );
        Ok(report)
    }
}
