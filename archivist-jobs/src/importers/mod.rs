//! Format importers
//!
//! Each supported format implements [`FormatImporter`]. Importers never
//! decide a job's fate: hard failures come back as [`ImportError`], soft
//! per-row problems are collected on the [`ImportReport`].

pub mod csv_importer;
pub mod options;
pub mod skos_importer;
pub mod xml_importer;

pub use csv_importer::CsvImporter;
pub use options::{CsvImportOptions, Derived, OptionNote, UpdateMode, XmlImportOptions};
pub use skos_importer::{SkosImportRequest, SkosImporter};
pub use xml_importer::XmlImporter;

use crate::models::record::{GENRE_TAXONOMY_ID, PLACE_TAXONOMY_ID, SUBJECT_TAXONOMY_ID, TERM_ROOT_ID};
use crate::models::NewRecord;
use crate::repository::ResourceRepository;
use crate::search::IndexingContext;
use crate::validators::{CsvImportValidator, ImportValidator};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Hard importer failures; any of these fails the job
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Unable to read import file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to parse CSV file: {0}")]
    Csv(String),

    #[error("Unable to parse XML file: {0}")]
    Xml(String),

    #[error("Unable to load {location}: {message}")]
    Fetch { location: String, message: String },

    #[error("Unsupported import: {0}")]
    Unsupported(String),

    #[error("CSV transformation failed: {0}")]
    Transform(String),

    #[error("Invalid import target: {0}")]
    InvalidTarget(String),

    #[error(transparent)]
    Repository(#[from] archivist_common::Error),
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Csv(err.to_string())
    }
}

impl From<quick_xml::Error> for ImportError {
    fn from(err: quick_xml::Error) -> Self {
        ImportError::Xml(err.to_string())
    }
}

/// Counters and soft errors from one importer run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub deleted: usize,
    errors: Vec<String>,
}

impl ImportReport {
    pub fn soft_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(error = %message, "Import soft error");
        self.errors.push(message);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// A local file to import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSource {
    pub path: PathBuf,
    /// The user's file name, for messages
    pub display_name: String,
}

/// What an importer may touch during a run
pub struct ImportContext<'a> {
    pub repository: &'a dyn ResourceRepository,
    pub indexing: &'a IndexingContext,
}

#[async_trait]
pub trait FormatImporter: Send + Sync {
    /// Short label used in logs, e.g. `csv`
    fn format_name(&self) -> &'static str;

    async fn import(&self, ctx: &ImportContext<'_>) -> Result<ImportReport, ImportError>;
}

/// Builds validators and importers for the file import job
///
/// The job depends on this trait so tests can observe which importer would
/// run, or substitute a validator with a fixed outcome.
pub trait ImporterFactory: Send + Sync {
    fn csv_validator(&self) -> Box<dyn ImportValidator>;

    fn csv(
        &self,
        source: ImportSource,
        object_type: String,
        options: CsvImportOptions,
    ) -> Box<dyn FormatImporter>;

    fn xml(&self, source: ImportSource, options: XmlImportOptions) -> Box<dyn FormatImporter>;

    fn skos(&self, request: SkosImportRequest) -> Box<dyn FormatImporter>;
}

/// Production importers
#[derive(Debug, Clone)]
pub struct DefaultImporters {
    culture: String,
    csv_transform_command: Option<String>,
}

impl DefaultImporters {
    pub fn new(culture: impl Into<String>, csv_transform_command: Option<String>) -> Self {
        Self {
            culture: culture.into(),
            csv_transform_command,
        }
    }
}

impl ImporterFactory for DefaultImporters {
    fn csv_validator(&self) -> Box<dyn ImportValidator> {
        Box::new(CsvImportValidator::new(self.culture.clone()))
    }

    fn csv(
        &self,
        source: ImportSource,
        object_type: String,
        options: CsvImportOptions,
    ) -> Box<dyn FormatImporter> {
        Box::new(CsvImporter::new(
            source,
            object_type,
            options,
            self.culture.clone(),
            self.csv_transform_command.clone(),
        ))
    }

    fn xml(&self, source: ImportSource, options: XmlImportOptions) -> Box<dyn FormatImporter> {
        Box::new(XmlImporter::new(source, options, self.culture.clone()))
    }

    fn skos(&self, request: SkosImportRequest) -> Box<dyn FormatImporter> {
        Box::new(SkosImporter::new(request, self.culture.clone()))
    }
}

/// Access point columns and the taxonomy each one feeds
pub const ACCESS_POINT_COLUMNS: &[(&str, i64)] = &[
    ("subjectAccessPoints", SUBJECT_TAXONOMY_ID),
    ("placeAccessPoints", PLACE_TAXONOMY_ID),
    ("genreAccessPoints", GENRE_TAXONOMY_ID),
];

/// Find or create each named term in `taxonomy_id` and link it to `object_id`
///
/// `names` is pipe separated; blank entries are ignored.
pub async fn link_access_points(
    repository: &dyn ResourceRepository,
    object_id: i64,
    taxonomy_id: i64,
    names: &str,
) -> Result<usize, ImportError> {
    let mut linked = 0;
    for name in names.split('|').map(str::trim).filter(|n| !n.is_empty()) {
        let term = match repository.find_term_by_name(taxonomy_id, name).await? {
            Some(term) => term,
            None => {
                repository
                    .insert_child(TERM_ROOT_ID, NewRecord::term(taxonomy_id, name))
                    .await?
            }
        };
        repository.link_term(object_id, term.id).await?;
        linked += 1;
    }
    Ok(linked)
}
