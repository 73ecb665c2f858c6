//! File import job
//!
//! Validate, import, report, clean up. The validator mode is resolved once
//! per job; indexing suspension is scoped to this job through the
//! [`IndexingContext`] handed to the importer.

use super::{JobContext, ReportPackager};
use crate::importers::options::{derive_csv_options, derive_xml_options};
use crate::importers::{
    CsvImportOptions, Derived, FormatImporter, ImportContext, ImportSource, ImporterFactory,
    SkosImportRequest, XmlImportOptions,
};
use crate::models::{ImportKind, ImportParameters, JobOutcome, ValidationBlock, ValidatorMode};
use crate::repository::ResourceRepository;
use crate::search::{IndexingContext, SearchIndex};
use archivist_common::events::LogLevel;
use std::sync::Arc;

/// A resolved import request
#[derive(Debug, Clone, PartialEq)]
pub enum ImportFormat {
    Csv {
        source: ImportSource,
        object_type: String,
        options: Derived<CsvImportOptions>,
    },
    Xml {
        source: ImportSource,
        options: Derived<XmlImportOptions>,
    },
    Skos(SkosImportRequest),
}

/// Why a request could not be turned into an [`ImportFormat`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Blank or unrecognized `importType`
    Unknown(String),
    /// No file (or location) for the format
    MissingSource(&'static str),
    MissingTaxonomy,
}

impl ImportFormat {
    pub fn from_parameters(params: &ImportParameters) -> Result<Self, FormatError> {
        let kind = ImportKind::parse(&params.import_type)
            .ok_or_else(|| FormatError::Unknown(params.import_type.clone()))?;

        let uploaded = params.file.as_ref().map(|file| ImportSource {
            path: file.tmp_name.clone(),
            display_name: file.name.clone(),
        });

        match kind {
            ImportKind::Csv => Ok(ImportFormat::Csv {
                source: uploaded.ok_or(FormatError::MissingSource(kind.label()))?,
                object_type: params.object_type().to_string(),
                options: derive_csv_options(&params.options, params.object_type()),
            }),
            ImportKind::Xml => Ok(ImportFormat::Xml {
                source: uploaded.ok_or(FormatError::MissingSource(kind.label()))?,
                options: derive_xml_options(&params.options),
            }),
            ImportKind::Skos => {
                let location = params
                    .location
                    .clone()
                    .filter(|location| !location.trim().is_empty())
                    .or_else(|| uploaded.map(|source| source.path.display().to_string()))
                    .ok_or(FormatError::MissingSource(kind.label()))?;
                Ok(ImportFormat::Skos(SkosImportRequest {
                    taxonomy_id: params.taxonomy_id.ok_or(FormatError::MissingTaxonomy)?,
                    location,
                    parent_id: params.parent_id(),
                }))
            }
        }
    }
}

pub struct FileImportJob {
    repository: Arc<dyn ResourceRepository>,
    search: Arc<dyn SearchIndex>,
    importers: Arc<dyn ImporterFactory>,
    packager: ReportPackager,
    validator_mode: ValidatorMode,
}

impl FileImportJob {
    pub fn new(
        repository: Arc<dyn ResourceRepository>,
        search: Arc<dyn SearchIndex>,
        importers: Arc<dyn ImporterFactory>,
        packager: ReportPackager,
        validator_mode: ValidatorMode,
    ) -> Self {
        Self {
            repository,
            search,
            importers,
            packager,
            validator_mode,
        }
    }

    pub async fn run(&self, ctx: &mut JobContext, params: &ImportParameters) -> JobOutcome {
        let type_label = params.import_type.to_uppercase();
        match &params.file {
            Some(file) => ctx.info("import.start_file", &[&type_label, &file.name]),
            None => ctx.info("import.start", &[&type_label]),
        }

        let indexing = if params.index_disabled() {
            ctx.info("import.indexing_suspended", &[]);
            IndexingContext::suspended(self.search.clone())
        } else {
            IndexingContext::enabled(self.search.clone())
        };

        let format = match ImportFormat::from_parameters(params) {
            Ok(format) => format,
            Err(FormatError::Unknown(import_type)) => {
                ctx.error("import.unknown_format", &[&import_type]);
                return ctx.outcome(false);
            }
            Err(FormatError::MissingSource(label)) => {
                ctx.error("import.missing_file", &[&label]);
                return ctx.outcome(false);
            }
            Err(FormatError::MissingTaxonomy) => {
                ctx.error("import.missing_taxonomy", &[]);
                return ctx.outcome(false);
            }
        };

        let importer: Box<dyn FormatImporter> = match format {
            ImportFormat::Csv {
                source,
                object_type,
                options,
            } => {
                if self.validator_mode > ValidatorMode::Off && !self.validate(ctx, &source) {
                    return ctx.outcome(false);
                }
                log_notes(ctx, &options);
                self.importers.csv(source, object_type, options.options)
            }
            ImportFormat::Xml { source, options } => {
                log_notes(ctx, &options);
                self.importers.xml(source, options.options)
            }
            ImportFormat::Skos(request) => self.importers.skos(request),
        };

        let import_ctx = ImportContext {
            repository: self.repository.as_ref(),
            indexing: &indexing,
        };
        let report = match importer.import(&import_ctx).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(job_id = %ctx.job().id, importer = importer.format_name(), error = %e, "Importer failed");
                ctx.log(LogLevel::Error, e.to_string());
                return ctx.outcome(false);
            }
        };

        for error in report.errors() {
            ctx.log(LogLevel::Info, error.clone());
        }

        if let Some(file) = &params.file {
            if let Err(e) = tokio::fs::remove_file(&file.tmp_name).await {
                tracing::warn!(job_id = %ctx.job().id, path = %file.tmp_name.display(), error = %e, "Temp file not removed");
                ctx.error("import.tmp_delete_failed", &[&file.tmp_name.display()]);
            }
        }

        ctx.info("import.complete", &[]);
        ctx.outcome(true)
    }

    /// Run the CSV validator and apply the mode policy
    ///
    /// Returns false when the import must not proceed.
    fn validate(&self, ctx: &mut JobContext, source: &ImportSource) -> bool {
        ctx.info("import.validating", &[&source.display_name]);

        let result = match self
            .importers
            .csv_validator()
            .validate(&source.path, &source.display_name)
        {
            Ok(result) => result,
            Err(e) => {
                ctx.log(LogLevel::Error, e.to_string());
                return false;
            }
        };

        ctx.job_mut().warn_count = Some(result.warn_count);
        ctx.job_mut().error_count = Some(result.error_count);
        ctx.log(LogLevel::Info, result.short_report.clone());

        self.packager.package(ctx, &result.verbose_report);

        match result.blocking(self.validator_mode) {
            Some(ValidationBlock::Errors(count)) => {
                ctx.error("import.validation_errors", &[&count]);
                false
            }
            Some(ValidationBlock::Warnings(count)) => {
                ctx.error("import.validation_warnings", &[&count]);
                false
            }
            None => true,
        }
    }
}

fn log_notes<T>(ctx: &mut JobContext, derived: &Derived<T>) {
    for note in &derived.notes {
        let args: Vec<&dyn std::fmt::Display> = note
            .args
            .iter()
            .map(|arg| arg as &dyn std::fmt::Display)
            .collect();
        ctx.info(note.message_id, &args);
    }
}
