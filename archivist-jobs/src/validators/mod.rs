//! Import validators
//!
//! Validators inspect an uploaded file before any record is touched and
//! return counts plus a report. The mode policy lives on
//! [`ValidationResult::blocking`](crate::models::ValidationResult::blocking).

pub mod csv_validator;

pub use csv_validator::{CheckResult, CheckStatus, CsvImportValidator, CsvValidationReport};

use crate::models::ValidationResult;
use archivist_common::Result;
use std::path::Path;

/// Pre-flight check of an import file
pub trait ImportValidator: Send + Sync {
    /// `display_name` is the user's file name, shown in the report
    fn validate(&self, path: &Path, display_name: &str) -> Result<ValidationResult>;
}
