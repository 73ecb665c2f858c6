//! CSV pre-flight checks
//!
//! Each check yields one [`CheckResult`]; a check counts once toward the
//! warning or error total no matter how many rows it flags.

use super::ImportValidator;
use crate::models::ValidationResult;
use archivist_common::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;

/// Columns understood by the CSV importer
pub const KNOWN_COLUMNS: &[&str] = &[
    "legacyId",
    "parentId",
    "qubitParentSlug",
    "identifier",
    "title",
    "repository",
    "culture",
    "scopeAndContent",
    "levelOfDescription",
    "extentAndMedium",
    "arrangement",
    "accessConditions",
    "subjectAccessPoints",
    "placeAccessPoints",
    "genreAccessPoints",
    "eventType",
    "eventDates",
    "eventActors",
];

const MAX_FIELD_LENGTH: usize = 32_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckStatus {
    Info,
    Warning,
    Error,
}

impl CheckStatus {
    fn label(&self) -> &'static str {
        match self {
            CheckStatus::Info => "Info",
            CheckStatus::Warning => "Warning",
            CheckStatus::Error => "Error",
        }
    }
}

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub title: &'static str,
    pub status: CheckStatus,
    pub summary: Vec<String>,
    /// Per-row detail, only in the verbose report
    pub details: Vec<String>,
}

impl CheckResult {
    fn new(title: &'static str) -> Self {
        Self {
            title,
            status: CheckStatus::Info,
            summary: Vec::new(),
            details: Vec::new(),
        }
    }

    fn info(&mut self, message: impl Into<String>) {
        self.summary.push(message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.status = self.status.max(CheckStatus::Warning);
        self.summary.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.status = CheckStatus::Error;
        self.summary.push(message.into());
    }

    fn detail(&mut self, message: impl Into<String>) {
        self.details.push(message.into());
    }
}

/// All check results for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvValidationReport {
    pub file_name: String,
    pub results: Vec<CheckResult>,
}

impl CsvValidationReport {
    pub fn warn_count(&self) -> usize {
        self.count(CheckStatus::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.count(CheckStatus::Error)
    }

    fn count(&self, status: CheckStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Plain-text report; `verbose` adds per-row details
    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "CSV Results:");
        let _ = writeln!(out, "-------------------------------------");
        let _ = writeln!(out, "Filename: {}", self.file_name);
        let _ = writeln!(
            out,
            "Errors: {}, Warnings: {}",
            self.error_count(),
            self.warn_count()
        );

        for result in &self.results {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", result.title);
            let _ = writeln!(out, "Status: {}", result.status.label());
            for line in &result.summary {
                let _ = writeln!(out, "{}", line);
            }
            if verbose && !result.details.is_empty() {
                let _ = writeln!(out);
                let _ = writeln!(out, "Details:");
                for line in &result.details {
                    let _ = writeln!(out, "{}", line);
                }
            }
        }
        out
    }

    pub fn into_validation_result(self) -> ValidationResult {
        ValidationResult {
            warn_count: self.warn_count(),
            error_count: self.error_count(),
            verbose_report: self.render(true),
            short_report: self.render(false),
        }
    }
}

/// Validator for information object and event CSV files
#[derive(Debug, Clone)]
pub struct CsvImportValidator {
    default_culture: String,
}

impl Default for CsvImportValidator {
    fn default() -> Self {
        Self::new("en")
    }
}

impl CsvImportValidator {
    pub fn new(default_culture: impl Into<String>) -> Self {
        Self {
            default_culture: default_culture.into(),
        }
    }

    /// Run every check over raw file bytes
    pub fn check_bytes(&self, bytes: &[u8], file_name: &str) -> CsvValidationReport {
        let mut results = Vec::new();

        let mut encoding = CheckResult::new("CSV encoding test - UTF-8");
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => {
                encoding.info("File encoding is UTF-8 compatible.");
                text.to_string()
            }
            Err(e) => {
                encoding.error("File encoding does not appear to be UTF-8 compatible.");
                encoding.detail(format!("Invalid byte sequence at offset {}", e.valid_up_to()));
                String::from_utf8_lossy(bytes).into_owned()
            }
        };
        results.push(encoding);

        let rows = match parse_rows(&text) {
            Ok(rows) => rows,
            Err(message) => {
                let mut parse = CheckResult::new("CSV parse test");
                parse.error(format!("Unable to parse file as CSV: {}", message));
                results.push(parse);
                return CsvValidationReport {
                    file_name: file_name.to_string(),
                    results,
                };
            }
        };

        let Some((header, records)) = rows.split_first() else {
            let mut empty = CheckResult::new("CSV header test");
            empty.error("File is empty: no header row found.");
            results.push(empty);
            return CsvValidationReport {
                file_name: file_name.to_string(),
                results,
            };
        };
        let header: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();

        results.push(check_empty_rows(records));
        results.push(check_column_count(&header, records));
        results.push(check_duplicate_columns(&header));
        results.push(check_unknown_columns(&header));
        results.push(check_legacy_ids(&header, records));
        results.push(check_parent_references(&header, records));
        results.push(self.check_culture(&header, records));
        results.push(check_field_length(&header, records));

        CsvValidationReport {
            file_name: file_name.to_string(),
            results,
        }
    }

    fn check_culture(&self, header: &[String], records: &[Vec<String>]) -> CheckResult {
        let mut result = CheckResult::new("Culture check");
        let Some(column) = column_index(header, "culture") else {
            result.info(format!(
                "'culture' column not present. Rows will be imported using default culture '{}'.",
                self.default_culture
            ));
            return result;
        };

        let mut blank = 0;
        let mut invalid = 0;
        for (index, record) in records.iter().enumerate() {
            let value = cell(record, column);
            if value.is_empty() {
                blank += 1;
            } else if !is_culture_code(value) {
                invalid += 1;
                result.detail(format!("Row {}: invalid culture '{}'", index + 2, value));
            }
        }

        if blank > 0 {
            result.info(format!(
                "Rows with blank culture value: {}. These rows will use default culture '{}'.",
                blank, self.default_culture
            ));
        }
        if invalid > 0 {
            result.warn(format!(
                "Rows with invalid culture values: {}. These rows will use default culture '{}'.",
                invalid, self.default_culture
            ));
        }
        if blank == 0 && invalid == 0 {
            result.info("All culture values are valid.");
        }
        result
    }
}

impl ImportValidator for CsvImportValidator {
    fn validate(&self, path: &Path, display_name: &str) -> Result<ValidationResult> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::InvalidInput(format!("Unable to read {}: {}", path.display(), e))
        })?;
        let report = self.check_bytes(&bytes, display_name);

        tracing::debug!(
            file = display_name,
            warnings = report.warn_count(),
            errors = report.error_count(),
            "CSV validation finished"
        );
        Ok(report.into_validation_result())
    }
}

// ============================================================================
// Individual checks
// ============================================================================

fn parse_rows(text: &str) -> std::result::Result<Vec<Vec<String>>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn column_index(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|h| h == name)
}

fn cell(record: &[String], column: usize) -> &str {
    record.get(column).map(|v| v.trim()).unwrap_or("")
}

fn check_empty_rows(records: &[Vec<String>]) -> CheckResult {
    let mut result = CheckResult::new("CSV empty row check");
    let empty: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.iter().all(|v| v.trim().is_empty()))
        .map(|(index, _)| index + 2)
        .collect();

    if empty.is_empty() {
        result.info("CSV does not have any blank rows.");
    } else {
        result.warn(format!("CSV blank row count: {}", empty.len()));
        for row in empty {
            result.detail(format!("Row {} is blank", row));
        }
    }
    result
}

fn check_column_count(header: &[String], records: &[Vec<String>]) -> CheckResult {
    let mut result = CheckResult::new("CSV column count check");
    let mut mismatched = 0;

    for (index, record) in records.iter().enumerate() {
        if record.len() != header.len() {
            mismatched += 1;
            result.detail(format!(
                "Row {} has {} columns, header has {}",
                index + 2,
                record.len(),
                header.len()
            ));
        }
    }

    if mismatched == 0 {
        result.info(format!("Number of columns in CSV row: {}", header.len()));
    } else {
        result.error(format!(
            "Rows whose column count does not match the header: {}",
            mismatched
        ));
    }
    result
}

fn check_duplicate_columns(header: &[String]) -> CheckResult {
    let mut result = CheckResult::new("Duplicate column name check");
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for name in header {
        *seen.entry(name.as_str()).or_default() += 1;
    }

    let mut duplicates: Vec<&str> = seen
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name)
        .collect();
    duplicates.sort_unstable();

    if duplicates.is_empty() {
        result.info("No duplicate column names found.");
    } else {
        result.error(format!(
            "Columns with duplicate names found: {}",
            duplicates.join(", ")
        ));
    }
    result
}

fn check_unknown_columns(header: &[String]) -> CheckResult {
    let mut result = CheckResult::new("Column name check");
    let unknown: Vec<&str> = header
        .iter()
        .map(String::as_str)
        .filter(|name| !KNOWN_COLUMNS.contains(name))
        .collect();

    if unknown.is_empty() {
        result.info("All column names are recognized.");
    } else {
        result.warn(format!(
            "Unrecognized column names, these columns will be ignored: {}",
            unknown.join(", ")
        ));
    }
    result
}

fn check_legacy_ids(header: &[String], records: &[Vec<String>]) -> CheckResult {
    let mut result = CheckResult::new("Legacy id check");
    let Some(column) = column_index(header, "legacyId") else {
        result.warn("'legacyId' column not present. Future CSV updates may not match these records.");
        return result;
    };

    let mut seen = HashSet::new();
    let mut blank = 0;
    let mut duplicated = 0;
    for (index, record) in records.iter().enumerate() {
        let value = cell(record, column);
        if value.is_empty() {
            blank += 1;
        } else if !seen.insert(value.to_string()) {
            duplicated += 1;
            result.detail(format!("Row {}: duplicate legacyId '{}'", index + 2, value));
        }
    }

    if blank > 0 {
        result.warn(format!("Rows with empty 'legacyId' column: {}", blank));
    }
    if duplicated > 0 {
        result.warn(format!("Rows with non-unique 'legacyId' values: {}", duplicated));
    }
    if blank == 0 && duplicated == 0 {
        result.info("All 'legacyId' values are present and unique.");
    }
    result
}

fn check_parent_references(header: &[String], records: &[Vec<String>]) -> CheckResult {
    let mut result = CheckResult::new("Parent reference check");
    let parent_column = column_index(header, "parentId");
    let slug_column = column_index(header, "qubitParentSlug");

    if parent_column.is_none() && slug_column.is_none() {
        result.info("No parent columns present; all rows will be imported as top-level descriptions.");
        return result;
    }

    let legacy_column = column_index(header, "legacyId");
    let mut known_legacy_ids = HashSet::new();
    let mut unmatched = 0;
    let mut both = 0;

    for (index, record) in records.iter().enumerate() {
        let row = index + 2;
        let parent = parent_column.map(|c| cell(record, c)).unwrap_or("");
        let slug = slug_column.map(|c| cell(record, c)).unwrap_or("");

        if !parent.is_empty() && !slug.is_empty() {
            both += 1;
            result.detail(format!("Row {}: both parentId and qubitParentSlug set", row));
        } else if !parent.is_empty()
            && !known_legacy_ids.contains(parent)
            && parent.parse::<i64>().is_err()
        {
            unmatched += 1;
            result.detail(format!("Row {}: parentId '{}' not found earlier in file", row, parent));
        }

        if let Some(column) = legacy_column {
            let legacy_id = cell(record, column);
            if !legacy_id.is_empty() {
                known_legacy_ids.insert(legacy_id.to_string());
            }
        }
    }

    if both > 0 {
        result.warn(format!(
            "Rows with both 'parentId' and 'qubitParentSlug' populated: {}. 'qubitParentSlug' takes precedence.",
            both
        ));
    }
    if unmatched > 0 {
        result.warn(format!(
            "Rows with parentId values that could not be matched: {}. These will be imported as top-level descriptions.",
            unmatched
        ));
    }
    if both == 0 && unmatched == 0 {
        result.info("All parent references resolve.");
    }
    result
}

fn check_field_length(header: &[String], records: &[Vec<String>]) -> CheckResult {
    let mut result = CheckResult::new("Field length check");
    let mut oversized = 0;

    for (index, record) in records.iter().enumerate() {
        for (column, value) in record.iter().enumerate() {
            if value.chars().count() > MAX_FIELD_LENGTH {
                oversized += 1;
                let name = header.get(column).map(String::as_str).unwrap_or("?");
                result.detail(format!("Row {}: column '{}' is too long", index + 2, name));
            }
        }
    }

    if oversized == 0 {
        result.info("All fields are within the length limit.");
    } else {
        result.warn(format!(
            "Fields longer than {} characters: {}. These may be truncated.",
            MAX_FIELD_LENGTH, oversized
        ));
    }
    result
}

/// `en`, `fra`, `pt_BR` style codes
fn is_culture_code(value: &str) -> bool {
    let mut parts = value.splitn(2, '_');
    let language = parts.next().unwrap_or("");
    let language_ok =
        (2..=3).contains(&language.len()) && language.chars().all(|c| c.is_ascii_lowercase());
    let region_ok = match parts.next() {
        None => true,
        Some(region) => {
            (2..=3).contains(&region.len())
                && region.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        }
    };
    language_ok && region_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(csv: &str) -> CsvValidationReport {
        CsvImportValidator::default().check_bytes(csv.as_bytes(), "test.csv")
    }

    fn status_of(report: &CsvValidationReport, title: &str) -> CheckStatus {
        report
            .results
            .iter()
            .find(|r| r.title == title)
            .map(|r| r.status)
            .unwrap()
    }

    #[test]
    fn test_clean_file_has_no_findings() {
        let report = check("legacyId,title,culture\n1,Fonds,en\n2,Series,fr\n");
        assert_eq!(report.warn_count(), 0);
        assert_eq!(report.error_count(), 0);
    }

    #[test]
    fn test_column_count_mismatch_is_error() {
        let report = check("legacyId,title\n1,Fonds,extra\n");
        assert_eq!(status_of(&report, "CSV column count check"), CheckStatus::Error);
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn test_duplicate_columns_are_error() {
        let report = check("legacyId,title,title\n1,A,B\n");
        assert_eq!(status_of(&report, "Duplicate column name check"), CheckStatus::Error);
    }

    #[test]
    fn test_check_counts_once_regardless_of_rows() {
        let report = check("legacyId,title\n1,A\n\n,\n,\n");
        // Blank rows and blank legacy ids: two checks, each counted once
        assert_eq!(status_of(&report, "CSV empty row check"), CheckStatus::Warning);
        assert_eq!(status_of(&report, "Legacy id check"), CheckStatus::Warning);
        assert_eq!(report.warn_count(), 2);
    }

    #[test]
    fn test_missing_legacy_id_column_warns() {
        let report = check("title\nFonds\n");
        assert_eq!(status_of(&report, "Legacy id check"), CheckStatus::Warning);
    }

    #[test]
    fn test_unknown_columns_warn() {
        let report = check("legacyId,title,colour\n1,A,red\n");
        assert_eq!(status_of(&report, "Column name check"), CheckStatus::Warning);
    }

    #[test]
    fn test_parent_reference_to_earlier_row() {
        let report = check("legacyId,parentId,title\n1,,Fonds\n2,1,Series\n3,99,Item\n4,x9,Orphan\n");
        let parent = report
            .results
            .iter()
            .find(|r| r.title == "Parent reference check")
            .unwrap();
        assert_eq!(parent.status, CheckStatus::Warning);
        assert_eq!(parent.details.len(), 1);
        assert!(parent.details[0].contains("x9"));
    }

    #[test]
    fn test_invalid_culture_warns() {
        let report = check("legacyId,title,culture\n1,A,english\n2,B,pt_BR\n");
        assert_eq!(status_of(&report, "Culture check"), CheckStatus::Warning);
    }

    #[test]
    fn test_non_utf8_is_error() {
        let mut bytes = b"legacyId,title\n1,".to_vec();
        bytes.push(0xE9);
        bytes.push(b'\n');
        let report = CsvImportValidator::default().check_bytes(&bytes, "latin1.csv");
        assert_eq!(status_of(&report, "CSV encoding test - UTF-8"), CheckStatus::Error);
    }

    #[test]
    fn test_empty_file_is_error() {
        let report = check("");
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn test_verbose_report_adds_details() {
        let report = check("legacyId,title\n1,A,B\n");
        let verbose = report.render(true);
        let short = report.render(false);
        assert!(verbose.contains("Row 2 has 3 columns, header has 2"));
        assert!(!short.contains("Row 2 has 3 columns"));
        assert!(short.contains("Filename: test.csv"));
    }

    #[test]
    fn test_culture_codes() {
        assert!(is_culture_code("en"));
        assert!(is_culture_code("pt_BR"));
        assert!(!is_culture_code("EN"));
        assert!(!is_culture_code("english"));
    }
}
