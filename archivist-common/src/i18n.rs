//! Message catalog for job log lines and user notices
//!
//! Messages are addressed by id and use `%1`, `%2`, ... placeholders.
//! English is compiled in; other cultures are loaded from
//! `<root>/i18n/<culture>.toml`, a flat table of `"message.id" = "text"`.
//! Ids missing from a culture file fall back to English.

use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;

const ENGLISH: &[(&str, &str)] = &[
    ("import.start_file", "Importing %1 file: %2."),
    ("import.start", "Importing %1."),
    ("import.indexing_suspended", "Search indexing suspended for this import."),
    ("import.validating", "Validating file: %1."),
    ("import.validation_errors", "Unable to import selected file: validation errors found: %1."),
    ("import.validation_warnings", "Unable to import selected file: validation warnings found: %1."),
    ("import.unknown_format", "Unable to import selected file: unknown format %1."),
    ("import.missing_file", "Unable to import selected file: no file provided for %1 import."),
    ("import.missing_taxonomy", "Unable to import selected file: no taxonomy selected for SKOS import."),
    ("import.tmp_delete_failed", "Failed to delete temporary file %1 -- please check your folder permissions."),
    ("import.complete", "Import complete."),
    ("options.transform", "Applying transformation to CSV file."),
    ("options.index", "Indexing imported records."),
    ("options.skip_unmatched", "Skipping unmatched records."),
    ("options.skip_matched", "Skipping matched records."),
    ("options.update", "Update type: %1"),
    ("options.repository", "Repository: %1"),
    ("options.collection", "Collection: %1"),
    ("report.creating_zip", "Creating ZIP file %1."),
    ("report.zip_failed", "Failed to create ZIP file."),
    ("move.start", "Moving object (id: %1)"),
    ("move.invalid_object", "Invalid object id"),
    ("move.invalid_parent", "Invalid parent (id: %1)"),
    ("move.to_parent", "Moving object to parent (id: %1)"),
    ("move.between_siblings", "Moving object between siblings"),
    ("move.position_mismatch", "Mismatch in current position"),
    ("move.out_of_range", "New position outside the range"),
    ("move.invalid_target", "Invalid target sibling (id: %1)"),
    ("move.same_position", "Object already at position %1"),
    ("move.before", "Moving object before sibling (id: %1)"),
    ("move.after", "Moving object after sibling (id: %1)"),
    ("move.conflict", "Sibling order changed during move: %1"),
    ("move.reindexing", "Reindexing object id: %1"),
    ("move.complete", "Move completed."),
    ("documents.start", "Updating search documents for %1 descriptions."),
    ("documents.updating", "Updating description (id: %1)"),
    ("documents.missing", "Description not found (id: %1)"),
    ("documents.complete", "Update complete."),
    ("term.updated_notice", "Your term has been updated. Its related descriptions are being updated asynchronously – check the <a href=\"%1\">job scheduler page</a> for status and details."),
    ("job.unexpected_error", "Job failed unexpectedly: %1"),
    ("job.interrupted", "Job interrupted by service restart"),
];

/// Culture-specific message catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    culture: String,
    messages: HashMap<String, String>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::english()
    }
}

impl Catalog {
    /// Built-in English catalog
    pub fn english() -> Self {
        Self {
            culture: "en".to_string(),
            messages: ENGLISH
                .iter()
                .map(|(id, text)| (id.to_string(), text.to_string()))
                .collect(),
        }
    }

    /// Load a culture, overlaying its file on the English catalog
    ///
    /// A missing culture file is not an error: the English catalog is used.
    pub fn load(culture: &str, i18n_dir: &Path) -> Result<Self> {
        let mut catalog = Self::english();
        if culture == "en" {
            return Ok(catalog);
        }

        let path = i18n_dir.join(format!("{}.toml", culture));
        if !path.exists() {
            tracing::warn!(culture, path = %path.display(), "No message catalog for culture, using English");
            return Ok(catalog);
        }

        let content = std::fs::read_to_string(&path)?;
        let overrides: HashMap<String, String> = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

        tracing::info!(culture, messages = overrides.len(), "Message catalog loaded");
        catalog.messages.extend(overrides);
        catalog.culture = culture.to_string();
        Ok(catalog)
    }

    pub fn culture(&self) -> &str {
        &self.culture
    }

    /// Translate a message id, substituting `%1`, `%2`, ... with `args`
    ///
    /// Unknown ids are returned verbatim so a missing entry stays visible.
    pub fn tr(&self, id: &str, args: &[&dyn Display]) -> String {
        let template = self.messages.get(id).map(String::as_str).unwrap_or(id);
        substitute(template, args)
    }
}

/// Replace placeholders in one left-to-right pass
///
/// Substituted text is never rescanned. `%N` with no matching argument is
/// kept verbatim.
fn substitute(template: &str, args: &[&dyn Display]) -> String {
    let mut text = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('%') {
        text.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();

        let arg = after[..digits]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| args.get(index));
        match arg {
            Some(arg) => text.push_str(&arg.to_string()),
            None => text.push_str(&rest[start..start + 1 + digits]),
        }
        rest = &after[digits..];
    }
    text.push_str(rest);
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_positional_arguments() {
        let catalog = Catalog::english();
        assert_eq!(
            catalog.tr("import.start_file", &[&"CSV", &"fonds.csv"]),
            "Importing CSV file: fonds.csv."
        );
        assert_eq!(catalog.tr("move.start", &[&42]), "Moving object (id: 42)");
    }

    #[test]
    fn test_unknown_id_is_returned_verbatim() {
        let catalog = Catalog::english();
        assert_eq!(catalog.tr("no.such.message", &[]), "no.such.message");
    }

    #[test]
    fn test_double_digit_placeholders() {
        let args: Vec<String> = (1..=10).map(|i| format!("a{}", i)).collect();
        let refs: Vec<&dyn Display> = args.iter().map(|a| a as &dyn Display).collect();
        assert_eq!(substitute("%10 %1", &refs), "a10 a1");
    }

    #[test]
    fn test_arguments_are_not_rescanned() {
        let catalog = Catalog::english();
        assert_eq!(
            catalog.tr("import.start_file", &[&"CSV", &"x%1.csv"]),
            "Importing CSV file: x%1.csv."
        );
        assert_eq!(substitute("%1 and %3 at 100%", &[&"a"]), "a and %3 at 100%");
    }

    #[test]
    fn test_culture_file_overrides_english() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("fr.toml"),
            "\"import.complete\" = \"Importation terminée.\"\n",
        )
        .unwrap();

        let catalog = Catalog::load("fr", dir.path()).unwrap();
        assert_eq!(catalog.culture(), "fr");
        assert_eq!(catalog.tr("import.complete", &[]), "Importation terminée.");
        // Falls back to English for ids the culture file lacks
        assert_eq!(catalog.tr("move.complete", &[]), "Move completed.");
    }

    #[test]
    fn test_missing_culture_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::load("de", dir.path()).unwrap();
        assert_eq!(catalog.culture(), "en");
    }
}
