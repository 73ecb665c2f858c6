//! Importer options derived from the raw request option set
//!
//! Keys with empty values (`false`, `0`, `""`, `null`, empty collections) are
//! skipped. Every applied key leaves a note that the job turns into a log
//! line; unknown keys are ignored.

use crate::models::import_params::{is_falsy, value_as_i64, value_as_string};
use crate::repository::ScopeLimit;
use serde_json::{Map, Value};

/// How matched records are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    #[default]
    ImportAsNew,
    MatchAndUpdate,
    DeleteAndReplace,
}

impl UpdateMode {
    /// Unknown names fall back to `ImportAsNew`
    pub fn parse(value: &str) -> Self {
        match value {
            "match-and-update" => UpdateMode::MatchAndUpdate,
            "delete-and-replace" => UpdateMode::DeleteAndReplace,
            "import-as-new" => UpdateMode::ImportAsNew,
            other => {
                tracing::warn!(update = other, "Unknown update type, importing as new");
                UpdateMode::ImportAsNew
            }
        }
    }
}

/// A log line to emit, as message id plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionNote {
    pub message_id: &'static str,
    pub args: Vec<String>,
}

impl OptionNote {
    fn new(message_id: &'static str) -> Self {
        Self {
            message_id,
            args: Vec::new(),
        }
    }

    fn with_arg(message_id: &'static str, arg: String) -> Self {
        Self {
            message_id,
            args: vec![arg],
        }
    }
}

/// Derived options plus the notes produced while deriving them
#[derive(Debug, Clone, PartialEq)]
pub struct Derived<T> {
    pub options: T,
    pub notes: Vec<OptionNote>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvImportOptions {
    pub do_csv_transform: bool,
    pub index_during_import: bool,
    pub skip_unmatched: bool,
    pub skip_matched: bool,
    pub update_type: Option<UpdateMode>,
    pub limit: Option<ScopeLimit>,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlImportOptions {
    /// Always false for jobs; tolerant parsing
    pub strict_xml_parsing: bool,
    pub index: bool,
    pub skip_unmatched: bool,
    pub skip_matched: bool,
    /// Absent for `import-as-new`
    pub update: Option<UpdateMode>,
    pub limit: Option<ScopeLimit>,
    pub parent_id: Option<i64>,
}

/// Shared walk over the option set, in submission order
///
/// The collection limit always wins over the repository limit, whatever the
/// key order.
fn walk(
    raw: &Map<String, Value>,
    mut apply: impl FnMut(&str, &Value, &mut Vec<OptionNote>),
) -> (Option<ScopeLimit>, Option<i64>, Vec<OptionNote>) {
    let mut notes = Vec::new();
    let mut repository = None;
    let mut collection = None;
    let mut parent_id = None;

    for (key, value) in raw {
        if is_falsy(value) {
            continue;
        }
        match key.as_str() {
            "repositorySlug" => {
                let slug = value_as_string(value);
                notes.push(OptionNote::with_arg("options.repository", slug.clone()));
                repository = Some(slug);
            }
            "collectionSlug" => {
                let slug = value_as_string(value);
                notes.push(OptionNote::with_arg("options.collection", slug.clone()));
                collection = Some(slug);
            }
            "parentId" => parent_id = value_as_i64(value),
            other => apply(other, value, &mut notes),
        }
    }

    let limit = collection
        .map(ScopeLimit::Collection)
        .or(repository.map(ScopeLimit::Repository));
    (limit, parent_id, notes)
}

/// Project raw options onto the CSV importer
///
/// For `objectType = event` the `index` key is neither applied nor noted.
pub fn derive_csv_options(raw: &Map<String, Value>, object_type: &str) -> Derived<CsvImportOptions> {
    let mut options = CsvImportOptions::default();

    let (limit, parent_id, notes) = walk(raw, |key, value, notes| match key {
        "doCsvTransform" => {
            notes.push(OptionNote::new("options.transform"));
            options.do_csv_transform = true;
        }
        "index" => {
            if object_type != "event" {
                notes.push(OptionNote::new("options.index"));
                options.index_during_import = true;
            }
        }
        "skip-unmatched" => {
            notes.push(OptionNote::new("options.skip_unmatched"));
            options.skip_unmatched = true;
        }
        "skip-matched" => {
            notes.push(OptionNote::new("options.skip_matched"));
            options.skip_matched = true;
        }
        "update" => {
            let update = value_as_string(value);
            notes.push(OptionNote::with_arg("options.update", update.clone()));
            options.update_type = Some(UpdateMode::parse(&update));
        }
        _ => {}
    });

    options.limit = limit;
    options.parent_id = parent_id;
    Derived { options, notes }
}

/// Project raw options onto the XML importer
pub fn derive_xml_options(raw: &Map<String, Value>) -> Derived<XmlImportOptions> {
    let mut options = XmlImportOptions::default();

    let (limit, parent_id, notes) = walk(raw, |key, value, notes| match key {
        "index" => {
            notes.push(OptionNote::new("options.index"));
            options.index = true;
        }
        "skip-unmatched" => {
            notes.push(OptionNote::new("options.skip_unmatched"));
            options.skip_unmatched = true;
        }
        "skip-matched" => {
            notes.push(OptionNote::new("options.skip_matched"));
            options.skip_matched = true;
        }
        "update" => {
            let update = value_as_string(value);
            notes.push(OptionNote::with_arg("options.update", update.clone()));
            if update != "import-as-new" {
                options.update = Some(UpdateMode::parse(&update));
            }
        }
        _ => {}
    });

    options.limit = limit;
    options.parent_id = parent_id;
    Derived { options, notes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn ids(notes: &[OptionNote]) -> Vec<&'static str> {
        notes.iter().map(|n| n.message_id).collect()
    }

    #[test]
    fn test_falsy_values_are_skipped() {
        let derived = derive_csv_options(
            &raw(json!({"doCsvTransform": true, "index": false, "skip-matched": "", "update": null})),
            "file",
        );

        assert_eq!(
            derived.options,
            CsvImportOptions {
                do_csv_transform: true,
                ..Default::default()
            }
        );
        assert_eq!(ids(&derived.notes), vec!["options.transform"]);
    }

    #[test]
    fn test_event_rows_never_index() {
        let derived = derive_csv_options(&raw(json!({"index": true})), "event");
        assert!(!derived.options.index_during_import);
        assert!(derived.notes.is_empty());

        let derived = derive_csv_options(&raw(json!({"index": true})), "informationObject");
        assert!(derived.options.index_during_import);
        assert_eq!(ids(&derived.notes), vec!["options.index"]);
    }

    #[test]
    fn test_collection_overrides_repository() {
        let derived = derive_csv_options(
            &raw(json!({"collectionSlug": "fonds-a", "repositorySlug": "city-archives"})),
            "informationObject",
        );
        assert_eq!(
            derived.options.limit,
            Some(ScopeLimit::Collection("fonds-a".to_string()))
        );
        // Both keys are still noted
        assert_eq!(derived.notes.len(), 2);
    }

    #[test]
    fn test_notes_follow_submission_order() {
        let derived = derive_csv_options(
            &raw(json!({
                "update": "match-and-update",
                "repositorySlug": "city-archives",
                "doCsvTransform": true,
            })),
            "informationObject",
        );
        assert_eq!(
            ids(&derived.notes),
            vec!["options.update", "options.repository", "options.transform"]
        );
    }

    #[test]
    fn test_update_and_parent() {
        let derived = derive_csv_options(
            &raw(json!({"update": "match-and-update", "parentId": "42", "unknownKey": 1})),
            "informationObject",
        );
        assert_eq!(derived.options.update_type, Some(UpdateMode::MatchAndUpdate));
        assert_eq!(derived.options.parent_id, Some(42));
        assert_eq!(
            derived.notes,
            vec![OptionNote::with_arg("options.update", "match-and-update".to_string())]
        );
    }

    #[test]
    fn test_xml_import_as_new_is_noted_but_not_set() {
        let derived = derive_xml_options(&raw(json!({"update": "import-as-new", "index": true})));
        assert_eq!(derived.options.update, None);
        assert!(derived.options.index);
        assert!(!derived.options.strict_xml_parsing);
        assert_eq!(derived.notes.len(), 2);
    }

    #[test]
    fn test_xml_ignores_csv_only_keys() {
        let derived = derive_xml_options(&raw(json!({"doCsvTransform": true})));
        assert_eq!(derived.options, XmlImportOptions::default());
        assert!(derived.notes.is_empty());
    }
}
