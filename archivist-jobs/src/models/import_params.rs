//! Raw import parameters as submitted by the user

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Uploaded file descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Original file name, used in log lines
    pub name: String,
    /// Where the upload was stored; deleted after the import
    pub tmp_name: PathBuf,
}

/// Import request parameters
///
/// Option keys (`doCsvTransform`, `index`, `skip-unmatched`, ...) are kept in
/// `options` untouched; each importer derives its own option set from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportParameters {
    #[serde(default)]
    pub import_type: String,
    #[serde(default)]
    pub file: Option<UploadedFile>,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub taxonomy_id: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl ImportParameters {
    /// Value of an option key, `None` when absent
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// True only when `index` is the boolean `false`
    pub fn index_disabled(&self) -> bool {
        matches!(self.options.get("index"), Some(Value::Bool(false)))
    }

    pub fn parent_id(&self) -> Option<i64> {
        self.options.get("parentId").and_then(value_as_i64)
    }

    pub fn object_type(&self) -> &str {
        self.object_type.as_deref().unwrap_or("")
    }
}

/// Supported import formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Csv,
    Xml,
    Skos,
}

impl ImportKind {
    /// Case-insensitive; blank or unrecognized types yield `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(ImportKind::Csv),
            "xml" => Some(ImportKind::Xml),
            "skos" => Some(ImportKind::Skos),
            _ => None,
        }
    }

    /// Upper-case label used in log lines
    pub fn label(&self) -> &'static str {
        match self {
            ImportKind::Csv => "CSV",
            ImportKind::Xml => "XML",
            ImportKind::Skos => "SKOS",
        }
    }
}

/// Empty-value test for option values: `null`, `false`, `0`, `""`, `"0"`,
/// empty arrays and empty objects
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Render an option value the way it appears in log lines
pub fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_option_keys_are_flattened() {
        let params: ImportParameters = serde_json::from_value(json!({
            "importType": "csv",
            "file": {"name": "fonds.csv", "tmp_name": "/tmp/php123"},
            "objectType": "informationObject",
            "skip-matched": true,
            "parentId": "17"
        }))
        .unwrap();

        assert_eq!(params.import_type, "csv");
        assert_eq!(params.file.as_ref().unwrap().name, "fonds.csv");
        assert_eq!(params.option("skip-matched"), Some(&json!(true)));
        assert_eq!(params.parent_id(), Some(17));
        assert!(!params.options.contains_key("importType"));
    }

    #[test]
    fn test_index_disabled_only_when_explicit() {
        let mut params = ImportParameters::default();
        assert!(!params.index_disabled());

        params.options.insert("index".into(), json!(false));
        assert!(params.index_disabled());

        params.options.insert("index".into(), json!("1"));
        assert!(!params.index_disabled());
    }

    #[test]
    fn test_falsy_index_values_keep_indexing() {
        for value in [json!(0), json!("0"), json!(""), json!(null), json!([])] {
            let params: ImportParameters = serde_json::from_value(json!({
                "importType": "skos",
                "index": value.clone(),
            }))
            .unwrap();
            assert!(!params.index_disabled(), "index = {}", value);
        }
    }

    #[test]
    fn test_import_kind_parse() {
        assert_eq!(ImportKind::parse("CSV"), Some(ImportKind::Csv));
        assert_eq!(ImportKind::parse("skos"), Some(ImportKind::Skos));
        assert_eq!(ImportKind::parse(""), None);
        assert_eq!(ImportKind::parse("json"), None);
    }

    #[test]
    fn test_falsy_values() {
        for value in [json!(null), json!(false), json!(0), json!(""), json!("0"), json!([]), json!({})] {
            assert!(is_falsy(&value), "{} should be falsy", value);
        }
        for value in [json!(true), json!(1), json!("no"), json!([0])] {
            assert!(!is_falsy(&value), "{} should be truthy", value);
        }
    }
}
