//! `filter.json` manifests shipped inside downloaded remote filters.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::core::definition::{FilterDefinition, Object};
use crate::core::paths::MANIFEST_FILE;
use crate::error::FilterError;

/// Read the ordered `filters` declarations of the manifest in `dir`.
pub fn read_manifest(dir: &Path) -> Result<Vec<Object>, FilterError> {
    let path = dir.join(MANIFEST_FILE);
    let manifest_error = |reason: String| FilterError::ManifestRead {
        path: path.clone(),
        reason,
    };

    let raw = fs::read_to_string(&path).map_err(|err| manifest_error(err.to_string()))?;
    let document: Value = serde_json::from_str(&raw)
        .map_err(|err| manifest_error(format!("invalid JSON: {err}")))?;
    let filters = document
        .get("filters")
        .and_then(Value::as_array)
        .ok_or_else(|| manifest_error("missing 'filters' array".to_string()))?;

    filters
        .iter()
        .enumerate()
        .map(|(index, filter)| {
            filter
                .as_object()
                .cloned()
                .ok_or_else(|| manifest_error(format!("filter {index} is not an object")))
        })
        .collect()
}

/// Identity given to the `index`-th declaration of a remote filter.
pub fn nested_id(parent: &str, index: usize) -> String {
    format!("{parent}:subfilter{index}")
}

/// Parse one manifest declaration. Remote filters may not nest other remote filters.
pub fn nested_definition(
    parent: &str,
    index: usize,
    declaration: &Object,
) -> Result<FilterDefinition, FilterError> {
    let id = nested_id(parent, index);
    let definition = FilterDefinition::from_object(&id, declaration)?;
    if let FilterDefinition::Remote(_) = definition {
        return Err(FilterError::ConfigParse {
            filter: id,
            reason: "remote filters cannot contain other remote filters".to_string(),
        });
    }
    Ok(definition)
}

/// Wrap an error raised for the `index`-th declaration of `parent`.
pub fn nested_error(parent: &str, index: usize, source: FilterError) -> FilterError {
    FilterError::Nested {
        filter: parent.to_string(),
        index,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_declarations_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join(MANIFEST_FILE),
            r#"{"filters":[{"runWith":"python","script":"a.py"},{"runWith":"exe","exe":"b"}]}"#,
        )
        .expect("write");
        let filters = read_manifest(temp.path()).expect("read");
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].get("script"), Some(&json!("a.py")));
        assert_eq!(filters[1].get("exe"), Some(&json!("b")));
    }

    #[test]
    fn missing_manifest_is_manifest_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = read_manifest(temp.path()).unwrap_err();
        assert!(matches!(err, FilterError::ManifestRead { .. }));
    }

    #[test]
    fn malformed_manifests_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        for body in ["not json", r#"{"filter":[]}"#, r#"{"filters":[1]}"#] {
            fs::write(temp.path().join(MANIFEST_FILE), body).expect("write");
            let err = read_manifest(temp.path()).unwrap_err();
            assert!(matches!(err, FilterError::ManifestRead { .. }), "{body}");
        }
    }

    #[test]
    fn nested_definitions_get_positional_ids() {
        let declaration = json!({"runWith": "python", "script": "main.py"});
        let def = nested_definition("cleaner", 3, declaration.as_object().expect("object"))
            .expect("parse");
        assert_eq!(def.id(), "cleaner:subfilter3");
    }

    #[test]
    fn nested_remote_is_rejected() {
        let declaration = json!({"version": "1.0.0"});
        let err = nested_definition("cleaner", 0, declaration.as_object().expect("object"))
            .unwrap_err();
        assert!(matches!(err, FilterError::ConfigParse { .. }));
    }
}
