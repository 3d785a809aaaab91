//! Rich content merging
//!
//! Stored records keep each field as a rich entry:
//!
//! ```json
//! { "value": 500000, "source": {"type": "external", "name": "appraisal.pdf"},
//!   "warnings": [], "other_values": [] }
//! ```
//!
//! Older content holds flat values and assorted source encodings. Merging
//! normalizes everything it touches into the rich shape.

use crate::source::Source;
use serde_json::{json, Map, Value};

/// Root keys holding record-level structure rather than field values
const ROOT_KEYS: &[&str] = &["projectSections", "borrowerSections"];

/// Root key carrying the stored lock map
pub const LOCKED_FIELDS_KEY: &str = "_lockedFields";

/// Root key carrying stored section locks
pub const LOCKED_SECTIONS_KEY: &str = "_lockedSections";

/// Whether a content key is record-level rather than a field
pub fn is_root_key(key: &str) -> bool {
    key.starts_with('_') || ROOT_KEYS.contains(&key)
}

/// Merged content plus the lock map pulled out of the update
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Merged rich content
    pub content: Map<String, Value>,
    /// `_lockedFields` from the update, if it carried one
    pub locked_fields: Option<Value>,
}

/// Merge a partial update into stored rich content
///
/// For each updated field:
/// 1. With metadata for the field, its source, warnings and other values win.
/// 2. An update that is already a rich entry is taken as is.
/// 3. An existing rich entry keeps its source, warnings and alternates and
///    only its value changes.
/// 4. Anything else becomes a user-input entry.
///
/// Fields not in the update are kept and normalized. Root keys pass through,
/// except `_lockedFields`, which is returned separately.
pub fn merge_rich_content(
    existing: &Map<String, Value>,
    updates: &Map<String, Value>,
    metadata: Option<&Map<String, Value>>,
) -> MergeOutcome {
    let mut content = Map::new();

    for (key, value) in existing {
        if key == LOCKED_FIELDS_KEY {
            continue;
        }
        if is_root_key(key) {
            content.insert(key.clone(), value.clone());
        } else {
            content.insert(key.clone(), normalize_entry(value));
        }
    }

    let mut locked_fields = None;

    for (key, update) in updates {
        if key == LOCKED_FIELDS_KEY {
            if update.is_object() {
                locked_fields = Some(update.clone());
            }
            continue;
        }
        if is_root_key(key) {
            content.insert(key.clone(), update.clone());
            continue;
        }

        let field_meta = metadata.and_then(|m| m.get(key)).and_then(Value::as_object);
        let merged = if let Some(meta) = field_meta {
            let mut entry = rich_entry(
                strip_rich(update).clone(),
                Source::normalize(meta.get("source").unwrap_or(&Value::Null)),
            );
            entry["warnings"] = string_list(meta.get("warnings"));
            entry["other_values"] = normalize_alternates(meta.get("other_values"));
            entry
        } else if is_rich(update) {
            normalize_entry(update)
        } else if let Some(current) = content.get(key).filter(|v| is_rich(v)) {
            let mut entry = current.clone();
            entry["value"] = update.clone();
            entry
        } else {
            rich_entry(update.clone(), Source::UserInput)
        };

        content.insert(key.clone(), merged);
    }

    MergeOutcome {
        content,
        locked_fields,
    }
}

/// Whether a stored value is a rich entry rather than a flat value
pub fn is_rich(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|m| m.contains_key("value") && (m.contains_key("source") || m.contains_key("sources")))
}

/// Normalize a stored field value into the rich shape
pub fn normalize_entry(value: &Value) -> Value {
    match value.as_object() {
        Some(map) if is_rich(value) => {
            let raw_source = map
                .get("source")
                .or_else(|| map.get("sources"))
                .unwrap_or(&Value::Null);
            let mut entry = rich_entry(
                map.get("value").cloned().unwrap_or(Value::Null),
                Source::normalize(raw_source),
            );
            entry["warnings"] = string_list(map.get("warnings"));
            entry["other_values"] = normalize_alternates(map.get("other_values"));
            entry
        }
        _ => rich_entry(value.clone(), Source::UserInput),
    }
}

fn rich_entry(value: Value, source: Source) -> Value {
    json!({
        "value": value,
        "source": source.to_rich(),
        "warnings": [],
        "other_values": [],
    })
}

fn strip_rich(value: &Value) -> &Value {
    if is_rich(value) {
        value.get("value").unwrap_or(&Value::Null)
    } else {
        value
    }
}

fn string_list(raw: Option<&Value>) -> Value {
    let items = raw
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| Value::String(s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    Value::Array(items)
}

fn normalize_alternates(raw: Option<&Value>) -> Value {
    let items = raw
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|alt| {
                    json!({
                        "value": alt.get("value").cloned().unwrap_or(Value::Null),
                        "source": Source::normalize(alt.get("source").unwrap_or(&Value::Null)).to_rich(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Value::Array(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_flat_values_become_user_entries() {
        let outcome = merge_rich_content(&Map::new(), &obj(json!({"purchasePrice": 500000})), None);
        let entry = &outcome.content["purchasePrice"];
        assert_eq!(entry["value"], json!(500000));
        assert_eq!(entry["source"], json!({"type": "user_input"}));
    }

    #[test]
    fn test_existing_rich_entry_keeps_source() {
        let existing = obj(json!({
            "purchasePrice": {"value": 500000, "source": "appraisal.pdf", "warnings": ["w"]}
        }));
        let outcome = merge_rich_content(&existing, &obj(json!({"purchasePrice": 550000})), None);
        let entry = &outcome.content["purchasePrice"];

        assert_eq!(entry["value"], json!(550000));
        assert_eq!(entry["source"], json!({"type": "external", "name": "appraisal.pdf"}));
        assert_eq!(entry["warnings"], json!(["w"]));
    }

    #[test]
    fn test_metadata_wins() {
        let existing = obj(json!({"loan": {"value": 1, "source": "user_input"}}));
        let metadata = obj(json!({
            "loan": {"source": {"type": "document", "name": "term_sheet.pdf"}, "warnings": ["check"]}
        }));
        let outcome = merge_rich_content(&existing, &obj(json!({"loan": 2})), Some(&metadata));
        let entry = &outcome.content["loan"];

        assert_eq!(entry["value"], json!(2));
        assert_eq!(entry["source"]["name"], json!("term_sheet.pdf"));
        assert_eq!(entry["warnings"], json!(["check"]));
    }

    #[test]
    fn test_locked_fields_extracted_and_roots_pass_through() {
        let existing = obj(json!({"_meta": {"v": 1}, "projectSections": ["a"]}));
        let updates = obj(json!({"_lockedFields": {"loan": true}, "_meta": {"v": 2}}));
        let outcome = merge_rich_content(&existing, &updates, None);

        assert_eq!(outcome.locked_fields, Some(json!({"loan": true})));
        assert!(!outcome.content.contains_key(LOCKED_FIELDS_KEY));
        assert_eq!(outcome.content["_meta"], json!({"v": 2}));
        assert_eq!(outcome.content["projectSections"], json!(["a"]));
    }

    #[test]
    fn test_untouched_fields_are_normalized() {
        let existing = obj(json!({"name": "Harbor Lofts", "units": {"value": 40, "sources": ["OM.pdf"]}}));
        let outcome = merge_rich_content(&existing, &Map::new(), None);

        assert_eq!(outcome.content["name"]["source"], json!({"type": "user_input"}));
        assert_eq!(outcome.content["units"]["source"]["name"], json!("OM.pdf"));
    }
}
