//! Value sources
//!
//! A field's current value comes either from the person editing the record or
//! from a named external producer (document extraction, a data provider, a
//! calculation).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Origin of a field's current value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Source {
    /// Typed by the user
    UserInput,
    /// Supplied by an external producer, identified by source id
    External(String),
}

impl Source {
    /// Create an external source
    pub fn external(id: impl Into<String>) -> Self {
        Source::External(id.into())
    }

    /// Whether this is user input
    pub fn is_user(&self) -> bool {
        matches!(self, Source::UserInput)
    }

    /// External source id, if any
    pub fn external_id(&self) -> Option<&str> {
        match self {
            Source::UserInput => None,
            Source::External(id) => Some(id),
        }
    }

    /// Normalize the source encodings found in stored content
    ///
    /// Accepted forms:
    /// 1. null, missing or empty → user input
    /// 2. `{ "type": "user_input" }` → user input
    /// 3. `{ "type": "document", "name": "x.pdf" }` (or `id`) → external `x.pdf`
    /// 4. `["user_input"]` / `[{ ... }]` → first element, normalized
    /// 5. `"user_input"` / `"User Input"` → user input
    /// 6. any other string → external source named by the string
    ///
    /// # Examples
    ///
    /// ```
    /// use keel_domain::Source;
    /// use serde_json::json;
    ///
    /// assert_eq!(Source::normalize(&json!(null)), Source::UserInput);
    /// assert_eq!(Source::normalize(&json!(["appraisal.pdf"])), Source::external("appraisal.pdf"));
    /// assert_eq!(
    ///     Source::normalize(&json!({"type": "document", "name": "rent_roll.xlsx"})),
    ///     Source::external("rent_roll.xlsx")
    /// );
    /// ```
    pub fn normalize(raw: &Value) -> Source {
        match raw {
            Value::Object(map) => match map.get("type").and_then(Value::as_str) {
                Some(kind) if is_user_marker(kind) => Source::UserInput,
                Some(kind) => {
                    let name = map
                        .get("name")
                        .or_else(|| map.get("id"))
                        .and_then(Value::as_str)
                        .filter(|s| !s.trim().is_empty())
                        .unwrap_or(kind);
                    Source::External(name.to_string())
                }
                None => Source::UserInput,
            },
            Value::Array(items) => match items.first() {
                Some(first @ (Value::Object(_) | Value::String(_))) => Source::normalize(first),
                _ => Source::UserInput,
            },
            Value::String(s) if s.trim().is_empty() || is_user_marker(s) => Source::UserInput,
            Value::String(s) => Source::External(s.clone()),
            _ => Source::UserInput,
        }
    }

    /// Stored-content form: `{type: "user_input"}` or `{type: "external", name}`
    pub fn to_rich(&self) -> Value {
        match self {
            Source::UserInput => json!({ "type": "user_input" }),
            Source::External(id) => json!({ "type": "external", "name": id }),
        }
    }
}

fn is_user_marker(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "user_input" | "user input")
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::UserInput => f.write_str("user input"),
            Source::External(id) => f.write_str(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_user_markers() {
        assert_eq!(Source::normalize(&json!("user_input")), Source::UserInput);
        assert_eq!(Source::normalize(&json!("  User Input ")), Source::UserInput);
        assert_eq!(Source::normalize(&json!(["user_input"])), Source::UserInput);
        assert_eq!(Source::normalize(&json!([])), Source::UserInput);
        assert_eq!(Source::normalize(&json!("")), Source::UserInput);
        assert_eq!(Source::normalize(&json!({"type": "user_input"})), Source::UserInput);
    }

    #[test]
    fn test_normalize_documents() {
        assert_eq!(
            Source::normalize(&json!("OM.pdf")),
            Source::external("OM.pdf")
        );
        assert_eq!(
            Source::normalize(&json!([{"type": "document", "name": "appraisal.pdf"}])),
            Source::external("appraisal.pdf")
        );
        // A typed object without a name falls back to its type
        assert_eq!(
            Source::normalize(&json!({"type": "knowledge_base"})),
            Source::external("knowledge_base")
        );
    }

    #[test]
    fn test_rich_form_normalizes_back() {
        for source in [Source::UserInput, Source::external("doc")] {
            assert_eq!(Source::normalize(&source.to_rich()), source);
        }
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(Source::external("doc")).unwrap();
        assert_eq!(json, json!({"type": "external", "id": "doc"}));
        let json = serde_json::to_value(Source::UserInput).unwrap();
        assert_eq!(json, json!({"type": "user_input"}));
    }
}
