//! Lock set
//!
//! Locked fields are immune to automated overwrite. Sections are not stored:
//! a section is fully locked exactly when each of its fields is. The
//! override-unlock mark records that the user freed one field, so section
//! locks restored from stored content do not re-lock it.

use crate::registry::{FieldId, FieldRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Set of locked fields plus override-unlock marks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockSet {
    #[serde(default)]
    locked: BTreeSet<FieldId>,
    #[serde(default)]
    override_unlocked: BTreeSet<FieldId>,
}

// Only the locked set is state; override marks are hydration bookkeeping and
// must not make a snapshot read as dirty.
impl PartialEq for LockSet {
    fn eq(&self, other: &Self) -> bool {
        self.locked == other.locked
    }
}

impl LockSet {
    /// Empty lock set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a field locked, clearing any override-unlock
    pub fn lock(&mut self, field: &FieldId) -> bool {
        self.override_unlocked.remove(field);
        self.locked.insert(field.clone())
    }

    /// Unlock a field and mark it override-unlocked
    pub fn unlock(&mut self, field: &FieldId) -> bool {
        self.override_unlocked.insert(field.clone());
        self.locked.remove(field)
    }

    /// Remove every lock and mark
    pub fn clear(&mut self) {
        self.locked.clear();
        self.override_unlocked.clear();
    }

    /// Raw lock flag, ignoring warnings
    pub fn is_marked_locked(&self, field: &FieldId) -> bool {
        self.locked.contains(field)
    }

    /// Whether the user explicitly freed this field
    pub fn is_override_unlocked(&self, field: &FieldId) -> bool {
        self.override_unlocked.contains(field)
    }

    /// Fields carrying the raw lock flag
    pub fn locked_fields(&self) -> impl Iterator<Item = &FieldId> {
        self.locked.iter()
    }

    /// Number of locked fields
    pub fn len(&self) -> usize {
        self.locked.len()
    }

    /// Whether no field is locked
    pub fn is_empty(&self) -> bool {
        self.locked.is_empty()
    }

    /// Hydrate from stored maps of `{field: bool}` and `{section: bool}`
    ///
    /// Locked sections expand into field locks, except for fields whose
    /// stored field flag is explicitly `false`.
    pub fn from_legacy(
        locked_fields: Option<&Map<String, Value>>,
        locked_sections: Option<&Map<String, Value>>,
        registry: &FieldRegistry,
    ) -> Self {
        let mut set = LockSet::new();

        if let Some(fields) = locked_fields {
            for (id, flag) in fields {
                let field = FieldId::from(id.as_str());
                match flag.as_bool() {
                    Some(true) => {
                        set.locked.insert(field);
                    }
                    Some(false) => {
                        set.override_unlocked.insert(field);
                    }
                    None => {}
                }
            }
        }

        if let Some(sections) = locked_sections {
            for (id, flag) in sections {
                if flag.as_bool() != Some(true) {
                    continue;
                }
                let Some(section) = registry.section(id) else {
                    continue;
                };
                for field in &section.fields {
                    if !set.override_unlocked.contains(field) {
                        set.locked.insert(field.clone());
                    }
                }
            }
        }

        set
    }

    /// Stored form: `{field: true}` for locks and `{field: false}` for overrides
    pub fn to_legacy(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for field in &self.override_unlocked {
            map.insert(field.to_string(), Value::Bool(false));
        }
        for field in &self.locked {
            map.insert(field.to_string(), Value::Bool(true));
        }
        map
    }
}

/// Why a lock request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockRejection {
    /// Empty fields cannot be newly locked
    EmptyValue,
    /// Fields with active warnings cannot be locked
    HasWarnings,
}

impl LockRejection {
    /// Explanation suitable for a tooltip
    pub fn message(&self) -> &'static str {
        match self {
            LockRejection::EmptyValue => "Enter a value before locking this field",
            LockRejection::HasWarnings => "Resolve the warnings before locking this field",
        }
    }
}

/// Result of toggling one field's lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// The field is now locked
    Locked,
    /// The field is now unlocked
    Unlocked,
    /// Nothing changed
    Rejected(LockRejection),
}

/// Result of toggling a section lock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionLockOutcome {
    /// Fields newly locked
    pub locked: Vec<FieldId>,
    /// Fields unlocked
    pub unlocked: Vec<FieldId>,
    /// Fields left alone (empty or carrying warnings)
    pub skipped: Vec<FieldId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DataType;
    use serde_json::json;

    #[test]
    fn test_lock_unlock_marks() {
        let mut set = LockSet::new();
        let f = FieldId::from("a");
        set.lock(&f);
        assert!(set.is_marked_locked(&f));
        assert!(!set.is_override_unlocked(&f));

        set.unlock(&f);
        assert!(!set.is_marked_locked(&f));
        assert!(set.is_override_unlocked(&f));
    }

    #[test]
    fn test_equality_ignores_override_marks() {
        let mut a = LockSet::new();
        let b = LockSet::new();
        a.unlock(&"x".into());
        assert_eq!(a, b);
    }

    #[test]
    fn test_legacy_sections_respect_overrides() {
        let registry = FieldRegistry::builder()
            .field("a", DataType::Text)
            .field("b", DataType::Text)
            .field("c", DataType::Text)
            .section("s", ["a", "b", "c"])
            .build()
            .unwrap();

        let fields = json!({"b": false});
        let sections = json!({"s": true, "unknown": true});
        let set = LockSet::from_legacy(fields.as_object(), sections.as_object(), &registry);

        assert!(set.is_marked_locked(&"a".into()));
        assert!(!set.is_marked_locked(&"b".into()));
        assert!(set.is_marked_locked(&"c".into()));

        let legacy = set.to_legacy();
        assert_eq!(legacy.get("b"), Some(&json!(false)));
        assert_eq!(legacy.get("a"), Some(&json!(true)));
    }
}
