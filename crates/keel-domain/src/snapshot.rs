//! Snapshot aggregate
//!
//! A [`Snapshot`] owns the three parts of a record's editable state: values,
//! provenance and locks. Every engine mutation goes through it, and dirtiness
//! is plain structural equality against the persisted baseline.

use crate::classify::{classify, FieldState};
use crate::error::DomainError;
use crate::lock::{LockOutcome, LockRejection, LockSet, SectionLockOutcome};
use crate::merge::{self, LOCKED_FIELDS_KEY, LOCKED_SECTIONS_KEY};
use crate::provenance::{AlternateValue, EditEffect, FieldProvenance};
use crate::registry::{FieldId, FieldRegistry};
use crate::source::Source;
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Values, provenance and locks of one record at one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current value per field; blank values are not stored
    #[serde(default)]
    pub values: BTreeMap<FieldId, FieldValue>,
    /// Provenance per touched field
    #[serde(default)]
    pub provenance: BTreeMap<FieldId, FieldProvenance>,
    /// Lock set
    #[serde(default)]
    pub locks: LockSet,
}

impl Snapshot {
    /// Empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a field
    pub fn value(&self, field: &FieldId) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Provenance entry of a field
    pub fn provenance(&self, field: &FieldId) -> Option<&FieldProvenance> {
        self.provenance.get(field)
    }

    /// Active warnings of a field
    pub fn warnings(&self, field: &FieldId) -> &[String] {
        self.provenance
            .get(field)
            .map(|p| p.warnings.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the field has active warnings
    pub fn has_warnings(&self, field: &FieldId) -> bool {
        !self.warnings(field).is_empty()
    }

    /// Effective lock state: marked locked and warning-free
    pub fn is_locked(&self, field: &FieldId) -> bool {
        self.locks.is_marked_locked(field) && !self.has_warnings(field)
    }

    /// Display state of a field
    pub fn classify(&self, field: &FieldId) -> FieldState {
        classify(
            self.value(field),
            self.provenance(field),
            self.locks.is_marked_locked(field),
        )
    }

    fn has_value(&self, field: &FieldId) -> bool {
        self.values.get(field).is_some_and(|v| !v.is_blank())
    }

    fn store_value(&mut self, field: &FieldId, value: Option<FieldValue>) {
        match value {
            Some(v) => {
                self.values.insert(field.clone(), v);
            }
            None => {
                self.values.remove(field);
            }
        }
    }

    /// Apply a value typed by the user
    ///
    /// Blank input clears the value. A blank edit on a never-touched field
    /// leaves it untouched. User edits are allowed on locked fields.
    pub fn record_user_edit(&mut self, field: &FieldId, value: Option<FieldValue>) -> EditEffect {
        let value = value.filter(|v| !v.is_blank());

        let effect = match self.provenance.get_mut(field) {
            Some(prov) => prov.record_user_edit(value.clone()),
            None if value.is_none() && !self.values.contains_key(field) => {
                return EditEffect::Unchanged;
            }
            None => {
                self.provenance
                    .insert(field.clone(), FieldProvenance::user(value.clone()));
                EditEffect::Created
            }
        };

        // A revert restores the proposed value, which equals the typed one
        let stored = self.provenance.get(field).and_then(|p| p.value.clone());
        self.store_value(field, stored);
        effect
    }

    /// Apply a value from an external producer
    ///
    /// Returns `false` without touching anything when the field is locked.
    pub fn record_external_value(
        &mut self,
        field: &FieldId,
        value: Option<FieldValue>,
        source_id: &str,
    ) -> bool {
        if self.is_locked(field) {
            return false;
        }
        let value = value.filter(|v| !v.is_blank());
        let source = Source::external(source_id);

        match self.provenance.get_mut(field) {
            Some(prov) => prov.record_external(value.clone(), source),
            None => {
                let mut prov = FieldProvenance::user(None);
                prov.source = source;
                prov.value = value.clone();
                // A user value typed before provenance existed is kept as an alternate
                if let Some(previous) = self.values.get(field).filter(|v| Some(*v) != value.as_ref()) {
                    prov.alternate_values.push(AlternateValue {
                        value: previous.clone(),
                        source: Source::UserInput,
                    });
                }
                self.provenance.insert(field.clone(), prov);
            }
        }

        self.store_value(field, value);
        true
    }

    /// Replace a field's warnings, returning whether anything changed
    ///
    /// A field with neither value nor provenance stays untouched.
    pub fn set_warnings(&mut self, field: &FieldId, warnings: Vec<String>) -> bool {
        if let Some(prov) = self.provenance.get_mut(field) {
            return prov.set_warnings(warnings);
        }
        if warnings.is_empty() || !self.values.contains_key(field) {
            return false;
        }
        let mut prov = FieldProvenance::user(self.values.get(field).cloned());
        prov.warnings = warnings;
        self.provenance.insert(field.clone(), prov);
        true
    }

    /// Lock an unlocked field or unlock a locked one
    pub fn toggle_field_lock(&mut self, field: &FieldId) -> LockOutcome {
        if self.is_locked(field) {
            self.locks.unlock(field);
            return LockOutcome::Unlocked;
        }
        if self.has_warnings(field) {
            return LockOutcome::Rejected(LockRejection::HasWarnings);
        }
        if !self.has_value(field) {
            return LockOutcome::Rejected(LockRejection::EmptyValue);
        }
        self.locks.lock(field);
        LockOutcome::Locked
    }

    /// Lock or unlock a section's fields as a group
    ///
    /// A section reads as locked when at least one field is locked and every
    /// other field is one that cannot be locked (empty or carrying warnings).
    /// Toggling a locked section unlocks all of its fields. Otherwise each
    /// field with a value and no warnings is locked and the rest are reported
    /// as skipped.
    pub fn toggle_section_lock(&mut self, fields: &[FieldId]) -> SectionLockOutcome {
        let mut outcome = SectionLockOutcome::default();
        if fields.is_empty() {
            return outcome;
        }

        if self.is_section_locked(fields) {
            for field in fields {
                if self.locks.is_marked_locked(field) {
                    self.locks.unlock(field);
                    outcome.unlocked.push(field.clone());
                }
            }
            return outcome;
        }

        for field in fields {
            if self.is_locked(field) {
                continue;
            }
            if self.is_lockable(field) {
                self.locks.lock(field);
                outcome.locked.push(field.clone());
            } else {
                outcome.skipped.push(field.clone());
            }
        }
        outcome
    }

    /// Whether a section toggle would unlock the listed fields
    pub fn is_section_locked(&self, fields: &[FieldId]) -> bool {
        fields.iter().any(|f| self.is_locked(f))
            && fields
                .iter()
                .all(|f| self.is_locked(f) || !self.is_lockable(f))
    }

    fn is_lockable(&self, field: &FieldId) -> bool {
        self.has_value(field) && !self.has_warnings(field)
    }

    /// Share of required fields holding a value, 0 to 100, rounded down
    pub fn completeness_percent(&self, registry: &FieldRegistry) -> u8 {
        let (filled, total) = registry
            .required_fields()
            .fold((0usize, 0usize), |(filled, total), field| {
                (filled + usize::from(self.has_value(field)), total + 1)
            });
        if total == 0 {
            return 100;
        }
        // filled <= total so the result fits in 0..=100
        (filled * 100 / total) as u8
    }

    /// Whether any field holds a non-blank value
    pub fn has_meaningful_content(&self) -> bool {
        self.values.values().any(|v| !v.is_blank())
    }

    /// Hydrate from stored rich content
    ///
    /// Unknown keys are ignored. Lock state comes from `_lockedFields` and
    /// `_lockedSections`.
    pub fn from_rich_content(content: &Value, registry: &FieldRegistry) -> Result<Self, DomainError> {
        let map = content
            .as_object()
            .ok_or_else(|| DomainError::MalformedContent("content must be a JSON object".into()))?;

        let merged = merge::merge_rich_content(&Map::new(), map, None);
        let mut snapshot = Snapshot::new();

        for (key, entry) in &merged.content {
            if merge::is_root_key(key) {
                continue;
            }
            let field = FieldId::from(key.as_str());
            let Some(data_type) = registry.data_type(&field) else {
                continue;
            };

            let value = FieldValue::from_json(key, data_type, &entry["value"])?;
            let source = Source::normalize(&entry["source"]);
            let explicit_source = map
                .get(key)
                .is_some_and(|raw| merge::is_rich(raw) && !source.is_user());

            let warnings: Vec<String> = entry["warnings"]
                .as_array()
                .map(|w| w.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();

            if value.is_none() && !explicit_source && warnings.is_empty() {
                continue;
            }

            let alternate_values = entry["other_values"]
                .as_array()
                .map(|alts| {
                    alts.iter()
                        .filter_map(|alt| {
                            let value = FieldValue::from_json(key, data_type, &alt["value"]).ok()??;
                            Some(AlternateValue {
                                value,
                                source: Source::normalize(&alt["source"]),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();

            if let Some(v) = &value {
                snapshot.values.insert(field.clone(), v.clone());
            }
            snapshot.provenance.insert(
                field,
                FieldProvenance {
                    value,
                    source,
                    warnings,
                    alternate_values,
                },
            );
        }

        let locked_fields = merged.locked_fields.as_ref().and_then(Value::as_object);
        let locked_sections = map.get(LOCKED_SECTIONS_KEY).and_then(Value::as_object);
        snapshot.locks = LockSet::from_legacy(locked_fields, locked_sections, registry);

        Ok(snapshot)
    }

    /// Stored rich-content form, including `_lockedFields`
    pub fn to_rich_content(&self) -> Value {
        let mut content = Map::new();

        for (field, value) in &self.values {
            content.insert(
                field.to_string(),
                json!({
                    "value": value.to_json(),
                    "source": Source::UserInput.to_rich(),
                    "warnings": [],
                    "other_values": [],
                }),
            );
        }

        for (field, prov) in &self.provenance {
            let value = self
                .values
                .get(field)
                .map(FieldValue::to_json)
                .unwrap_or(Value::Null);
            let others: Vec<Value> = prov
                .alternate_values
                .iter()
                .map(|alt| json!({"value": alt.value.to_json(), "source": alt.source.to_rich()}))
                .collect();
            content.insert(
                field.to_string(),
                json!({
                    "value": value,
                    "source": prov.source.to_rich(),
                    "warnings": prov.warnings,
                    "other_values": others,
                }),
            );
        }

        content.insert(LOCKED_FIELDS_KEY.to_string(), Value::Object(self.locks.to_legacy()));
        Value::Object(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DataType;

    fn f(id: &str) -> FieldId {
        FieldId::from(id)
    }

    fn cur(n: f64) -> Option<FieldValue> {
        Some(FieldValue::Currency(n))
    }

    #[test]
    fn test_blank_edit_on_untouched_field_stays_white() {
        let mut snapshot = Snapshot::new();
        let effect = snapshot.record_user_edit(&f("a"), Some(FieldValue::Text("  ".into())));

        assert_eq!(effect, EditEffect::Unchanged);
        assert!(snapshot.provenance(&f("a")).is_none());
        assert_eq!(snapshot.classify(&f("a")), FieldState::White);
    }

    #[test]
    fn test_external_value_blocked_by_lock() {
        let mut snapshot = Snapshot::new();
        snapshot.record_user_edit(&f("a"), cur(1.0));
        assert_eq!(snapshot.toggle_field_lock(&f("a")), LockOutcome::Locked);

        assert!(!snapshot.record_external_value(&f("a"), cur(2.0), "doc"));
        assert_eq!(snapshot.value(&f("a")), cur(1.0).as_ref());
    }

    #[test]
    fn test_warnings_defeat_lock() {
        let mut snapshot = Snapshot::new();
        snapshot.record_user_edit(&f("a"), cur(1.0));
        snapshot.toggle_field_lock(&f("a"));
        snapshot.set_warnings(&f("a"), vec!["bad".into()]);

        assert!(!snapshot.is_locked(&f("a")));
        assert_eq!(snapshot.classify(&f("a")), FieldState::Red);
        // The raw flag survives, so clearing warnings re-locks
        assert!(snapshot.record_external_value(&f("a"), cur(3.0), "doc"));
        snapshot.set_warnings(&f("a"), vec![]);
        assert!(snapshot.is_locked(&f("a")));
    }

    #[test]
    fn test_lock_rejections() {
        let mut snapshot = Snapshot::new();
        assert_eq!(
            snapshot.toggle_field_lock(&f("a")),
            LockOutcome::Rejected(LockRejection::EmptyValue)
        );

        snapshot.record_user_edit(&f("a"), cur(1.0));
        snapshot.set_warnings(&f("a"), vec!["bad".into()]);
        assert_eq!(
            snapshot.toggle_field_lock(&f("a")),
            LockOutcome::Rejected(LockRejection::HasWarnings)
        );
    }

    #[test]
    fn test_locked_field_emptied_can_still_unlock() {
        let mut snapshot = Snapshot::new();
        snapshot.record_user_edit(&f("a"), cur(1.0));
        snapshot.toggle_field_lock(&f("a"));
        snapshot.record_user_edit(&f("a"), None);

        assert_eq!(snapshot.toggle_field_lock(&f("a")), LockOutcome::Unlocked);
    }

    #[test]
    fn test_section_lock_soundness() {
        let mut snapshot = Snapshot::new();
        snapshot.record_user_edit(&f("b"), Some(FieldValue::Integer(10)));
        snapshot.record_user_edit(&f("c"), Some(FieldValue::Integer(20)));
        let section = [f("a"), f("b"), f("c")];

        let outcome = snapshot.toggle_section_lock(&section);
        assert_eq!(outcome.locked, vec![f("b"), f("c")]);
        assert_eq!(outcome.skipped, vec![f("a")]);
        assert!(!snapshot.is_locked(&f("a")));
        assert!(snapshot.is_section_locked(&section));

        // Toggling again unlocks the whole section even though A stayed empty
        let outcome = snapshot.toggle_section_lock(&section);
        assert_eq!(outcome.unlocked, vec![f("b"), f("c")]);
        assert!(outcome.locked.is_empty());
        assert!(section.iter().all(|field| !snapshot.is_locked(field)));

        // A is still individually lockable once filled
        snapshot.record_user_edit(&f("a"), Some(FieldValue::Integer(5)));
        assert_eq!(snapshot.toggle_field_lock(&f("a")), LockOutcome::Locked);
    }

    #[test]
    fn test_section_filled_after_lock_locks_remaining() {
        let mut snapshot = Snapshot::new();
        snapshot.record_user_edit(&f("b"), Some(FieldValue::Integer(10)));
        let section = [f("a"), f("b")];
        snapshot.toggle_section_lock(&section);

        // A newly filled field makes the section partially locked again
        snapshot.record_user_edit(&f("a"), Some(FieldValue::Integer(1)));
        assert!(!snapshot.is_section_locked(&section));
        let outcome = snapshot.toggle_section_lock(&section);
        assert_eq!(outcome.locked, vec![f("a")]);
        assert!(snapshot.is_locked(&f("b")));

        let outcome = snapshot.toggle_section_lock(&section);
        assert_eq!(outcome.unlocked, vec![f("a"), f("b")]);
    }

    #[test]
    fn test_section_without_locks_is_not_locked() {
        let snapshot = Snapshot::new();
        assert!(!snapshot.is_section_locked(&[f("a"), f("b")]));
        assert!(!snapshot.is_section_locked(&[]));
    }

    #[test]
    fn test_equality_detects_each_part() {
        let mut base = Snapshot::new();
        base.record_user_edit(&f("a"), cur(1.0));

        let mut changed = base.clone();
        changed.set_warnings(&f("a"), vec!["w".into()]);
        assert_ne!(base, changed);

        let mut changed = base.clone();
        changed.toggle_field_lock(&f("a"));
        assert_ne!(base, changed);

        let mut changed = base.clone();
        changed.record_user_edit(&f("a"), cur(1.0));
        assert_eq!(base, changed);
    }

    #[test]
    fn test_completeness_and_meaningful_content() {
        let registry = FieldRegistry::builder()
            .required_field("a", DataType::Currency)
            .required_field("b", DataType::Text)
            .required_field("c", DataType::Text)
            .field("d", DataType::Text)
            .build()
            .unwrap();

        let mut snapshot = Snapshot::new();
        assert!(!snapshot.has_meaningful_content());
        assert_eq!(snapshot.completeness_percent(&registry), 0);

        snapshot.record_user_edit(&f("a"), cur(1.0));
        snapshot.record_user_edit(&f("d"), Some(FieldValue::Text("x".into())));
        assert!(snapshot.has_meaningful_content());
        assert_eq!(snapshot.completeness_percent(&registry), 33);
    }

    #[test]
    fn test_rich_content_hydration() {
        let registry = FieldRegistry::builder()
            .field("purchasePrice", DataType::Currency)
            .field("name", DataType::Text)
            .field("units", DataType::Integer)
            .section("deal", ["purchasePrice", "units"])
            .build()
            .unwrap();

        let content = json!({
            "purchasePrice": {
                "value": "$500,000",
                "source": [{"type": "document", "name": "appraisal.pdf"}],
                "warnings": [],
                "other_values": [{"value": 450000, "source": "user_input"}]
            },
            "name": "Harbor Lofts",
            "units": {"value": null, "source": "OM.pdf"},
            "unknownField": 3,
            "_lockedSections": {"deal": true},
            "_lockedFields": {"units": false}
        });

        let snapshot = Snapshot::from_rich_content(&content, &registry).unwrap();

        let price = snapshot.provenance(&f("purchasePrice")).unwrap();
        assert_eq!(price.source, Source::external("appraisal.pdf"));
        assert_eq!(price.alternate_values.len(), 1);
        assert_eq!(snapshot.value(&f("purchasePrice")), cur(500000.0).as_ref());
        assert_eq!(snapshot.classify(&f("name")), FieldState::Blue);
        // External proposal without an accepted value
        assert_eq!(snapshot.classify(&f("units")), FieldState::Blue);
        assert!(snapshot.value(&f("units")).is_none());
        assert!(snapshot.locks.is_marked_locked(&f("purchasePrice")));
        assert!(!snapshot.locks.is_marked_locked(&f("units")));

        let back = Snapshot::from_rich_content(&snapshot.to_rich_content(), &registry).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_rich_content_rejects_bad_values() {
        let registry = FieldRegistry::builder()
            .field("units", DataType::Integer)
            .build()
            .unwrap();
        let result = Snapshot::from_rich_content(&json!({"units": "many"}), &registry);
        assert!(matches!(result, Err(DomainError::InvalidValue { .. })));
        assert!(Snapshot::from_rich_content(&json!([]), &registry).is_err());
    }
}
