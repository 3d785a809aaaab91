//! Per-field provenance
//!
//! Each touched field records where its current value came from, the
//! consistency warnings currently raised against it and the values other
//! sources proposed before being displaced.

use crate::source::Source;
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};

/// A value seen from a source that is no longer current
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternateValue {
    /// The displaced value
    pub value: FieldValue,
    /// Where it came from
    pub source: Source,
}

/// Provenance entry for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProvenance {
    /// Last value observed for the field
    pub value: Option<FieldValue>,
    /// Current source
    pub source: Source,
    /// Active consistency-violation messages, in order
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Values seen from non-current sources, deduplicated by (value, source)
    #[serde(default)]
    pub alternate_values: Vec<AlternateValue>,
}

/// What a user edit did to a field's provenance
#[derive(Debug, Clone, PartialEq)]
pub enum EditEffect {
    /// First touch: a user-input entry was created
    Created,
    /// An external value was displaced into the alternates
    SourceChanged {
        /// Source that was current before the edit
        previous: Source,
    },
    /// The user retyped a value an external source had proposed
    Reverted {
        /// Source that became current again
        restored: Source,
    },
    /// A user-input value was updated
    ValueUpdated,
    /// Nothing changed
    Unchanged,
}

impl FieldProvenance {
    /// Entry for a value typed by the user
    pub fn user(value: Option<FieldValue>) -> Self {
        Self {
            value,
            source: Source::UserInput,
            warnings: Vec::new(),
            alternate_values: Vec::new(),
        }
    }

    /// Entry for a value supplied by an external source
    pub fn external(value: Option<FieldValue>, source_id: impl Into<String>) -> Self {
        Self {
            value,
            source: Source::External(source_id.into()),
            warnings: Vec::new(),
            alternate_values: Vec::new(),
        }
    }

    /// Whether any warning is active
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Replace the warnings, returning whether they changed
    pub fn set_warnings(&mut self, warnings: Vec<String>) -> bool {
        if self.warnings == warnings {
            return false;
        }
        self.warnings = warnings;
        true
    }

    /// Apply a user edit
    ///
    /// 1. Retyping the current external value just claims it as user input.
    /// 2. Retyping a value an external source proposed earlier restores that
    ///    source and drops the alternate; a current external proposal is
    ///    kept as an alternate in its place.
    /// 3. Overwriting an external value moves it into the alternates.
    /// 4. Otherwise the user-input value is updated in place.
    ///
    /// # Examples
    ///
    /// ```
    /// use keel_domain::{EditEffect, FieldProvenance, FieldValue, Source};
    ///
    /// let mut prov = FieldProvenance::external(Some(FieldValue::Currency(500000.0)), "doc");
    /// prov.record_user_edit(Some(FieldValue::Currency(600000.0)));
    /// assert_eq!(prov.source, Source::UserInput);
    ///
    /// let effect = prov.record_user_edit(Some(FieldValue::Currency(500000.0)));
    /// assert_eq!(effect, EditEffect::Reverted { restored: Source::external("doc") });
    /// assert!(prov.alternate_values.is_empty());
    /// ```
    pub fn record_user_edit(&mut self, new_value: Option<FieldValue>) -> EditEffect {
        if !self.source.is_user() && self.value == new_value {
            let previous = std::mem::replace(&mut self.source, Source::UserInput);
            return EditEffect::SourceChanged { previous };
        }

        if let Some(value) = &new_value {
            if let Some(index) = self
                .alternate_values
                .iter()
                .rposition(|alt| !alt.source.is_user() && &alt.value == value)
            {
                let restored = self.alternate_values.remove(index);
                let displaced_source = std::mem::replace(&mut self.source, restored.source.clone());
                let displaced = std::mem::replace(&mut self.value, Some(restored.value));
                if let (Some(value), false) = (displaced, displaced_source.is_user()) {
                    self.push_alternate(value, displaced_source);
                }
                return EditEffect::Reverted {
                    restored: restored.source,
                };
            }
        }

        if !self.source.is_user() {
            let previous = std::mem::replace(&mut self.source, Source::UserInput);
            let displaced = std::mem::replace(&mut self.value, new_value);
            if let Some(value) = displaced {
                self.push_alternate(value, previous.clone());
            }
            return EditEffect::SourceChanged { previous };
        }

        if self.value == new_value {
            return EditEffect::Unchanged;
        }
        self.value = new_value;
        EditEffect::ValueUpdated
    }

    /// Apply a value from an external source
    ///
    /// The displaced (value, source) pair is kept as an alternate whatever its
    /// source, so a user value overwritten by autofill is not lost.
    pub fn record_external(&mut self, value: Option<FieldValue>, source: Source) {
        if self.value == value && self.source == source {
            return;
        }
        let previous_source = std::mem::replace(&mut self.source, source);
        let displaced = std::mem::replace(&mut self.value, value);
        if let Some(old) = displaced {
            self.push_alternate(old, previous_source);
        }
        let (current_value, current_source) = (&self.value, &self.source);
        self.alternate_values
            .retain(|alt| Some(&alt.value) != current_value.as_ref() || &alt.source != current_source);
    }

    fn push_alternate(&mut self, value: FieldValue, source: Source) {
        if self.value.as_ref() == Some(&value) {
            return;
        }
        let exists = self
            .alternate_values
            .iter()
            .any(|alt| alt.value == value && alt.source == source);
        if !exists {
            self.alternate_values.push(AlternateValue { value, source });
        }
    }
}
