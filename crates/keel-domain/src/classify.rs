//! Field state classifier
//!
//! The four display states partition every field. The same decision table
//! gates locking and drives revalidation, so it lives in the domain rather
//! than the UI.

use crate::provenance::FieldProvenance;
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display state of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    /// No value and no provenance
    White,
    /// Has a value, or a proposal from an external source
    Blue,
    /// Locked and warning-free
    Green,
    /// Has active warnings
    Red,
}

impl FieldState {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldState::White => "white",
            FieldState::Blue => "blue",
            FieldState::Green => "green",
            FieldState::Red => "red",
        }
    }

    /// Short description of what the state means
    pub fn meaning(&self) -> &'static str {
        match self {
            FieldState::White => "empty",
            FieldState::Blue => "filled",
            FieldState::Green => "locked",
            FieldState::Red => "needs attention",
        }
    }
}

impl fmt::Display for FieldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify one field
///
/// `lock_marked` is the raw lock flag; active warnings override it.
///
/// # Examples
///
/// ```
/// use keel_domain::{classify, FieldProvenance, FieldState, FieldValue};
///
/// let value = FieldValue::Percent(90.0);
/// let mut prov = FieldProvenance::user(Some(value.clone()));
/// prov.warnings.push("LTV 90% exceeds policy max 80%".into());
///
/// assert_eq!(classify(Some(&value), Some(&prov), true), FieldState::Red);
/// assert_eq!(classify(None, None, false), FieldState::White);
/// ```
pub fn classify(
    value: Option<&FieldValue>,
    provenance: Option<&FieldProvenance>,
    lock_marked: bool,
) -> FieldState {
    let has_warnings = provenance.is_some_and(FieldProvenance::has_warnings);
    let locked = lock_marked && !has_warnings;
    let has_value = value.is_some_and(|v| !v.is_blank());

    if has_warnings {
        FieldState::Red
    } else if locked {
        FieldState::Green
    } else if has_value || provenance.is_some() {
        FieldState::Blue
    } else {
        FieldState::White
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn value_strategy() -> impl Strategy<Value = Option<FieldValue>> {
        prop_oneof![
            Just(None),
            Just(Some(FieldValue::Text(String::new()))),
            "[a-z ]{0,6}".prop_map(|s| Some(FieldValue::Text(s))),
            (-1e7f64..1e7).prop_map(|n| Some(FieldValue::Currency(n))),
            any::<bool>().prop_map(|b| Some(FieldValue::Boolean(b))),
        ]
    }

    proptest! {
        /// Property: exactly one state holds for every combination
        #[test]
        fn test_states_partition(
            value in value_strategy(),
            has_provenance: bool,
            warnings in proptest::collection::vec("[a-z]{1,5}", 0..3),
            lock_marked: bool,
        ) {
            let provenance = has_provenance.then(|| {
                let mut p = FieldProvenance::user(value.clone());
                p.warnings = warnings.clone();
                p
            });
            let has_warnings = provenance.as_ref().is_some_and(|p| !p.warnings.is_empty());
            let locked = lock_marked && !has_warnings;
            let non_blank = value.as_ref().is_some_and(|v| !v.is_blank());

            let red = has_warnings && !locked;
            let green = locked;
            let blue = (non_blank || provenance.is_some()) && !locked && !has_warnings;
            let white = !non_blank && provenance.is_none() && !locked;

            let matches = [red, green, blue, white].iter().filter(|b| **b).count();
            prop_assert_eq!(matches, 1);

            let state = classify(value.as_ref(), provenance.as_ref(), lock_marked);
            let expected = if red {
                FieldState::Red
            } else if green {
                FieldState::Green
            } else if blue {
                FieldState::Blue
            } else {
                FieldState::White
            };
            prop_assert_eq!(state, expected);
        }

        /// Property: a field reading as locked never carries warnings
        #[test]
        fn test_green_is_warning_free(
            warnings in proptest::collection::vec("[a-z]{1,5}", 0..3),
            lock_marked: bool,
        ) {
            let mut p = FieldProvenance::user(Some(FieldValue::Integer(1)));
            p.warnings = warnings;
            let state = classify(p.value.as_ref(), Some(&p), lock_marked);
            if state == FieldState::Green {
                prop_assert!(p.warnings.is_empty());
            }
        }
    }
}
