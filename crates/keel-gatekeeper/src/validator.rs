//! Field consistency rules

use crate::lending::{LOAN_AMOUNT, STABILIZED_VALUE, TARGET_LTC, TARGET_LTV, TOTAL_DEVELOPMENT_COST};
use crate::{GatekeeperError, ValidationConfig};
use async_trait::async_trait;
use keel_domain::value::format_number;
use keel_domain::{
    ConsistencyChecker, DataType, FieldId, FieldProvenance, FieldRegistry, FieldValue, Snapshot,
    Source,
};
use std::fmt;
use std::sync::Arc;

/// Result of checking one field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    /// Problems found, in rule order
    pub issues: Vec<ConsistencyIssue>,
}

impl ValidationResult {
    /// Whether no rule fired
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Human-readable warning strings
    pub fn warnings(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

/// One consistency problem
#[derive(Debug, Clone, PartialEq)]
pub enum ConsistencyIssue {
    /// Value does not match the declared type
    TypeMismatch {
        /// Declared type
        expected: DataType,
        /// Type of the stored value
        found: DataType,
    },

    /// Percentage outside 0-100
    PercentOutOfRange(f64),

    /// Money amount below zero
    NegativeAmount(f64),

    /// Outside configured bounds
    OutOfBounds {
        /// Offending value
        value: f64,
        /// Lower bound, if any
        min: Option<f64>,
        /// Upper bound, if any
        max: Option<f64>,
    },

    /// Loan-to-value above policy
    LtvExceedsPolicy {
        /// Actual LTV
        ltv: f64,
        /// Policy maximum
        max: f64,
    },

    /// Loan-to-cost above policy
    LtcExceedsPolicy {
        /// Actual LTC
        ltc: f64,
        /// Policy maximum
        max: f64,
    },

    /// Loan larger than stabilized value times max LTV
    LoanExceedsValueLimit {
        /// Requested loan
        loan: f64,
        /// Largest loan the value supports
        limit: f64,
    },

    /// Loan larger than total cost times max LTC
    LoanExceedsCostLimit {
        /// Requested loan
        loan: f64,
        /// Largest loan the cost supports
        limit: f64,
    },

    /// User value differs from what an external source proposed
    Divergence {
        /// Source of the proposal
        source: Source,
        /// Proposed value
        proposed: FieldValue,
    },
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyIssue::TypeMismatch { expected, found } => {
                write!(f, "Expected a {} value, got {}", expected, found)
            }
            ConsistencyIssue::PercentOutOfRange(v) => {
                write!(f, "Percentage {}% must be between 0% and 100%", format_number(*v))
            }
            ConsistencyIssue::NegativeAmount(v) => {
                write!(f, "Amount {} cannot be negative", format_number(*v))
            }
            ConsistencyIssue::OutOfBounds { value, min, max } => {
                let bound = |b: &Option<f64>| b.map(format_number).unwrap_or_else(|| "any".into());
                write!(
                    f,
                    "Value {} is outside the allowed range {} to {}",
                    format_number(*value),
                    bound(min),
                    bound(max)
                )
            }
            ConsistencyIssue::LtvExceedsPolicy { ltv, max } => write!(
                f,
                "LTV {}% exceeds policy max {}%",
                format_number(*ltv),
                format_number(*max)
            ),
            ConsistencyIssue::LtcExceedsPolicy { ltc, max } => write!(
                f,
                "LTC {}% exceeds policy max {}%",
                format_number(*ltc),
                format_number(*max)
            ),
            ConsistencyIssue::LoanExceedsValueLimit { loan, limit } => write!(
                f,
                "Loan amount ${} exceeds stabilized value times max LTV (${})",
                format_number(*loan),
                format_number(*limit)
            ),
            ConsistencyIssue::LoanExceedsCostLimit { loan, limit } => write!(
                f,
                "Loan amount ${} exceeds total development cost times max LTC (${})",
                format_number(*loan),
                format_number(*limit)
            ),
            ConsistencyIssue::Divergence { source, proposed } => {
                write!(f, "Differs from {} value {}", source, proposed)
            }
        }
    }
}

/// The Gatekeeper checks field values before they are trusted
pub struct Gatekeeper {
    config: ValidationConfig,
    registry: Arc<FieldRegistry>,
}

impl Gatekeeper {
    /// Create a new Gatekeeper with the given configuration
    pub fn new(config: ValidationConfig, registry: Arc<FieldRegistry>) -> Self {
        Self { config, registry }
    }

    /// Create a Gatekeeper with default configuration
    pub fn default_config(registry: Arc<FieldRegistry>) -> Self {
        Self::new(ValidationConfig::default(), registry)
    }

    /// Active configuration
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Check one field against the configured rules
    ///
    /// # Arguments
    ///
    /// * `field` - The field being checked
    /// * `value` - Its current value (`None` when blank)
    /// * `record` - The whole record, for cross-field rules
    /// * `existing` - The field's provenance entry, for divergence checks
    pub fn validate(
        &self,
        field: &FieldId,
        value: Option<&FieldValue>,
        record: &Snapshot,
        existing: Option<&FieldProvenance>,
    ) -> Result<ValidationResult, GatekeeperError> {
        let data_type = self
            .registry
            .data_type(field)
            .ok_or_else(|| GatekeeperError::UnknownField(field.to_string()))?;

        let mut issues = Vec::new();
        let Some(value) = value.filter(|v| !v.is_blank()) else {
            return Ok(ValidationResult { issues });
        };

        // 1. Declared type
        if self.config.validate_types && value.data_type() != data_type {
            issues.push(ConsistencyIssue::TypeMismatch {
                expected: data_type,
                found: value.data_type(),
            });
            return Ok(ValidationResult { issues });
        }

        // 2. Ranges
        if self.config.validate_ranges {
            self.check_ranges(field, value, &mut issues);
        }

        // 3. Lending policy
        if self.config.validate_policy {
            self.check_policy(field, value, record, &mut issues);
        }

        // 4. Divergence from external proposals
        if self.config.validate_divergence {
            if let Some(issue) = self.check_divergence(value, existing) {
                issues.push(issue);
            }
        }

        Ok(ValidationResult { issues })
    }

    fn check_ranges(&self, field: &FieldId, value: &FieldValue, issues: &mut Vec<ConsistencyIssue>) {
        match value {
            FieldValue::Percent(p) if !(0.0..=100.0).contains(p) => {
                issues.push(ConsistencyIssue::PercentOutOfRange(*p));
            }
            FieldValue::Currency(c) if *c < 0.0 => {
                issues.push(ConsistencyIssue::NegativeAmount(*c));
            }
            _ => {}
        }

        if let (Some(bounds), Some(n)) = (self.config.field_bounds.get(field), value.as_f64()) {
            if !bounds.contains(n) {
                issues.push(ConsistencyIssue::OutOfBounds {
                    value: n,
                    min: bounds.min,
                    max: bounds.max,
                });
            }
        }
    }

    fn check_policy(
        &self,
        field: &FieldId,
        value: &FieldValue,
        record: &Snapshot,
        issues: &mut Vec<ConsistencyIssue>,
    ) {
        let Some(n) = value.as_f64() else {
            return;
        };
        let number = |id: &str| record.value(&FieldId::from(id)).and_then(FieldValue::as_f64);
        let max_ltv = self.config.max_ltv_percent;
        let max_ltc = self.config.max_ltc_percent;

        match field.as_str() {
            TARGET_LTV if n > max_ltv => {
                issues.push(ConsistencyIssue::LtvExceedsPolicy { ltv: n, max: max_ltv });
            }
            TARGET_LTC if n > max_ltc => {
                issues.push(ConsistencyIssue::LtcExceedsPolicy { ltc: n, max: max_ltc });
            }
            LOAN_AMOUNT => {
                if let Some(stabilized) = number(STABILIZED_VALUE) {
                    let limit = stabilized * max_ltv / 100.0;
                    if n > limit {
                        issues.push(ConsistencyIssue::LoanExceedsValueLimit { loan: n, limit });
                    }
                }
                if let Some(cost) = number(TOTAL_DEVELOPMENT_COST) {
                    let limit = cost * max_ltc / 100.0;
                    if n > limit {
                        issues.push(ConsistencyIssue::LoanExceedsCostLimit { loan: n, limit });
                    }
                }
            }
            _ => {}
        }
    }

    fn check_divergence(
        &self,
        value: &FieldValue,
        existing: Option<&FieldProvenance>,
    ) -> Option<ConsistencyIssue> {
        let prov = existing.filter(|p| p.source.is_user())?;
        let alternate = prov
            .alternate_values
            .iter()
            .rev()
            .find(|alt| !alt.source.is_user())?;
        (alternate.value != *value).then(|| ConsistencyIssue::Divergence {
            source: alternate.source.clone(),
            proposed: alternate.value.clone(),
        })
    }
}

#[async_trait]
impl ConsistencyChecker for Gatekeeper {
    type Error = GatekeeperError;

    async fn check(
        &self,
        field: &FieldId,
        value: Option<&FieldValue>,
        record: &Snapshot,
        existing: Option<&FieldProvenance>,
    ) -> Result<Vec<String>, Self::Error> {
        Ok(self.validate(field, value, record, existing)?.warnings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lending::{lending_registry, PURCHASE_PRICE};

    fn gatekeeper(config: ValidationConfig) -> Gatekeeper {
        Gatekeeper::new(config, Arc::new(lending_registry().unwrap()))
    }

    fn f(id: &str) -> FieldId {
        FieldId::from(id)
    }

    fn check(gk: &Gatekeeper, record: &Snapshot, id: &str) -> ValidationResult {
        let field = f(id);
        gk.validate(&field, record.value(&field), record, record.provenance(&field))
            .unwrap()
    }

    #[test]
    fn test_clean_value() {
        let gk = gatekeeper(ValidationConfig::default());
        let mut record = Snapshot::new();
        record.record_user_edit(&f(TARGET_LTV), Some(FieldValue::Percent(50.0)));

        assert!(check(&gk, &record, TARGET_LTV).is_clean());
    }

    #[test]
    fn test_ltv_policy_message() {
        let gk = gatekeeper(ValidationConfig::default());
        let mut record = Snapshot::new();
        record.record_user_edit(&f(TARGET_LTV), Some(FieldValue::Percent(90.0)));

        let result = check(&gk, &record, TARGET_LTV);
        assert_eq!(result.warnings(), vec!["LTV 90% exceeds policy max 80%".to_string()]);
    }

    #[test]
    fn test_loan_limit_uses_context() {
        let gk = gatekeeper(ValidationConfig::default());
        let mut record = Snapshot::new();
        record.record_user_edit(&f(LOAN_AMOUNT), Some(FieldValue::Currency(1_800_000.0)));
        assert!(check(&gk, &record, LOAN_AMOUNT).is_clean());

        record.record_external_value(
            &f(STABILIZED_VALUE),
            Some(FieldValue::Currency(2_000_000.0)),
            "appraisal.pdf",
        );
        let result = check(&gk, &record, LOAN_AMOUNT);
        match &result.issues[..] {
            [ConsistencyIssue::LoanExceedsValueLimit { loan, limit }] => {
                assert_eq!(*loan, 1_800_000.0);
                assert_eq!(*limit, 1_600_000.0);
            }
            other => panic!("Expected LoanExceedsValueLimit, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch_stops_other_rules() {
        let gk = gatekeeper(ValidationConfig::default());
        let mut record = Snapshot::new();
        record.record_user_edit(&f(TARGET_LTV), Some(FieldValue::Text("high".into())));

        let result = check(&gk, &record, TARGET_LTV);
        assert_eq!(result.issues.len(), 1);
        assert!(matches!(result.issues[0], ConsistencyIssue::TypeMismatch { .. }));
    }

    #[test]
    fn test_ranges() {
        let gk = gatekeeper(ValidationConfig::default());
        let mut record = Snapshot::new();
        record.record_user_edit(&f("interestRate"), Some(FieldValue::Percent(140.0)));
        record.record_user_edit(&f(PURCHASE_PRICE), Some(FieldValue::Currency(-5.0)));

        assert!(matches!(
            check(&gk, &record, "interestRate").issues[..],
            [ConsistencyIssue::PercentOutOfRange(_)]
        ));
        assert!(matches!(
            check(&gk, &record, PURCHASE_PRICE).issues[..],
            [ConsistencyIssue::NegativeAmount(_)]
        ));
    }

    #[test]
    fn test_permissive_config() {
        let gk = gatekeeper(ValidationConfig::permissive());
        let mut record = Snapshot::new();
        record.record_user_edit(&f(TARGET_LTV), Some(FieldValue::Percent(140.0)));

        assert!(check(&gk, &record, TARGET_LTV).is_clean());
    }

    #[test]
    fn test_divergence_cleared_by_revert() {
        let gk = gatekeeper(ValidationConfig::strict());
        let mut record = Snapshot::new();
        let price = f(PURCHASE_PRICE);
        record.record_external_value(&price, Some(FieldValue::Currency(500000.0)), "doc");
        record.record_user_edit(&price, Some(FieldValue::Currency(600000.0)));

        let warnings = check(&gk, &record, PURCHASE_PRICE).warnings();
        assert_eq!(warnings, vec!["Differs from doc value $500000".to_string()]);

        record.record_user_edit(&price, Some(FieldValue::Currency(500000.0)));
        assert!(check(&gk, &record, PURCHASE_PRICE).is_clean());
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        let gk = gatekeeper(ValidationConfig::default());
        let record = Snapshot::new();
        let result = gk.validate(&f("nope"), Some(&FieldValue::Integer(1)), &record, None);
        assert!(matches!(result, Err(GatekeeperError::UnknownField(_))));
    }

    #[test]
    fn test_blank_value_has_no_issues() {
        let gk = gatekeeper(ValidationConfig::strict());
        let record = Snapshot::new();
        assert!(check(&gk, &record, LOAN_AMOUNT).is_clean());
    }

    #[tokio::test]
    async fn test_consistency_checker_impl() {
        let gk = gatekeeper(ValidationConfig::default());
        let mut record = Snapshot::new();
        let ltc = f(TARGET_LTC);
        record.record_user_edit(&ltc, Some(FieldValue::Percent(95.0)));

        let warnings = gk
            .check(&ltc, record.value(&ltc), &record, record.provenance(&ltc))
            .await
            .unwrap();
        assert_eq!(warnings, vec!["LTC 95% exceeds policy max 85%".to_string()]);
    }
}
