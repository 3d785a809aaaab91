//! Reference lending registry
//!
//! Field ids, sections, dependency graph and derived ratios of the project
//! resume used by the lending policy checks.

use keel_domain::{DataType, DerivedField, DomainError, FieldRegistry};

/// Requested loan amount
pub const LOAN_AMOUNT: &str = "loanAmountRequested";
/// Stabilized (as-complete) property value
pub const STABILIZED_VALUE: &str = "stabilizedValue";
/// Total development cost
pub const TOTAL_DEVELOPMENT_COST: &str = "totalDevelopmentCost";
/// Loan-to-value, percent
pub const TARGET_LTV: &str = "targetLtvPercent";
/// Loan-to-cost, percent
pub const TARGET_LTC: &str = "targetLtcPercent";
/// Acquisition price
pub const PURCHASE_PRICE: &str = "purchasePrice";

/// Build the project-resume registry
///
/// ```
/// use keel_gatekeeper::lending;
///
/// let registry = lending::lending_registry().unwrap();
/// let deps = registry.dependents(&lending::LOAN_AMOUNT.into());
/// assert!(deps.iter().any(|f| f.as_str() == lending::TARGET_LTV));
/// ```
pub fn lending_registry() -> Result<FieldRegistry, DomainError> {
    FieldRegistry::builder()
        // basic info
        .required_field("projectName", DataType::Text)
        .required_field("propertyAddress", DataType::Text)
        .required_field("assetType", DataType::Choice)
        .field("dealStatus", DataType::Choice)
        .field("projectDescription", DataType::Text)
        // loan
        .required_field(LOAN_AMOUNT, DataType::Currency)
        .field(TARGET_LTV, DataType::Percent)
        .field(TARGET_LTC, DataType::Percent)
        .field("interestRate", DataType::Percent)
        .field("loanTermMonths", DataType::Integer)
        .field("recourse", DataType::Boolean)
        // financials
        .field(PURCHASE_PRICE, DataType::Currency)
        .required_field(TOTAL_DEVELOPMENT_COST, DataType::Currency)
        .field(STABILIZED_VALUE, DataType::Currency)
        // property
        .field("totalUnits", DataType::Integer)
        .field("unitMix", DataType::Table)
        .field("closingDate", DataType::Date)
        // sponsor
        .field("sponsorExperience", DataType::Text)
        .field("sponsorTrackRecord", DataType::FreeForm)
        .section(
            "basic-info",
            ["projectName", "propertyAddress", "assetType", "dealStatus", "projectDescription"],
        )
        .section(
            "loan-info",
            [LOAN_AMOUNT, TARGET_LTV, TARGET_LTC, "interestRate", "loanTermMonths", "recourse"],
        )
        .section(
            "financials",
            [PURCHASE_PRICE, TOTAL_DEVELOPMENT_COST, STABILIZED_VALUE],
        )
        .section("property", ["totalUnits", "unitMix", "closingDate"])
        .section("sponsor", ["sponsorExperience", "sponsorTrackRecord"])
        .depends(LOAN_AMOUNT, [TARGET_LTV, TARGET_LTC])
        .depends(STABILIZED_VALUE, [TARGET_LTV, LOAN_AMOUNT])
        .depends(TOTAL_DEVELOPMENT_COST, [TARGET_LTC])
        .depends(TARGET_LTV, [LOAN_AMOUNT, STABILIZED_VALUE])
        .depends(TARGET_LTC, [LOAN_AMOUNT, TOTAL_DEVELOPMENT_COST])
        .depends(PURCHASE_PRICE, [TOTAL_DEVELOPMENT_COST])
        .derived(DerivedField::ratio(TARGET_LTV, LOAN_AMOUNT, STABILIZED_VALUE))
        .derived(DerivedField::ratio(TARGET_LTC, LOAN_AMOUNT, TOTAL_DEVELOPMENT_COST))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_domain::FieldId;

    #[test]
    fn test_registry_builds() {
        let registry = lending_registry().unwrap();
        assert_eq!(registry.sections().len(), 5);
        assert_eq!(registry.derived().len(), 2);
        assert_eq!(registry.required_fields().count(), 5);
    }

    #[test]
    fn test_loan_change_reaches_ltc_inputs() {
        let registry = lending_registry().unwrap();
        let reached = registry.transitive_dependents(&FieldId::from(LOAN_AMOUNT));

        assert_eq!(reached[0].as_str(), TARGET_LTV);
        assert!(reached.iter().any(|f| f.as_str() == TOTAL_DEVELOPMENT_COST));
        assert!(!reached.iter().any(|f| f.as_str() == LOAN_AMOUNT));
    }
}
