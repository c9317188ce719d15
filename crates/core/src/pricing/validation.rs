//! Submission gate: every reason an order cannot be placed, reported together.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::customer::CustomerDetails;
use crate::pricing::boxes::{BoxShortfall, PackingGroupKey};
use crate::pricing::PricedOrder;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    EmptySelection,
    IncompleteBox,
    MissingCustomerCode,
    MissingZone,
    InvalidTaxId,
}

impl ViolationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptySelection => "EMPTY_SELECTION",
            Self::IncompleteBox => "INCOMPLETE_BOX",
            Self::MissingCustomerCode => "MISSING_CUSTOMER_CODE",
            Self::MissingZone => "MISSING_ZONE",
            Self::InvalidTaxId => "INVALID_TAX_ID",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionViolation {
    pub code: ViolationCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<PackingGroupKey>,
}

impl SubmissionViolation {
    pub fn empty_selection() -> Self {
        Self {
            code: ViolationCode::EmptySelection,
            message: "the order has no products with a positive quantity".to_string(),
            suggestion: Some("select at least one product".to_string()),
            group: None,
        }
    }

    pub fn incomplete_box(shortfall: &BoxShortfall) -> Self {
        Self {
            code: ViolationCode::IncompleteBox,
            message: format!(
                "{}: {} units do not fill boxes of {}",
                shortfall.label, shortfall.total, shortfall.box_size
            ),
            suggestion: Some(format!("add {} more units to complete the box", shortfall.missing)),
            group: Some(shortfall.group.clone()),
        }
    }

    fn customer(code: ViolationCode, message: &str) -> Self {
        Self { code, message: message.to_string(), suggestion: None, group: None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("order cannot be submitted: {}", summarize(.violations))]
pub struct SubmissionError {
    pub violations: Vec<SubmissionViolation>,
}

fn summarize(violations: &[SubmissionViolation]) -> String {
    violations
        .iter()
        .map(|violation| format!("[{}] {}", violation.code.as_str(), violation.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Advisory notes attached to a priced order. They never block submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderWarning {
    BelowMinimumOrder { minimum: Decimal, missing: Decimal },
}

/// Subtotal before tax under `minimum` yields a warning naming the gap.
pub fn minimum_order_warning(subtotal: Decimal, minimum: Decimal) -> Option<OrderWarning> {
    (subtotal < minimum)
        .then(|| OrderWarning::BelowMinimumOrder { minimum, missing: minimum - subtotal })
}

/// Collects every blocking problem with the priced order and its header fields.
pub fn validate_submission(
    priced: &PricedOrder,
    customer: &CustomerDetails,
    zone: &str,
) -> Result<(), SubmissionError> {
    let mut violations = Vec::new();

    if priced.lines.is_empty() {
        violations.push(SubmissionViolation::empty_selection());
    }
    violations.extend(priced.box_shortfalls.iter().map(SubmissionViolation::incomplete_box));

    if customer.code.trim().is_empty() {
        violations.push(SubmissionViolation::customer(
            ViolationCode::MissingCustomerCode,
            "customer code is required",
        ));
    }
    if zone.trim().is_empty() {
        violations.push(SubmissionViolation::customer(ViolationCode::MissingZone, "zone is required"));
    }
    if let Some(tax_id) = customer.tax_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        if !is_valid_tax_id(tax_id) {
            violations.push(SubmissionViolation::customer(
                ViolationCode::InvalidTaxId,
                &format!("tax id `{tax_id}` is not a valid CIF/NIF"),
            ));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(SubmissionError { violations })
    }
}

pub fn is_valid_tax_id(raw: &str) -> bool {
    static PATTERNS: OnceLock<Option<[Regex; 2]>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        let cif = Regex::new(r"^[A-Za-z]\d{7,8}[A-Za-z0-9]?$").ok()?;
        let nif = Regex::new(r"^\d{8}[A-Za-z]$").ok()?;
        Some([cif, nif])
    });

    patterns.as_ref().is_some_and(|patterns| patterns.iter().any(|pattern| pattern.is_match(raw)))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        is_valid_tax_id, minimum_order_warning, validate_submission, OrderWarning, ViolationCode,
    };
    use crate::catalog::Catalog;
    use crate::domain::customer::CustomerDetails;
    use crate::domain::product::{Product, ProductCode};
    use crate::domain::selection::Selection;
    use crate::pricing::{DeterministicPricingEngine, PricingEngine};

    fn product(code: &str, category: &str, box_size: u32) -> Product {
        Product {
            code: ProductCode::from(code),
            ean: None,
            name: format!("Producto {code}"),
            category: Some(category.to_string()),
            packing_category: None,
            box_size: Some(box_size),
            list_price: Decimal::new(250, 2),
            recommended_price: None,
            offer: None,
        }
    }

    #[test]
    fn reports_every_violation_at_once() {
        let catalog = Catalog::new(vec![
            product("JAB-1", "JABONES", 12),
            product("JAB-2", "JABONES", 12),
        ]);
        let selection = Selection::new().with("JAB-1", 5).with("JAB-2", 7);
        let priced = DeterministicPricingEngine::standard().price(&catalog, &selection);
        let customer = CustomerDetails { code: " ".to_string(), name: None, tax_id: Some("XYZ".into()) };

        let error = validate_submission(&priced, &customer, "").expect_err("must be blocked");
        let codes: Vec<ViolationCode> = error.violations.iter().map(|v| v.code).collect();

        assert_eq!(
            codes,
            vec![
                ViolationCode::IncompleteBox,
                ViolationCode::IncompleteBox,
                ViolationCode::MissingCustomerCode,
                ViolationCode::MissingZone,
                ViolationCode::InvalidTaxId,
            ]
        );
        assert!(error.to_string().contains("INCOMPLETE_BOX"));
        assert_eq!(error.violations[0].suggestion.as_deref(), Some("add 7 more units to complete the box"));
    }

    #[test]
    fn empty_selection_blocks_submission() {
        let priced = DeterministicPricingEngine::standard().price(&Catalog::default(), &Selection::new());
        let error = validate_submission(&priced, &CustomerDetails::new("FARM001"), "MURCIA")
            .expect_err("empty order");
        assert_eq!(error.violations.len(), 1);
        assert_eq!(error.violations[0].code, ViolationCode::EmptySelection);
    }

    #[test]
    fn complete_order_passes() {
        let catalog = Catalog::new(vec![product("JAB-1", "JABONES", 12)]);
        let priced = DeterministicPricingEngine::standard()
            .price(&catalog, &Selection::new().with("JAB-1", 24));
        let customer = CustomerDetails {
            code: "FARM001".to_string(),
            name: Some("Farmacia Centro".to_string()),
            tax_id: Some("B12345678".to_string()),
        };

        assert!(validate_submission(&priced, &customer, "MURCIA").is_ok());
    }

    #[test]
    fn tax_id_formats() {
        for valid in ["B12345678", "b1234567", "A1234567J", "12345678Z"] {
            assert!(is_valid_tax_id(valid), "{valid} should be accepted");
        }
        for invalid in ["", "1234567Z", "BB1234567", "12345678", "B123456789X"] {
            assert!(!is_valid_tax_id(invalid), "{invalid} should be rejected");
        }
    }

    #[test]
    fn minimum_order_is_advisory() {
        assert_eq!(
            minimum_order_warning(Decimal::new(12000, 2), Decimal::new(150, 0)),
            Some(OrderWarning::BelowMinimumOrder {
                minimum: Decimal::new(150, 0),
                missing: Decimal::new(3000, 2),
            })
        );
        assert_eq!(minimum_order_warning(Decimal::new(150, 0), Decimal::new(150, 0)), None);
    }
}
