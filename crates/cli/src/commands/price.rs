use std::fs;
use std::path::Path;

use orderdesk_core::pricing::validation::ViolationCode;
use orderdesk_core::{
    validate_submission, CustomerDetails, DeterministicPricingEngine, PricedOrder, PricingEngine,
    Selection, SubmissionViolation,
};
use serde::Serialize;

use crate::commands::seed::read_catalog;
use crate::commands::{load_config, CommandResult};

#[derive(Debug, Default)]
pub struct PriceOptions<'a> {
    pub customer: Option<&'a str>,
    pub zone: Option<&'a str>,
    pub strict: bool,
}

#[derive(Debug, Serialize)]
struct PriceReport {
    command: &'static str,
    status: &'static str,
    priced: PricedOrder,
    violations: Vec<SubmissionViolation>,
}

/// Prices a selection file offline against a catalog file.
pub fn run(
    catalog_path: &Path,
    selection_path: &Path,
    options: PriceOptions<'_>,
) -> CommandResult {
    let catalog = match read_catalog(catalog_path) {
        Ok(catalog) => catalog,
        Err(message) => return CommandResult::failure("price", "catalog_input", message, 6),
    };
    let selection = match read_selection(selection_path) {
        Ok(selection) => selection,
        Err(message) => return CommandResult::failure("price", "selection_input", message, 6),
    };
    let config = match load_config("price") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let engine = DeterministicPricingEngine::standard()
        .with_minimum_order_amount(config.pricing.minimum_order_amount);
    let priced = engine.price(&catalog, &selection);
    let violations = submission_violations(&priced, &options);

    let blocked = options.strict && !violations.is_empty();
    let report = PriceReport {
        command: "price",
        status: if blocked { "blocked" } else { "ok" },
        priced,
        violations,
    };

    match serde_json::to_string_pretty(&report) {
        Ok(output) => CommandResult { exit_code: u8::from(blocked), output },
        Err(error) => CommandResult::failure(
            "price",
            "serialization",
            format!("failed to render priced order: {error}"),
            7,
        ),
    }
}

fn read_selection(path: &Path) -> Result<Selection, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("failed to read selection `{}`: {error}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|error| format!("selection `{}` is not valid: {error}", path.display()))
}

/// Header checks only apply when a customer or zone was given on the command line.
fn submission_violations(
    priced: &PricedOrder,
    options: &PriceOptions<'_>,
) -> Vec<SubmissionViolation> {
    let header_given = options.customer.is_some() || options.zone.is_some();
    let customer = CustomerDetails::new(options.customer.unwrap_or_default());
    let zone = options.zone.unwrap_or_default();

    match validate_submission(priced, &customer, zone) {
        Ok(()) => Vec::new(),
        Err(error) => error
            .violations
            .into_iter()
            .filter(|violation| {
                header_given
                    || matches!(
                        violation.code,
                        ViolationCode::EmptySelection | ViolationCode::IncompleteBox
                    )
            })
            .collect(),
    }
}
