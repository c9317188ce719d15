//! Order pricing: tier lookup, category pooling, box checks, the 2x1 promotion
//! and totals, composed by [`DeterministicPricingEngine`].

pub mod aggregate;
pub mod boxes;
pub mod promo;
pub mod tiers;
pub mod totals;
pub mod unit;
pub mod validation;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::domain::order::{OrderLine, OrderTotals};
use crate::domain::selection::Selection;

pub use aggregate::{aggregate, CategoryTotals};
pub use boxes::{check_boxes, BoxPolicy, BoxShortfall, BoxShortfalls, PackingGroupKey};
pub use promo::two_for_one_discount;
pub use tiers::{CategoryKey, PriceTier, TierResolver, TierTable};
pub use totals::{compose_totals, price_lines, TAX_RATE};
pub use unit::{savings, unit_price};
pub use validation::{
    validate_submission, OrderWarning, SubmissionError, SubmissionViolation, ViolationCode,
};

/// Default advisory minimum for the subtotal before tax.
pub const DEFAULT_MINIMUM_ORDER_AMOUNT: Decimal = Decimal::from_parts(150, 0, 0, false, 0);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTrace {
    pub steps: Vec<PricingTraceStep>,
}

impl PricingTrace {
    fn push(&mut self, stage: &str, detail: impl Into<String>, amount: Decimal) {
        self.steps.push(PricingTraceStep {
            stage: stage.to_string(),
            detail: detail.into(),
            amount,
        });
    }

    pub fn step(&self, stage: &str) -> Option<&PricingTraceStep> {
        self.steps.iter().find(|step| step.stage == stage)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedOrder {
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub category_totals: CategoryTotals,
    pub box_shortfalls: BoxShortfalls,
    pub warnings: Vec<OrderWarning>,
    pub trace: PricingTrace,
}

pub trait PricingEngine: Send + Sync {
    fn price(&self, catalog: &Catalog, selection: &Selection) -> PricedOrder;
}

#[derive(Clone, Debug)]
pub struct DeterministicPricingEngine {
    resolver: TierResolver,
    box_policy: BoxPolicy,
    minimum_order_amount: Decimal,
}

impl DeterministicPricingEngine {
    pub fn new(resolver: TierResolver, box_policy: BoxPolicy, minimum_order_amount: Decimal) -> Self {
        Self { resolver, box_policy, minimum_order_amount }
    }

    /// Business tier tables and packing rules with the default order minimum.
    pub fn standard() -> Self {
        Self::new(TierResolver::standard(), BoxPolicy::standard(), DEFAULT_MINIMUM_ORDER_AMOUNT)
    }

    pub fn with_minimum_order_amount(mut self, minimum: Decimal) -> Self {
        self.minimum_order_amount = minimum;
        self
    }

    pub fn resolver(&self) -> &TierResolver {
        &self.resolver
    }

    pub fn box_policy(&self) -> &BoxPolicy {
        &self.box_policy
    }

    pub fn minimum_order_amount(&self) -> Decimal {
        self.minimum_order_amount
    }
}

impl Default for DeterministicPricingEngine {
    fn default() -> Self {
        Self::standard()
    }
}

impl PricingEngine for DeterministicPricingEngine {
    fn price(&self, catalog: &Catalog, selection: &Selection) -> PricedOrder {
        let mut trace = PricingTrace::default();

        let category_totals = aggregate(selection, catalog, &self.resolver);
        for (category, total) in category_totals.iter() {
            trace.push("category_total", format!("{category}: {total} units"), Decimal::from(total));
        }

        let lines = price_lines(selection, catalog, &self.resolver, &category_totals);
        let discount = two_for_one_discount(selection, catalog, &self.resolver, &category_totals);
        let totals = compose_totals(&lines, discount);

        trace.push("subtotal", "sum(unit_price * quantity)", totals.subtotal);
        trace.push("savings", "sum((base_tier_price - unit_price) * quantity)", totals.savings);
        trace.push("two_for_one", "every second promo unit per category, highest price first", discount);
        trace.push("tax", format!("net * {TAX_RATE}"), totals.tax);
        trace.push("total", "net + tax", totals.total);

        let box_shortfalls = check_boxes(selection, catalog, &self.box_policy);
        let warnings = validation::minimum_order_warning(totals.subtotal, self.minimum_order_amount)
            .into_iter()
            .collect();

        PricedOrder { lines, totals, category_totals, box_shortfalls, warnings, trace }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use super::{
        BoxPolicy, CategoryKey, DeterministicPricingEngine, OrderWarning, PricingEngine,
        TierResolver, TierTable,
    };
    use crate::catalog::Catalog;
    use crate::domain::product::{OfferTag, Product, ProductCode};
    use crate::domain::selection::{Selection, SelectionEntry};

    fn product(code: &str, category: Option<&str>, cents: i64) -> Product {
        Product {
            code: ProductCode::from(code),
            ean: None,
            name: format!("Producto {code}"),
            category: category.map(str::to_string),
            packing_category: None,
            box_size: None,
            list_price: Decimal::new(cents, 2),
            recommended_price: None,
            offer: None,
        }
    }

    fn engine() -> DeterministicPricingEngine {
        let resolver = TierResolver::new().with_table(
            "X",
            TierTable::from_pairs(&[(0, Decimal::new(200, 2)), (48, Decimal::new(180, 2))]),
        );
        DeterministicPricingEngine::new(resolver, BoxPolicy::standard(), Decimal::new(150, 0))
    }

    #[test]
    fn prices_mixed_tiered_and_flat_order() {
        let catalog =
            Catalog::new(vec![product("A", Some("X"), 200), product("B", Some("OTROS"), 300)]);
        let selection = Selection::new().with("A", 50).with("B", 10);

        let priced = engine().price(&catalog, &selection);

        assert_eq!(priced.lines.len(), 2);
        assert_eq!(priced.lines[0].unit_price, Decimal::new(180, 2));
        assert!(priced.lines[0].tiered);
        assert!(!priced.lines[1].tiered);
        assert_eq!(priced.totals.subtotal, Decimal::new(12000, 2));
        assert_eq!(priced.totals.savings, Decimal::new(1000, 2));
        assert_eq!(priced.totals.net, Decimal::new(12000, 2));
        assert_eq!(priced.totals.tax, Decimal::new(2520, 2));
        assert_eq!(priced.totals.total, Decimal::new(14520, 2));
        assert_eq!(priced.category_totals.get(&CategoryKey("X".to_string())), Some(50));
        assert_eq!(
            priced.warnings,
            vec![OrderWarning::BelowMinimumOrder {
                minimum: Decimal::new(150, 0),
                missing: Decimal::new(3000, 2),
            }]
        );
        assert_eq!(priced.trace.step("total").map(|step| step.amount), Some(Decimal::new(14520, 2)));
    }

    #[test]
    fn very_large_quantities_price_without_truncation() {
        let catalog = Catalog::new(vec![product("B", Some("OTROS"), 100)]);
        let selection = Selection::new().with("B", 5_000_000_000);

        let priced = engine().price(&catalog, &selection);

        assert_eq!(priced.lines[0].quantity, 5_000_000_000);
        assert_eq!(priced.totals.subtotal, Decimal::new(5_000_000_000, 0));
    }

    #[test]
    fn pooling_across_products_reaches_the_tier() {
        let catalog = Catalog::new(vec![product("A", Some("X"), 200), product("C", Some("x."), 200)]);
        let selection = Selection::new().with("A", 30).with("C", 18);

        let priced = engine().price(&catalog, &selection);

        assert!(priced.lines.iter().all(|line| line.unit_price == Decimal::new(180, 2)));
        assert_eq!(priced.totals.savings, Decimal::new(960, 2));
    }

    #[test]
    fn unchecked_missing_and_non_positive_entries_are_skipped() {
        let catalog = Catalog::new(vec![product("A", Some("X"), 200), product("B", None, 300)]);
        let mut selection = Selection::new().with("A", 3).with("GHOST", 5).with("B", -2);
        selection.set(ProductCode::from("A"), SelectionEntry { quantity: 60, checked: false });

        let priced = engine().price(&catalog, &selection);

        assert!(priced.lines.is_empty());
        assert_eq!(priced.totals.total, Decimal::ZERO);
        assert!(priced.category_totals.is_empty());
    }

    #[test]
    fn two_for_one_discount_reduces_net_before_tax() {
        let mut promo = product("P", Some("PERFUMERÍA"), 1000);
        promo.offer = Some(OfferTag("2x1".to_string()));
        let catalog = Catalog::new(vec![promo]);

        let priced = engine().price(&catalog, &Selection::new().with("P", 2));

        assert_eq!(priced.totals.subtotal, Decimal::new(2000, 2));
        assert_eq!(priced.totals.two_for_one_discount, Decimal::new(1000, 2));
        assert_eq!(priced.totals.net, Decimal::new(1000, 2));
        assert_eq!(priced.totals.tax, Decimal::new(210, 2));
        assert!(priced.lines[0].two_for_one);
    }

    proptest! {
        #[test]
        fn pricing_is_idempotent(a in 0i64..200, b in 0i64..200, c in -5i64..50) {
            let catalog = Catalog::new(vec![
                product("A", Some("GELES 750ML"), 148),
                product("B", Some("GELES DE BAÑO 750ML"), 148),
                product("C", Some("AMBIENTACIÓN"), 450),
            ]);
            let selection = Selection::new().with("A", a).with("B", b).with("C", c);
            let engine = DeterministicPricingEngine::standard();

            let first = engine.price(&catalog, &selection);
            let second = engine.price(&catalog, &selection);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn totals_are_consistent(a in 1i64..600, b in 1i64..600) {
            let catalog = Catalog::new(vec![
                product("A", Some("JABONES"), 129),
                product("B", Some("JABONES DE MANOS"), 129),
            ]);
            let selection = Selection::new().with("A", a).with("B", b);
            let priced = DeterministicPricingEngine::standard().price(&catalog, &selection);

            prop_assert!(priced.totals.savings >= Decimal::ZERO);
            prop_assert_eq!(priced.totals.total, priced.totals.net + priced.totals.tax);
            prop_assert_eq!(priced.lines[0].unit_price, priced.lines[1].unit_price);
        }
    }
}
