use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::catalog::Catalog;
use crate::domain::selection::Selection;
use crate::pricing::aggregate::CategoryTotals;
use crate::pricing::tiers::TierResolver;
use crate::pricing::unit::unit_price;

/// 2x1 discount: within each category, every second unit (most expensive
/// first) of promotion-tagged products is free.
///
/// Unit prices are the tier-discounted ones, using the pooled `totals`.
/// Buckets are keyed by the trimmed category folded to upper case, so
/// "Perfumería" and "PERFUMERÍA " pool together. Products without a category
/// share one unnamed bucket.
pub fn two_for_one_discount(
    selection: &Selection,
    catalog: &Catalog,
    resolver: &TierResolver,
    totals: &CategoryTotals,
) -> Decimal {
    // category -> runs of (unit price, unit count)
    let mut buckets: BTreeMap<String, Vec<(Decimal, u64)>> = BTreeMap::new();

    for (code, quantity) in selection.active() {
        let Some(product) = catalog.find(code) else {
            continue;
        };
        if !product.in_two_for_one() {
            continue;
        }

        let pooled =
            resolver.resolve_product(product).and_then(|resolved| totals.get(resolved.category));
        let price = unit_price(resolver, product, quantity, pooled);
        let bucket = product.category().map(str::to_uppercase).unwrap_or_default();
        buckets.entry(bucket).or_default().push((price, quantity));
    }

    buckets.into_values().map(free_units_value).sum()
}

/// Sum of the tokens at odd positions once runs are laid out most expensive first.
fn free_units_value(mut runs: Vec<(Decimal, u64)>) -> Decimal {
    runs.sort_by(|a, b| b.0.cmp(&a.0));

    let mut position = 0u64;
    let mut free = Decimal::ZERO;
    for (price, count) in runs {
        let end = position.saturating_add(count);
        // odd indices in [position, end)
        let odd = end / 2 - position / 2;
        free += price * Decimal::from(odd);
        position = end;
    }
    free
}
