use rust_decimal::Decimal;

use crate::catalog::Catalog;
use crate::domain::order::{OrderLine, OrderTotals};
use crate::domain::selection::Selection;
use crate::pricing::aggregate::CategoryTotals;
use crate::pricing::tiers::TierResolver;
use crate::pricing::unit::{savings, unit_price};

/// Fixed VAT rate applied to the net amount.
pub const TAX_RATE: Decimal = Decimal::from_parts(21, 0, 0, false, 2);

/// Priced lines for every active, catalog-resolvable entry, in code order.
pub fn price_lines(
    selection: &Selection,
    catalog: &Catalog,
    resolver: &TierResolver,
    totals: &CategoryTotals,
) -> Vec<OrderLine> {
    selection
        .active()
        .filter_map(|(code, quantity)| {
            let product = catalog.find(code)?;
            let pooled = resolver
                .resolve_product(product)
                .and_then(|resolved| totals.get(resolved.category));
            let unit = unit_price(resolver, product, quantity, pooled);
            let saved = savings(resolver, product, quantity, pooled);

            Some(OrderLine {
                code: product.code.clone(),
                name: product.name.clone(),
                quantity,
                list_price: product.list_price,
                unit_price: unit,
                subtotal: unit * Decimal::from(quantity),
                savings: saved,
                tiered: saved > Decimal::ZERO,
                two_for_one: product.in_two_for_one(),
            })
        })
        .collect()
}

pub fn compose_totals(lines: &[OrderLine], two_for_one_discount: Decimal) -> OrderTotals {
    let subtotal: Decimal = lines.iter().map(|line| line.subtotal).sum();
    let savings: Decimal = lines.iter().map(|line| line.savings).sum();
    let net = subtotal - two_for_one_discount;
    let tax = net * TAX_RATE;

    OrderTotals {
        product_count: u32::try_from(lines.len()).unwrap_or(u32::MAX),
        subtotal,
        savings,
        two_for_one_discount,
        net,
        tax,
        total: net + tax,
    }
}
