use rust_decimal::Decimal;

use crate::domain::product::Product;
use crate::pricing::tiers::TierResolver;

/// Unit price for `quantity` of `product`.
///
/// `category_total` is the pooled category quantity when the whole order is
/// known; without it the line's own quantity drives the tier lookup.
pub fn unit_price(
    resolver: &TierResolver,
    product: &Product,
    quantity: u64,
    category_total: Option<u64>,
) -> Decimal {
    let Some(resolved) = resolver.resolve_product(product) else {
        return product.list_price;
    };
    if quantity == 0 {
        return product.list_price;
    }

    let lookup = category_total.unwrap_or(quantity);
    resolved.table.price_for(lookup)
}

/// Saving against the category's base tier price for the whole line.
pub fn savings(
    resolver: &TierResolver,
    product: &Product,
    quantity: u64,
    category_total: Option<u64>,
) -> Decimal {
    let Some(resolved) = resolver.resolve_product(product) else {
        return Decimal::ZERO;
    };
    if quantity == 0 {
        return Decimal::ZERO;
    }

    let current = unit_price(resolver, product, quantity, category_total);
    (resolved.table.base_price() - current) * Decimal::from(quantity)
}
