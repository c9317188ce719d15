//! Volume tier tables and the alias step that maps raw price-list category
//! headings onto the canonical category each table is keyed by.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::Product;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryKey(pub String);

impl CategoryKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTier {
    pub threshold: u64,
    pub unit_price: Decimal,
}

/// Ordered threshold -> unit price steps.
///
/// Callers supply strictly increasing thresholds starting at 0 with
/// non-increasing prices. Tables that break this are priced without
/// panicking but the result carries no meaning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    tiers: Vec<PriceTier>,
}

impl TierTable {
    pub fn new(tiers: Vec<PriceTier>) -> Self {
        Self { tiers }
    }

    pub fn from_pairs(pairs: &[(u64, Decimal)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(threshold, unit_price)| PriceTier {
                    threshold: *threshold,
                    unit_price: *unit_price,
                })
                .collect(),
        )
    }

    pub fn tiers(&self) -> &[PriceTier] {
        &self.tiers
    }

    /// Undiscounted price, the one at threshold 0.
    pub fn base_price(&self) -> Decimal {
        self.tiers.first().map(|tier| tier.unit_price).unwrap_or(Decimal::ZERO)
    }

    /// Price of the highest threshold not above `quantity`, scanning downward.
    pub fn price_for(&self, quantity: u64) -> Decimal {
        self.tiers
            .iter()
            .rev()
            .find(|tier| quantity >= tier.threshold)
            .map(|tier| tier.unit_price)
            .unwrap_or_else(|| self.base_price())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ResolvedTier<'a> {
    pub category: &'a CategoryKey,
    pub table: &'a TierTable,
}

#[derive(Clone, Debug, Default)]
pub struct TierResolver {
    aliases: HashMap<String, CategoryKey>,
    tables: HashMap<CategoryKey, TierTable>,
}

impl TierResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table under its canonical name; the name is also its own alias.
    pub fn with_table(mut self, canonical: &str, table: TierTable) -> Self {
        let key = CategoryKey(normalize_heading(canonical));
        self.aliases.insert(key.0.clone(), key.clone());
        self.tables.insert(key, table);
        self
    }

    pub fn with_alias(mut self, alias: &str, canonical: &str) -> Self {
        self.aliases.insert(normalize_heading(alias), CategoryKey(normalize_heading(canonical)));
        self
    }

    /// Business price list tables for the tiered categories.
    pub fn standard() -> Self {
        Self::new()
            .with_table(
                "GELES 750ML",
                TierTable::from_pairs(&[
                    (0, Decimal::new(148, 2)),
                    (48, Decimal::new(139, 2)),
                    (96, Decimal::new(137, 2)),
                    (252, Decimal::new(134, 2)),
                    (540, Decimal::new(131, 2)),
                    (1080, Decimal::new(123, 2)),
                ]),
            )
            .with_table(
                "GELES 1L",
                TierTable::from_pairs(&[
                    (0, Decimal::new(124, 2)),
                    (100, Decimal::new(118, 2)),
                    (300, Decimal::new(113, 2)),
                    (600, Decimal::new(108, 2)),
                    (1200, Decimal::new(103, 2)),
                ]),
            )
            .with_table(
                "HAIR & BODY MIST",
                TierTable::from_pairs(&[
                    (0, Decimal::new(129, 2)),
                    (120, Decimal::new(124, 2)),
                    (240, Decimal::new(118, 2)),
                    (500, Decimal::new(114, 2)),
                ]),
            )
            .with_table(
                "JABONES",
                TierTable::from_pairs(&[
                    (0, Decimal::new(129, 2)),
                    (144, Decimal::new(124, 2)),
                    (228, Decimal::new(118, 2)),
                    (504, Decimal::new(113, 2)),
                ]),
            )
            .with_alias("GELES DE BAÑO 750ML", "GELES 750ML")
            .with_alias("GELES DE BAÑO 1L", "GELES 1L")
            .with_alias("JABONES DE MANOS", "JABONES")
    }

    /// Maps a raw category heading to its canonical key, if it has a table.
    pub fn canonical(&self, raw: &str) -> Option<&CategoryKey> {
        let heading = normalize_heading(raw);
        if heading.is_empty() {
            return None;
        }

        let key = self.aliases.get(&heading).or_else(|| {
            let without_dot = heading.trim_end_matches('.').trim_end();
            self.aliases.get(without_dot)
        })?;
        self.tables.contains_key(key).then_some(key)
    }

    pub fn resolve(&self, raw: &str) -> Option<ResolvedTier<'_>> {
        let key = self.canonical(raw)?;
        let (category, table) = self.tables.get_key_value(key)?;
        Some(ResolvedTier { category, table })
    }

    pub fn resolve_product(&self, product: &Product) -> Option<ResolvedTier<'_>> {
        product.category().and_then(|category| self.resolve(category))
    }

    pub fn table(&self, key: &CategoryKey) -> Option<&TierTable> {
        self.tables.get(key)
    }
}

fn normalize_heading(raw: &str) -> String {
    raw.trim().to_uppercase()
}
