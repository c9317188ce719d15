use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::domain::selection::Selection;
use crate::pricing::tiers::{CategoryKey, TierResolver};

/// Selected units pooled per canonical discount category.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTotals(BTreeMap<CategoryKey, u64>);

impl CategoryTotals {
    pub fn get(&self, category: &CategoryKey) -> Option<u64> {
        self.0.get(category).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CategoryKey, u64)> + '_ {
        self.0.iter().map(|(key, total)| (key, *total))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Sums active quantities per discount category across different products.
///
/// Entries that are unchecked, non-positive, absent from the catalog, or
/// whose product has no tiered category are skipped and never get a zero entry.
pub fn aggregate(selection: &Selection, catalog: &Catalog, resolver: &TierResolver) -> CategoryTotals {
    let mut totals = BTreeMap::new();

    for (code, quantity) in selection.active() {
        let Some(product) = catalog.find(code) else {
            continue;
        };
        let Some(resolved) = resolver.resolve_product(product) else {
            continue;
        };
        let total = totals.entry(resolved.category.clone()).or_insert(0u64);
        *total = total.saturating_add(quantity);
    }

    CategoryTotals(totals)
}
