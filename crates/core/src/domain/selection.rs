use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::product::ProductCode;

fn checked_by_default() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub quantity: i64,
    #[serde(default = "checked_by_default")]
    pub checked: bool,
}

impl SelectionEntry {
    pub fn new(quantity: i64) -> Self {
        Self { quantity, checked: true }
    }

    /// Quantity that takes part in pricing, or `None` when the entry counts as absent.
    /// Every positive `i64` is representable, so large orders are never truncated.
    pub fn active_quantity(&self) -> Option<u64> {
        if !self.checked || self.quantity <= 0 {
            return None;
        }
        Some(self.quantity.unsigned_abs())
    }
}

/// What the sales rep has ticked, keyed by product code.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection {
    entries: BTreeMap<ProductCode, SelectionEntry>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, code: impl Into<ProductCode>, quantity: i64) -> Self {
        self.set(code.into(), SelectionEntry::new(quantity));
        self
    }

    pub fn set(&mut self, code: ProductCode, entry: SelectionEntry) {
        self.entries.insert(code, entry);
    }

    pub fn remove(&mut self, code: &ProductCode) -> Option<SelectionEntry> {
        self.entries.remove(code)
    }

    pub fn get(&self, code: &ProductCode) -> Option<&SelectionEntry> {
        self.entries.get(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checked entries with a positive quantity, in product-code order.
    pub fn active(&self) -> impl Iterator<Item = (&ProductCode, u64)> + '_ {
        self.entries
            .iter()
            .filter_map(|(code, entry)| entry.active_quantity().map(|quantity| (code, quantity)))
    }
}

#[cfg(test)]
mod tests {
    use super::{Selection, SelectionEntry};
    use crate::domain::product::ProductCode;

    #[test]
    fn unchecked_and_non_positive_entries_are_inactive() {
        let mut selection = Selection::new().with("A", 3).with("B", 0).with("C", -2);
        selection.set(ProductCode::from("D"), SelectionEntry { quantity: 5, checked: false });

        let active: Vec<_> = selection.active().map(|(code, qty)| (code.0.clone(), qty)).collect();
        assert_eq!(active, vec![("A".to_string(), 3)]);
    }

    #[test]
    fn quantities_past_u32_stay_intact() {
        let selection = Selection::new().with("A", 5_000_000_000).with("B", i64::MAX);

        let active: Vec<_> = selection.active().map(|(_, qty)| qty).collect();
        assert_eq!(active, vec![5_000_000_000, i64::MAX.unsigned_abs()]);
    }

    #[test]
    fn deserializes_from_code_keyed_map() {
        let selection: Selection = serde_json::from_str(
            r#"{"GEL-1":{"quantity":4,"checked":true},"GEL-2":{"quantity":2}}"#,
        )
        .expect("selection json");

        assert_eq!(selection.len(), 2);
        assert_eq!(selection.active().count(), 2);
    }
}
