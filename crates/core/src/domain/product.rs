use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductCode(pub String);

impl ProductCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductCode {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for ProductCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Promotional offer tag as printed on the price list (e.g. `2X1`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferTag(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub code: ProductCode,
    #[serde(default)]
    pub ean: Option<String>,
    pub name: String,
    /// Discount category; drives tier lookups and 2x1 buckets.
    #[serde(default)]
    pub category: Option<String>,
    /// Packing-group category for box checks. Falls back to `category`.
    #[serde(default)]
    pub packing_category: Option<String>,
    #[serde(default)]
    pub box_size: Option<u32>,
    pub list_price: Decimal,
    #[serde(default)]
    pub recommended_price: Option<Decimal>,
    #[serde(default)]
    pub offer: Option<OfferTag>,
}

impl Product {
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|value| !value.is_empty())
    }

    pub fn packing_category(&self) -> Option<&str> {
        self.packing_category
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or_else(|| self.category())
    }

    /// Box size when it actually constrains ordering (greater than one).
    pub fn box_constraint(&self) -> Option<u32> {
        self.box_size.filter(|size| *size > 1)
    }

    pub fn in_two_for_one(&self) -> bool {
        self.offer.as_ref().is_some_and(|tag| !tag.0.trim().is_empty())
    }
}
