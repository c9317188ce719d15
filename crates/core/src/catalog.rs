use std::collections::HashMap;

use crate::domain::product::{Product, ProductCode};

/// Read-only product list for one pricing pass, in price-list order.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    products: Vec<Product>,
    index: HashMap<ProductCode, usize>,
}

impl Catalog {
    /// Builds the catalog; a repeated code keeps its first occurrence.
    pub fn new(products: Vec<Product>) -> Self {
        let mut kept = Vec::with_capacity(products.len());
        let mut index = HashMap::with_capacity(products.len());

        for product in products {
            if index.contains_key(&product.code) {
                continue;
            }
            index.insert(product.code.clone(), kept.len());
            kept.push(product);
        }

        Self { products: kept, index }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let products: Vec<Product> = serde_json::from_str(raw)?;
        Ok(Self::new(products))
    }

    pub fn find(&self, code: &ProductCode) -> Option<&Product> {
        self.index.get(code).and_then(|position| self.products.get(*position))
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
