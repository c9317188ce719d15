//! Box completeness: which SKUs may share a case, and which groups are short.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::domain::product::{Product, ProductCode};
use crate::domain::selection::Selection;

/// Key deciding which selected units pool together to fill boxes.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PackingGroupKey {
    /// No-mixing categories: every reference fills its own boxes.
    Product { code: ProductCode },
    /// Facial line: products pool within a keyword sub-group.
    FacialSubgroup { category: String, subgroup: String },
    /// Assorted cases: anything in the category pools.
    Category { category: String },
}

impl std::fmt::Display for PackingGroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Product { code } => write!(f, "product:{code}"),
            Self::FacialSubgroup { category, subgroup } => write!(f, "facial:{category}:{subgroup}"),
            Self::Category { category } => write!(f, "category:{category}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacialSubgroup {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxPolicy {
    pub no_mixing: Vec<String>,
    pub facial_markers: Vec<String>,
    pub facial_subgroups: Vec<FacialSubgroup>,
    pub facial_fallback: String,
}

impl BoxPolicy {
    pub fn standard() -> Self {
        let subgroup = |name: &str, keywords: &[&str]| FacialSubgroup {
            name: name.to_string(),
            keywords: keywords.iter().map(|kw| kw.to_string()).collect(),
        };

        Self {
            no_mixing: ["GELES", "JABONES", "CHAMPUS", "CHAMPÚS"]
                .iter()
                .map(|value| value.to_string())
                .collect(),
            facial_markers: vec!["FACIAL".to_string()],
            facial_subgroups: vec![
                subgroup("SERUM", &["SERUM", "SÉRUM"]),
                subgroup("CREMA", &["CREMA", "CREMAS"]),
                subgroup(
                    "LIMPIEZA",
                    &["TÓNICO", "TONICO", "LECHE LIMPIADORA", "AGUA MICELAR", "MICELAR"],
                ),
            ],
            facial_fallback: "OTROS_FACIAL".to_string(),
        }
    }

    pub fn is_no_mixing(&self, category: &str) -> bool {
        let category = category.to_uppercase();
        self.no_mixing.iter().any(|needle| category.contains(&needle.to_uppercase()))
    }

    pub fn is_facial(&self, category: &str) -> bool {
        let category = fold_accents(&category.to_uppercase());
        self.facial_markers
            .iter()
            .any(|marker| category.contains(&fold_accents(&marker.to_uppercase())))
    }

    pub fn facial_subgroup(&self, product_name: &str) -> &str {
        let name = fold_accents(&product_name.to_uppercase());
        self.facial_subgroups
            .iter()
            .find(|group| {
                group
                    .keywords
                    .iter()
                    .any(|keyword| name.contains(&fold_accents(&keyword.to_uppercase())))
            })
            .map(|group| group.name.as_str())
            .unwrap_or(&self.facial_fallback)
    }

    /// Grouping key and the human label shown in shortfall warnings.
    pub fn group_for(&self, product: &Product) -> (PackingGroupKey, String) {
        let category = product.packing_category().map(str::to_uppercase).unwrap_or_default();

        if self.is_no_mixing(&category) {
            return (PackingGroupKey::Product { code: product.code.clone() }, product.name.clone());
        }

        if self.is_facial(&category) {
            let subgroup = self.facial_subgroup(&product.name).to_string();
            let label = format!("{category} - {subgroup}");
            let category = fold_accents(&category);
            return (PackingGroupKey::FacialSubgroup { category, subgroup }, label);
        }

        (PackingGroupKey::Category { category: category.clone() }, category)
    }
}

impl Default for BoxPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxShortfall {
    pub group: PackingGroupKey,
    pub label: String,
    pub total: u64,
    pub box_size: u32,
    pub missing: u64,
}

/// Groups whose pooled quantity does not fill whole boxes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoxShortfalls(Vec<BoxShortfall>);

impl BoxShortfalls {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoxShortfall> + '_ {
        self.0.iter()
    }

    pub fn get(&self, group: &PackingGroupKey) -> Option<&BoxShortfall> {
        self.0.iter().find(|shortfall| &shortfall.group == group)
    }
}

struct GroupAccumulator {
    label: String,
    total: u64,
    box_size: u32,
}

/// Reports every packing group whose total is not a multiple of its box size.
///
/// The box size of a group is the one of the first product (in code order)
/// that opened it. Advisory only: pricing never reads this result.
pub fn check_boxes(selection: &Selection, catalog: &Catalog, policy: &BoxPolicy) -> BoxShortfalls {
    let mut groups: BTreeMap<PackingGroupKey, GroupAccumulator> = BTreeMap::new();

    for (code, quantity) in selection.active() {
        let Some(product) = catalog.find(code) else {
            continue;
        };
        let Some(box_size) = product.box_constraint() else {
            continue;
        };

        let (key, label) = policy.group_for(product);
        let group =
            groups.entry(key).or_insert(GroupAccumulator { label, total: 0, box_size });
        group.total = group.total.saturating_add(quantity);
    }

    let shortfalls = groups
        .into_iter()
        .filter_map(|(group, acc)| {
            let remainder = acc.total % u64::from(acc.box_size);
            (remainder != 0).then(|| BoxShortfall {
                group,
                label: acc.label,
                total: acc.total,
                box_size: acc.box_size,
                missing: u64::from(acc.box_size) - remainder,
            })
        })
        .collect();

    BoxShortfalls(shortfalls)
}

fn fold_accents(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            'Á' | 'À' | 'Â' | 'Ä' => 'A',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'Ó' | 'Ò' | 'Ô' | 'Ö' => 'O',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            other => other,
        })
        .collect()
}
