use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::customer::CustomerDetails;
use crate::domain::product::ProductCode;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("ORD-{}-{}", now.format("%Y%m%d"), &suffix[..8]))
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Submitted,
    Forwarded,
    ForwardFailed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Forwarded => "forwarded",
            Self::ForwardFailed => "forward_failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "forwarded" => Some(Self::Forwarded),
            "forward_failed" => Some(Self::ForwardFailed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub code: ProductCode,
    pub name: String,
    pub quantity: u64,
    pub list_price: Decimal,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub savings: Decimal,
    pub tiered: bool,
    pub two_for_one: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub product_count: u32,
    pub subtotal: Decimal,
    pub savings: Decimal,
    pub two_for_one_discount: Decimal,
    pub net: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Reply data kept after the order reached the external order system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingReceipt {
    pub external_code: String,
    pub external_total: String,
    pub message: String,
    pub forwarded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub customer: CustomerDetails,
    pub zone: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub forwarding: Option<ForwardingReceipt>,
}

impl Order {
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self.status, next),
            (OrderStatus::Draft, OrderStatus::Submitted)
                | (OrderStatus::Submitted, OrderStatus::Forwarded)
                | (OrderStatus::Submitted, OrderStatus::ForwardFailed)
                | (OrderStatus::ForwardFailed, OrderStatus::Forwarded)
                | (OrderStatus::ForwardFailed, OrderStatus::ForwardFailed)
                | (OrderStatus::Draft, OrderStatus::Cancelled)
                | (OrderStatus::Submitted, OrderStatus::Cancelled)
                | (OrderStatus::ForwardFailed, OrderStatus::Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidOrderTransition { from: self.status, to: next })
    }

    /// Name and identifier line shown for the order, whatever schema it came from.
    pub fn display_customer(&self) -> (&str, String) {
        (self.customer.display_name(), self.customer.id_line())
    }

    pub fn record_forwarding(&mut self, receipt: ForwardingReceipt) -> Result<(), DomainError> {
        self.transition_to(OrderStatus::Forwarded)?;
        self.forwarding = Some(receipt);
        Ok(())
    }
}

/// Dashboard figures over stored orders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatistics {
    pub total_orders: u64,
    pub total_billed: Decimal,
    pub total_savings: Decimal,
    pub orders_this_month: u64,
}

impl OrderStatistics {
    /// Cancelled orders are left out. "This month" is the month and year of `reference`.
    pub fn compute<'a>(orders: impl IntoIterator<Item = &'a Order>, reference: DateTime<Utc>) -> Self {
        let mut stats = Self::default();
        for order in orders {
            if order.status == OrderStatus::Cancelled {
                continue;
            }
            stats.total_orders += 1;
            stats.total_billed += order.totals.total;
            stats.total_savings += order.totals.savings + order.totals.two_for_one_discount;
            if order.created_at.year() == reference.year()
                && order.created_at.month() == reference.month()
            {
                stats.orders_this_month += 1;
            }
        }
        stats
    }
}

/// Stored order document. Every stored payload carries its schema version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "schema_version")]
pub enum OrderRecord {
    #[serde(rename = "1")]
    V1(LegacyOrderV1),
    #[serde(rename = "2")]
    V2(Order),
}

impl OrderRecord {
    pub const CURRENT_VERSION: u32 = 2;

    pub fn version(&self) -> u32 {
        match self {
            Self::V1(_) => 1,
            Self::V2(_) => 2,
        }
    }

    pub fn into_current(self) -> Order {
        match self {
            Self::V1(legacy) => legacy.migrate(),
            Self::V2(order) => order,
        }
    }
}

impl From<Order> for OrderRecord {
    fn from(order: Order) -> Self {
        Self::V2(order)
    }
}

/// First-generation order: customer code plus tax id, no 2x1 discount.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegacyOrderV1 {
    pub id: OrderId,
    pub customer_code: String,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub zone: String,
    pub lines: Vec<LegacyLineV1>,
    pub totals: LegacyTotalsV1,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegacyLineV1 {
    pub code: ProductCode,
    pub name: String,
    pub quantity: u64,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    #[serde(default)]
    pub tiered: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegacyTotalsV1 {
    pub subtotal: Decimal,
    #[serde(default)]
    pub savings: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl LegacyOrderV1 {
    fn migrate(self) -> Order {
        let lines: Vec<OrderLine> = self
            .lines
            .into_iter()
            .map(|line| OrderLine {
                code: line.code,
                name: line.name,
                quantity: line.quantity,
                list_price: line.unit_price,
                unit_price: line.unit_price,
                subtotal: line.subtotal,
                savings: Decimal::ZERO,
                tiered: line.tiered,
                two_for_one: false,
            })
            .collect();

        let totals = OrderTotals {
            product_count: u32::try_from(lines.len()).unwrap_or(u32::MAX),
            subtotal: self.totals.subtotal,
            savings: self.totals.savings,
            two_for_one_discount: Decimal::ZERO,
            net: self.totals.subtotal,
            tax: self.totals.tax,
            total: self.totals.total,
        };

        Order {
            id: self.id,
            status: OrderStatus::Submitted,
            customer: CustomerDetails { code: self.customer_code, name: None, tax_id: self.tax_id },
            zone: self.zone,
            notes: None,
            lines,
            totals,
            created_at: self.created_at,
            forwarding: None,
        }
    }
}
