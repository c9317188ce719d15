use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use orderdesk_core::domain::order::{Order, OrderId, OrderStatistics};
use orderdesk_core::domain::product::{Product, ProductCode};

use super::{OrderRepository, ProductRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order);
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut recent: Vec<Order> = orders.values().cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        recent.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(recent)
    }

    async fn delete(&self, id: &OrderId) -> Result<bool, RepositoryError> {
        let mut orders = self.orders.write().await;
        Ok(orders.remove(&id.0).is_some())
    }

    async fn statistics(
        &self,
        reference: DateTime<Utc>,
    ) -> Result<OrderStatistics, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(OrderStatistics::compute(orders.values(), reference))
    }
}

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<Vec<Product>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_code(&self, code: &ProductCode) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().find(|product| &product.code == code).cloned())
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        match products.iter_mut().find(|existing| existing.code == product.code) {
            Some(existing) => *existing = product,
            None => products.push(product),
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.products.read().await.clone())
    }

    async fn replace_all(&self, products: Vec<Product>) -> Result<(), RepositoryError> {
        let mut kept: Vec<Product> = Vec::with_capacity(products.len());
        for product in products {
            if !kept.iter().any(|existing| existing.code == product.code) {
                kept.push(product);
            }
        }
        *self.products.write().await = kept;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use orderdesk_core::domain::customer::CustomerDetails;
    use orderdesk_core::domain::order::{Order, OrderId, OrderStatus, OrderTotals};
    use orderdesk_core::domain::product::{Product, ProductCode};

    use crate::repositories::{
        InMemoryOrderRepository, InMemoryProductRepository, OrderRepository, ProductRepository,
    };

    fn order(id: &str, minutes_ago: i64) -> Order {
        Order {
            id: OrderId(id.to_string()),
            status: OrderStatus::Submitted,
            customer: CustomerDetails::new("FARM001"),
            zone: "MURCIA".to_string(),
            notes: None,
            lines: Vec::new(),
            totals: OrderTotals { total: Decimal::new(12100, 2), ..OrderTotals::default() },
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            forwarding: None,
        }
    }

    #[tokio::test]
    async fn in_memory_order_repo_round_trip() {
        let repo = InMemoryOrderRepository::default();
        let order = order("ORD-1", 0);

        repo.save(order.clone()).await.expect("save order");
        let found = repo.find_by_id(&order.id).await.expect("find order");

        assert_eq!(found, Some(order));
    }

    #[tokio::test]
    async fn in_memory_order_repo_lists_newest_first() {
        let repo = InMemoryOrderRepository::default();
        repo.save(order("ORD-OLD", 20)).await.expect("save");
        repo.save(order("ORD-NEW", 1)).await.expect("save");

        let recent = repo.list_recent(1).await.expect("list");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id.0, "ORD-NEW");

        assert!(repo.delete(&OrderId("ORD-NEW".to_string())).await.expect("delete"));
        let stats = repo.statistics(Utc::now()).await.expect("stats");
        assert_eq!(stats.total_orders, 1);
        assert_eq!(stats.total_billed, Decimal::new(12100, 2));
    }

    #[tokio::test]
    async fn in_memory_product_repo_keeps_insertion_order() {
        let repo = InMemoryProductRepository::default();
        let product = |code: &str| Product {
            code: ProductCode::from(code),
            ean: None,
            name: code.to_string(),
            category: None,
            packing_category: None,
            box_size: None,
            list_price: Decimal::new(100, 2),
            recommended_price: None,
            offer: None,
        };

        repo.save(product("B")).await.expect("save");
        repo.save(product("A")).await.expect("save");
        repo.save(product("B")).await.expect("update");

        let codes: Vec<String> =
            repo.list_all().await.expect("list").into_iter().map(|p| p.code.0).collect();
        assert_eq!(codes, vec!["B".to_string(), "A".to_string()]);
        assert!(repo.find_by_code(&ProductCode::from("A")).await.expect("find").is_some());

        repo.replace_all(vec![product("C"), product("A"), product("C")]).await.expect("replace");

        let codes: Vec<String> =
            repo.list_all().await.expect("list").into_iter().map(|p| p.code.0).collect();
        assert_eq!(codes, vec!["C".to_string(), "A".to_string()]);
        assert!(repo.find_by_code(&ProductCode::from("B")).await.expect("find").is_none());
    }
}
