use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use orderdesk_core::domain::order::{Order, OrderId, OrderStatistics};
use orderdesk_core::domain::product::{Product, ProductCode};

pub mod memory;
pub mod order;
pub mod product;

pub use memory::{InMemoryOrderRepository, InMemoryProductRepository};
pub use order::SqlOrderRepository;
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;
    /// Inserts or replaces the order and its lines.
    async fn save(&self, order: Order) -> Result<(), RepositoryError>;
    /// Newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<Order>, RepositoryError>;
    /// Returns whether an order was removed.
    async fn delete(&self, id: &OrderId) -> Result<bool, RepositoryError>;
    async fn statistics(&self, reference: DateTime<Utc>)
        -> Result<OrderStatistics, RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_code(&self, code: &ProductCode) -> Result<Option<Product>, RepositoryError>;
    /// Upsert. A new code is appended after the existing catalog.
    async fn save(&self, product: Product) -> Result<(), RepositoryError>;
    /// Whole catalog in price-list order.
    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError>;
    /// Swaps the whole catalog for `products` atomically. Positions follow the
    /// given order and a repeated code keeps its first occurrence.
    async fn replace_all(&self, products: Vec<Product>) -> Result<(), RepositoryError>;
}
