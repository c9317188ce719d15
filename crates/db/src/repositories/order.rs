use chrono::{DateTime, Utc};
use sqlx::Row;

use orderdesk_core::domain::order::{Order, OrderId, OrderRecord, OrderStatistics};

use super::{OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// The JSON document is authoritative; header columns only serve listing and indexing.
fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> Result<Order, RepositoryError> {
    let record_json: String =
        row.try_get("record_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let record: OrderRecord = serde_json::from_str(&record_json)
        .map_err(|e| RepositoryError::Decode(format!("order record: {e}")))?;
    Ok(record.into_current())
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query("SELECT record_json FROM customer_order WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_order(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        let record = OrderRecord::from(order.clone());
        let record_json = serde_json::to_string(&record)
            .map_err(|e| RepositoryError::Decode(format!("order record: {e}")))?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO customer_order (id, status, customer_code, zone, total, schema_version,
                                         record_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 customer_code = excluded.customer_code,
                 zone = excluded.zone,
                 total = excluded.total,
                 schema_version = excluded.schema_version,
                 record_json = excluded.record_json,
                 updated_at = excluded.updated_at",
        )
        .bind(&order.id.0)
        .bind(order.status.as_str())
        .bind(&order.customer.code)
        .bind(&order.zone)
        .bind(order.totals.total.to_string())
        .bind(i64::from(record.version()))
        .bind(&record_json)
        .bind(order.created_at.to_rfc3339())
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM customer_order_line WHERE order_id = ?")
            .bind(&order.id.0)
            .execute(&mut *tx)
            .await?;

        for (line_no, line) in order.lines.iter().enumerate() {
            let quantity = i64::try_from(line.quantity).map_err(|_| {
                RepositoryError::Decode(format!("line quantity {} exceeds storage", line.quantity))
            })?;
            sqlx::query(
                "INSERT INTO customer_order_line (order_id, line_no, product_code, description,
                                                  quantity, unit_price, subtotal)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&order.id.0)
            .bind(i64::try_from(line_no).unwrap_or(i64::MAX))
            .bind(&line.code.0)
            .bind(&line.name)
            .bind(quantity)
            .bind(line.unit_price.to_string())
            .bind(line.subtotal.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT record_json FROM customer_order ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_order).collect::<Result<Vec<_>, _>>()
    }

    async fn delete(&self, id: &OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM customer_order WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn statistics(
        &self,
        reference: DateTime<Utc>,
    ) -> Result<OrderStatistics, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query("SELECT record_json FROM customer_order").fetch_all(&self.pool).await?;
        let orders = rows.iter().map(row_to_order).collect::<Result<Vec<_>, _>>()?;
        Ok(OrderStatistics::compute(&orders, reference))
    }
}
