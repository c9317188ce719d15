use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::Row;

use orderdesk_core::domain::product::{OfferTag, Product, ProductCode};

use super::{ProductRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    raw.parse::<Decimal>()
        .map_err(|e| RepositoryError::Decode(format!("{column} `{raw}` is not a decimal: {e}")))
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let code: String = row.try_get("code").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let ean: Option<String> =
        row.try_get("ean").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: Option<String> =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let packing_category: Option<String> =
        row.try_get("packing_category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let box_size: Option<i64> =
        row.try_get("box_size").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let list_price_str: String =
        row.try_get("list_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let recommended_price_str: Option<String> =
        row.try_get("recommended_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let offer: Option<String> =
        row.try_get("offer").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Product {
        code: ProductCode(code),
        ean,
        name,
        category,
        packing_category,
        box_size: box_size.and_then(|size| u32::try_from(size).ok()),
        list_price: parse_decimal("list_price", &list_price_str)?,
        recommended_price: recommended_price_str
            .as_deref()
            .map(|raw| parse_decimal("recommended_price", raw))
            .transpose()?,
        offer: offer.map(OfferTag),
    })
}

const PRODUCT_COLUMNS: &str = "code, ean, name, category, packing_category, box_size,
                               list_price, recommended_price, offer";

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_code(&self, code: &ProductCode) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE code = ?"))
            .bind(&code.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product (code, position, ean, name, category, packing_category, box_size,
                                  list_price, recommended_price, offer, updated_at)
             VALUES (?, (SELECT COALESCE(MAX(position) + 1, 0) FROM product),
                     ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(code) DO UPDATE SET
                 ean = excluded.ean,
                 name = excluded.name,
                 category = excluded.category,
                 packing_category = excluded.packing_category,
                 box_size = excluded.box_size,
                 list_price = excluded.list_price,
                 recommended_price = excluded.recommended_price,
                 offer = excluded.offer,
                 updated_at = excluded.updated_at",
        )
        .bind(&product.code.0)
        .bind(&product.ean)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.packing_category)
        .bind(product.box_size.map(i64::from))
        .bind(product.list_price.to_string())
        .bind(product.recommended_price.map(|price| price.to_string()))
        .bind(product.offer.map(|tag| tag.0))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product ORDER BY position"))
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(row_to_product).collect::<Result<Vec<_>, _>>()
    }

    async fn replace_all(&self, products: Vec<Product>) -> Result<(), RepositoryError> {
        let updated_at = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM product").execute(&mut *tx).await?;
        for (position, product) in products.into_iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| RepositoryError::Decode("catalog position overflow".to_string()))?;
            sqlx::query(
                "INSERT INTO product (code, position, ean, name, category, packing_category,
                                      box_size, list_price, recommended_price, offer, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(code) DO NOTHING",
            )
            .bind(&product.code.0)
            .bind(position)
            .bind(&product.ean)
            .bind(&product.name)
            .bind(&product.category)
            .bind(&product.packing_category)
            .bind(product.box_size.map(i64::from))
            .bind(product.list_price.to_string())
            .bind(product.recommended_price.map(|price| price.to_string()))
            .bind(product.offer.map(|tag| tag.0))
            .bind(&updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
