use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::order::Order;
use crate::models::{AlertPriority, AlertStatus, AlertType, Product, StockAlert};
use super::{AlertStore, OrderFilter, OrderPage, StockWrite, Store, StoreError, StoreTx};

// ============================================================================
// PostgreSQL Store
// ============================================================================
//
// Orders are stored as a JSONB document next to the columns used for
// filtering and the optimistic version. Stock is a plain counter guarded by
// a CHECK constraint; every decrement is a conditional UPDATE so a racing
// transaction can never take it below zero.
//
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL,
    price       NUMERIC(14, 2) NOT NULL,
    gst_rate    NUMERIC(5, 2) NOT NULL DEFAULT 0,
    stock       BIGINT NOT NULL CHECK (stock >= 0)
);

CREATE TABLE IF NOT EXISTS orders (
    id              UUID PRIMARY KEY,
    order_number    TEXT NOT NULL UNIQUE,
    status          TEXT NOT NULL,
    payment_status  TEXT NOT NULL,
    customer_name   TEXT NOT NULL,
    order_date      TIMESTAMPTZ NOT NULL,
    version         BIGINT NOT NULL,
    body            JSONB NOT NULL
);

CREATE INDEX IF NOT EXISTS orders_status_idx ON orders (status);
CREATE INDEX IF NOT EXISTS orders_payment_status_idx ON orders (payment_status);
CREATE INDEX IF NOT EXISTS orders_order_date_idx ON orders (order_date DESC);

CREATE TABLE IF NOT EXISTS stock_alerts (
    id              UUID PRIMARY KEY,
    product_id      UUID NOT NULL,
    product_name    TEXT NOT NULL,
    alert_type      TEXT NOT NULL,
    priority        TEXT NOT NULL,
    threshold       BIGINT NOT NULL,
    current_stock   BIGINT NOT NULL,
    status          TEXT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL,
    resolved_at     TIMESTAMPTZ
);

CREATE UNIQUE INDEX IF NOT EXISTS stock_alerts_one_active
    ON stock_alerts (product_id, alert_type) WHERE status = 'active';
"#;

type ProductRow = (Uuid, String, Decimal, Decimal, i64);

type AlertRow = (
    Uuid,
    Uuid,
    String,
    String,
    String,
    i64,
    i64,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

const ALERT_COLUMNS: &str = "id, product_id, product_name, alert_type, priority, threshold, \
                             current_stock, status, created_at, resolved_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Create tables and indexes if they do not exist
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Database schema ready");
        Ok(())
    }

    pub async fn upsert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, gst_rate, stock)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name, price = EXCLUDED.price,
                gst_rate = EXCLUDED.gst_rate, stock = EXCLUDED.stock
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.gst_rate)
        .bind(product.stock)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn product_from_row((id, name, price, gst_rate, stock): ProductRow) -> Product {
    Product {
        id,
        name,
        price,
        gst_rate,
        stock,
    }
}

fn order_from_body(body: serde_json::Value) -> Result<Order, StoreError> {
    Ok(serde_json::from_value(body)?)
}

fn alert_from_row(row: AlertRow) -> Result<StockAlert, StoreError> {
    let (id, product_id, product_name, alert_type, priority, threshold, current_stock, status, created_at, resolved_at) = row;

    Ok(StockAlert {
        id,
        product_id,
        product_name,
        alert_type: AlertType::parse(&alert_type)
            .ok_or_else(|| StoreError::Corrupt(format!("alert {}: type {}", id, alert_type)))?,
        priority: AlertPriority::parse(&priority)
            .ok_or_else(|| StoreError::Corrupt(format!("alert {}: priority {}", id, priority)))?,
        threshold,
        current_stock,
        status: AlertStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("alert {}: status {}", id, status)))?,
        created_at,
        resolved_at,
    })
}

/// `%term%` for ILIKE, with wildcards in the term escaped
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

const ORDER_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR status = $1)
      AND ($2::text IS NULL OR payment_status = $2)
      AND ($3::text IS NULL OR order_number ILIKE $3 OR customer_name ILIKE $3)
"#;

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let body: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT body FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        body.map(order_from_body).transpose()
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<OrderPage, StoreError> {
        let status = filter.status.map(|s| s.as_str());
        let payment_status = filter.payment_status.map(|s| s.as_str());
        let search = filter.search.as_deref().map(like_pattern);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders {}", ORDER_FILTER))
            .bind(status)
            .bind(payment_status)
            .bind(search.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let bodies: Vec<serde_json::Value> = sqlx::query_scalar(&format!(
            "SELECT body FROM orders {} ORDER BY order_date DESC, id DESC LIMIT $4 OFFSET $5",
            ORDER_FILTER
        ))
        .bind(status)
        .bind(payment_status)
        .bind(search.as_deref())
        .bind(i64::from(filter.limit))
        .bind(filter.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let orders = bodies
            .into_iter()
            .map(order_from_body)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OrderPage {
            orders,
            total: total.max(0) as u64,
        })
    }

    async fn all_orders(&self) -> Result<Vec<Order>, StoreError> {
        let bodies: Vec<serde_json::Value> = sqlx::query_scalar("SELECT body FROM orders")
            .fetch_all(&self.pool)
            .await?;
        bodies.into_iter().map(order_from_body).collect()
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> =
            sqlx::query_as("SELECT id, name, price, gst_rate, stock FROM products WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(row.map(product_from_row))
    }

    async fn adjust_stock(&mut self, id: Uuid, delta: i64) -> Result<StockWrite, StoreError> {
        let updated: Option<ProductRow> = sqlx::query_as(
            r#"
            UPDATE products SET stock = stock + $2
            WHERE id = $1 AND stock + $2 >= 0
            RETURNING id, name, price, gst_rate, stock
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(row) = updated {
            return Ok(StockWrite::Applied(product_from_row(row)));
        }

        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(match available {
            Some(available) => StockWrite::WouldGoNegative { available },
            None => StockWrite::UnknownProduct,
        })
    }

    async fn order_for_update(&mut self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let body: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT body FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;
        body.map(order_from_body).transpose()
    }

    async fn orders_for_update(&mut self) -> Result<Vec<Order>, StoreError> {
        let bodies: Vec<serde_json::Value> =
            sqlx::query_scalar("SELECT body FROM orders ORDER BY id FOR UPDATE")
                .fetch_all(&mut *self.tx)
                .await?;
        bodies.into_iter().map(order_from_body).collect()
    }

    async fn order_number_exists(&mut self, order_number: &str) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE order_number = $1)")
                .bind(order_number)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let body = serde_json::to_value(order)?;
        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, status, payment_status, customer_name, order_date, version, body)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.customer.name)
        .bind(order.order_date)
        .bind(order.version)
        .bind(body)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_order(&mut self, order: &Order, expected_version: i64) -> Result<(), StoreError> {
        let body = serde_json::to_value(order)?;
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = $3, payment_status = $4, customer_name = $5,
                version = $6, body = $7
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id)
        .bind(expected_version)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.customer.name)
        .bind(order.version)
        .bind(body)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "order {} changed since version {}",
                order.id, expected_version
            )));
        }
        Ok(())
    }

    async fn delete_order(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_orders(&mut self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl AlertStore for PgStore {
    async fn current_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> =
            sqlx::query_as("SELECT id, name, price, gst_rate, stock FROM products WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(product_from_row))
    }

    async fn active_alerts(&self, product_id: Uuid) -> Result<Vec<StockAlert>, StoreError> {
        let rows: Vec<AlertRow> = sqlx::query_as(&format!(
            "SELECT {} FROM stock_alerts WHERE product_id = $1 AND status = 'active'",
            ALERT_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(alert_from_row).collect()
    }

    async fn insert_alert(&self, alert: &StockAlert) -> Result<bool, StoreError> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO stock_alerts ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (product_id, alert_type) WHERE status = 'active' DO NOTHING
            "#,
            ALERT_COLUMNS
        ))
        .bind(alert.id)
        .bind(alert.product_id)
        .bind(&alert.product_name)
        .bind(alert.alert_type.as_str())
        .bind(alert.priority.as_str())
        .bind(alert.threshold)
        .bind(alert.current_stock)
        .bind(alert.status.as_str())
        .bind(alert.created_at)
        .bind(alert.resolved_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn resolve_alert(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE stock_alerts SET status = 'resolved', resolved_at = $2 WHERE id = $1 AND status = 'active'",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_alerts(&self, status: Option<AlertStatus>) -> Result<Vec<StockAlert>, StoreError> {
        let rows: Vec<AlertRow> = sqlx::query_as(&format!(
            "SELECT {} FROM stock_alerts WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC",
            ALERT_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(alert_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ord"), "%ord%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_alert_row_with_unknown_type_is_corrupt() {
        let row: AlertRow = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Widget".to_string(),
            "overstock".to_string(),
            "high".to_string(),
            10,
            3,
            "active".to_string(),
            Utc::now(),
            None,
        );
        assert!(matches!(alert_from_row(row), Err(StoreError::Corrupt(_))));
    }
}
