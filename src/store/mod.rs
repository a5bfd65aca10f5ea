// ============================================================================
// Persistence Ports
// ============================================================================
//
// `Store::begin` opens one atomic unit of work. Every stock movement and
// order write of a single service call goes through the same `StoreTx`;
// dropping it without `commit` discards all of them.
//
// ============================================================================

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::order::{Order, OrderStatus, PaymentStatus};
use crate::models::{AlertStatus, Product, StockAlert};
use crate::utils::IsTransient;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if matches!(db.code().as_deref(), Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED)) {
                return StoreError::Conflict(db.message().to_string());
            }
            if db.is_unique_violation() {
                return StoreError::Conflict(format!(
                    "unique constraint {} violated",
                    db.constraint().unwrap_or("unknown")
                ));
            }
        }
        StoreError::Database(err)
    }
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Outcome of a conditional stock write
#[derive(Debug, Clone, PartialEq)]
pub enum StockWrite {
    /// Write applied; carries the product with its new stock
    Applied(Product),
    /// Refused because stock would drop below zero
    WouldGoNegative { available: i64 },
    UnknownProduct,
}

/// Filters for `GET /orders`
#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            status: None,
            payment_status: None,
            search: None,
            page: 1,
            limit: 20,
        }
    }
}

impl OrderFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    pub fn matches(&self, order: &Order) -> bool {
        if self.status.is_some_and(|s| s != order.status) {
            return false;
        }
        if self.payment_status.is_some_and(|s| s != order.payment_status) {
            return false;
        }
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                order.order_number.to_lowercase().contains(&term)
                    || order.customer.name.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: u64,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Newest first
    async fn list_orders(&self, filter: &OrderFilter) -> Result<OrderPage, StoreError>;

    async fn all_orders(&self) -> Result<Vec<Order>, StoreError>;
}

#[async_trait]
pub trait StoreTx: Send {
    async fn product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError>;

    /// Add `delta` to the product's stock unless the result would be negative
    async fn adjust_stock(&mut self, id: Uuid, delta: i64) -> Result<StockWrite, StoreError>;

    /// Load and lock one order for the rest of the transaction
    async fn order_for_update(&mut self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Load and lock every order present when the call runs
    async fn orders_for_update(&mut self) -> Result<Vec<Order>, StoreError>;

    async fn order_number_exists(&mut self, order_number: &str) -> Result<bool, StoreError>;

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

    /// Fails with `Conflict` if the stored version is not `expected_version`
    async fn update_order(&mut self, order: &Order, expected_version: i64) -> Result<(), StoreError>;

    async fn delete_order(&mut self, id: Uuid) -> Result<bool, StoreError>;

    /// Delete exactly the listed orders; rows created after they were locked survive
    async fn delete_orders(&mut self, ids: &[Uuid]) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Latest committed state of a product, read outside any transaction
    async fn current_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn active_alerts(&self, product_id: Uuid) -> Result<Vec<StockAlert>, StoreError>;

    /// Returns false when an active alert of the same product and type exists
    async fn insert_alert(&self, alert: &StockAlert) -> Result<bool, StoreError>;

    async fn resolve_alert(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Newest first
    async fn list_alerts(&self, status: Option<AlertStatus>) -> Result<Vec<StockAlert>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::tests::sample_order;

    #[test]
    fn test_filter_offset() {
        let filter = OrderFilter {
            page: 3,
            limit: 20,
            ..Default::default()
        };
        assert_eq!(filter.offset(), 40);
        assert_eq!(OrderFilter::default().offset(), 0);
    }

    #[test]
    fn test_filter_search_is_case_insensitive() {
        let order = sample_order(vec![]);
        let filter = OrderFilter {
            search: Some("asha".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&order));

        let filter = OrderFilter {
            search: Some("abc123".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&order));

        let filter = OrderFilter {
            status: Some(OrderStatus::Shipped),
            ..Default::default()
        };
        assert!(!filter.matches(&order));
    }

    #[test]
    fn test_only_conflicts_are_transient() {
        assert!(StoreError::Conflict("x".into()).is_transient());
        assert!(!StoreError::Corrupt("x".into()).is_transient());
        assert!(!StoreError::from(sqlx::Error::RowNotFound).is_transient());
    }
}
