use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::order::Order;
use crate::models::{AlertStatus, Product, StockAlert};
use super::{AlertStore, OrderFilter, OrderPage, StockWrite, Store, StoreError, StoreTx};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// A transaction holds the state lock for its whole lifetime, so units of
// work are fully serialized. Writes go to a working copy that replaces the
// shared state only on commit.
//
// ============================================================================

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    alerts: Arc<Mutex<Vec<StockAlert>>>,
    injected_conflicts: Arc<AtomicU32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let state = MemoryState {
            products: products.into_iter().map(|p| (p.id, p)).collect(),
            orders: HashMap::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            ..Self::default()
        }
    }

    pub async fn upsert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn get_product(&self, id: Uuid) -> Option<Product> {
        self.state.lock().await.products.get(&id).cloned()
    }

    pub async fn product_count(&self) -> usize {
        self.state.lock().await.products.len()
    }

    /// Make the next `n` commits fail with `Conflict`
    #[cfg(test)]
    pub fn inject_conflicts(&self, n: u32) {
        self.injected_conflicts.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            injected_conflicts: self.injected_conflicts.clone(),
        }))
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<OrderPage, StoreError> {
        let state = self.state.lock().await;
        let mut matching: Vec<&Order> = state.orders.values().filter(|o| filter.matches(o)).collect();
        matching.sort_by(|a, b| b.order_date.cmp(&a.order_date).then_with(|| b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let orders = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect();

        Ok(OrderPage { orders, total })
    }

    async fn all_orders(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self.state.lock().await.orders.values().cloned().collect())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    injected_conflicts: Arc<AtomicU32>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn adjust_stock(&mut self, id: Uuid, delta: i64) -> Result<StockWrite, StoreError> {
        let Some(product) = self.working.products.get_mut(&id) else {
            return Ok(StockWrite::UnknownProduct);
        };

        let next = product.stock + delta;
        if next < 0 {
            return Ok(StockWrite::WouldGoNegative {
                available: product.stock,
            });
        }

        product.stock = next;
        Ok(StockWrite::Applied(product.clone()))
    }

    async fn order_for_update(&mut self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn orders_for_update(&mut self) -> Result<Vec<Order>, StoreError> {
        Ok(self.working.orders.values().cloned().collect())
    }

    async fn order_number_exists(&mut self, order_number: &str) -> Result<bool, StoreError> {
        Ok(self
            .working
            .orders
            .values()
            .any(|o| o.order_number == order_number))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        if self.working.orders.contains_key(&order.id) {
            return Err(StoreError::Conflict(format!("order {} already exists", order.id)));
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order, expected_version: i64) -> Result<(), StoreError> {
        match self.working.orders.get_mut(&order.id) {
            Some(existing) if existing.version == expected_version => {
                *existing = order.clone();
                Ok(())
            }
            Some(existing) => Err(StoreError::Conflict(format!(
                "order {} is at version {}, expected {}",
                order.id, existing.version, expected_version
            ))),
            None => Err(StoreError::Conflict(format!("order {} no longer exists", order.id))),
        }
    }

    async fn delete_order(&mut self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.working.orders.remove(&id).is_some())
    }

    async fn delete_orders(&mut self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let mut count = 0;
        for id in ids {
            if self.working.orders.remove(id).is_some() {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx {
            mut guard,
            working,
            injected_conflicts,
        } = *self;

        if injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Conflict("injected conflict".to_string()));
        }

        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn current_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.get_product(id).await)
    }

    async fn active_alerts(&self, product_id: Uuid) -> Result<Vec<StockAlert>, StoreError> {
        Ok(self
            .alerts
            .lock()
            .await
            .iter()
            .filter(|a| a.product_id == product_id && a.status == AlertStatus::Active)
            .cloned()
            .collect())
    }

    async fn insert_alert(&self, alert: &StockAlert) -> Result<bool, StoreError> {
        let mut alerts = self.alerts.lock().await;
        let duplicate = alerts.iter().any(|a| {
            a.product_id == alert.product_id
                && a.alert_type == alert.alert_type
                && a.status == AlertStatus::Active
        });
        if duplicate {
            return Ok(false);
        }
        alerts.push(alert.clone());
        Ok(true)
    }

    async fn resolve_alert(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut alerts = self.alerts.lock().await;
        match alerts
            .iter_mut()
            .find(|a| a.id == id && a.status == AlertStatus::Active)
        {
            Some(alert) => {
                alert.status = AlertStatus::Resolved;
                alert.resolved_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_alerts(&self, status: Option<AlertStatus>) -> Result<Vec<StockAlert>, StoreError> {
        let alerts = self.alerts.lock().await;
        let mut listed: Vec<StockAlert> = alerts
            .iter()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }
}
