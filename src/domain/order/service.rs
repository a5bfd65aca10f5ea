use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::Settings;
use crate::domain::stock::{StockAlertEvaluator, StockLedger};
use crate::messaging::{Notification, Notifier};
use crate::metrics::Metrics;
use crate::models::{AlertStatus, Product, StockAlert};
use crate::store::{AlertStore, OrderFilter, OrderPage, Store, StoreError, StoreTx};
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

use super::aggregate::{generate_order_number, quantities_by_product, Order};
use super::commands::{text_update, CreateOrder, OrderPatch};
use super::errors::OrderError;
use super::events::{OrderEvent, OrderStatusChanged, OrderSummary, OrdersCleared};
use super::state_machine::{OrderStateMachine, StockAction};
use super::stats::{DeliveryStats, OrderStats};
use super::value_objects::{
    OrderItem, OrderItemInput, OrderStatus, PaymentMethod, PaymentStatus,
};

// ============================================================================
// Order Service
// ============================================================================
//
// Each mutation runs as one store transaction:
//   validate → load/lock → StockLedger → totals → state machine → write → commit
//
// Alert evaluation and notifications happen only after a successful commit,
// once per call, regardless of how many attempts the commit took.
//
// ============================================================================

const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// What a committed unit of work hands to the post-commit phase
struct Committed<T> {
    value: T,
    touched: Vec<Product>,
    reserved_units: i64,
    released_units: i64,
    events: Vec<OrderEvent>,
}

impl<T> Committed<T> {
    fn new(value: T, ledger: StockLedger, events: Vec<OrderEvent>) -> Self {
        Self {
            value,
            touched: ledger.touched().to_vec(),
            reserved_units: ledger.reserved_units(),
            released_units: ledger.released_units(),
            events,
        }
    }
}

pub struct OrderService {
    store: Arc<dyn Store>,
    alerts: Arc<dyn AlertStore>,
    evaluator: StockAlertEvaluator,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn Store>,
        alerts: Arc<dyn AlertStore>,
        settings: Arc<dyn Settings>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<Metrics>,
        retry: RetryConfig,
    ) -> Self {
        let evaluator = StockAlertEvaluator::new(
            alerts.clone(),
            settings,
            notifier.clone(),
            metrics.clone(),
        );
        Self {
            store,
            alerts,
            evaluator,
            notifier,
            metrics,
            retry,
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    pub async fn create_order(&self, cmd: CreateOrder) -> Result<Order, OrderError> {
        let started = Instant::now();
        let result = match OrderError::from_problems(cmd.problems()) {
            Some(err) => Err(err),
            None => self.with_retry("create", || self.try_create(&cmd)).await,
        };
        self.settle("create", started, result).await
    }

    pub async fn update_order(&self, id: Uuid, patch: OrderPatch) -> Result<Order, OrderError> {
        let started = Instant::now();
        let result = match OrderError::from_problems(patch.problems()) {
            Some(err) => Err(err),
            None => self.with_retry("update", || self.try_update(id, &patch)).await,
        };
        self.settle("update", started, result).await
    }

    pub async fn delete_order(&self, id: Uuid) -> Result<(), OrderError> {
        let started = Instant::now();
        let result = self.with_retry("delete", || self.try_delete(id)).await;
        self.settle("delete", started, result).await
    }

    /// Delete every order. Stock held by active orders is returned first.
    pub async fn delete_all_orders(&self, confirm: bool) -> Result<u64, OrderError> {
        let started = Instant::now();
        let result = if confirm {
            self.with_retry("delete_all", || self.try_delete_all()).await
        } else {
            Err(OrderError::validation(
                "confirmDeleteAll must be true to delete all orders",
            ))
        };
        self.settle("delete_all", started, result).await
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_order(&self, id: Uuid) -> Result<Order, OrderError> {
        self.store
            .find_order(id)
            .await?
            .ok_or(OrderError::NotFound(id))
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<OrderPage, OrderError> {
        Ok(self.store.list_orders(filter).await?)
    }

    pub async fn stats(&self) -> Result<OrderStats, OrderError> {
        let orders = self.store.all_orders().await?;
        Ok(OrderStats::from_orders(&orders))
    }

    pub async fn delivery_stats(&self) -> Result<DeliveryStats, OrderError> {
        let orders = self.store.all_orders().await?;
        Ok(DeliveryStats::from_orders(&orders, Utc::now()))
    }

    pub async fn list_alerts(&self, status: Option<AlertStatus>) -> Result<Vec<StockAlert>, OrderError> {
        Ok(self.alerts.list_alerts(status).await?)
    }

    // ========================================================================
    // Units of work
    // ========================================================================

    async fn try_create(&self, cmd: &CreateOrder) -> Result<Committed<Order>, OrderError> {
        let mut tx = self.store.begin().await?;
        let mut ledger = StockLedger::new();
        let now = Utc::now();

        let mut items = Vec::with_capacity(cmd.items.len());
        for input in &cmd.items {
            let product = tx
                .product(input.product)
                .await?
                .ok_or(OrderError::ProductNotFound(input.product))?;
            items.push(OrderItem::new(
                product.id,
                product.name,
                input.quantity,
                input.unit_price.unwrap_or(product.price),
                input.gst_rate.unwrap_or(product.gst_rate),
            )?);
        }

        // Item-array order; the first line that cannot be covered aborts everything
        for item in &items {
            ledger.reserve(tx.as_mut(), item.product, item.quantity).await?;
        }

        let order_number = unique_order_number(tx.as_mut(), now).await?;
        let payment_method = cmd
            .payment_method
            .as_deref()
            .and_then(PaymentMethod::parse)
            .ok_or_else(|| OrderError::validation("payment method is required"))?;

        let mut order = Order {
            id: Uuid::now_v7(),
            order_number,
            version: 1,
            customer: cmd.customer.clone().normalized(),
            items,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method,
            subtotal: Default::default(),
            total_gst: Default::default(),
            shipping_charges: cmd.shipping_charges.unwrap_or_default(),
            discount: cmd.discount.unwrap_or_default(),
            discount_amount: Default::default(),
            total_amount: Default::default(),
            order_date: now,
            expected_delivery_date: cmd.expected_delivery_date,
            delivered_date: None,
            cancelled_date: None,
            cancellation_reason: None,
            refund_date: None,
            refund_amount: None,
            refund_reason: None,
            notes: text_update(cmd.notes.clone()).flatten(),
            tracking_number: None,
            stock_reserved: true,
            updated_at: now,
        };
        order.recalculate_totals()?;

        tx.insert_order(&order).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            items = order.items.len(),
            total = %order.total_amount,
            "✅ Order created"
        );

        let events = vec![OrderEvent::Created(OrderSummary::from(&order))];
        Ok(Committed::new(order, ledger, events))
    }

    async fn try_update(&self, id: Uuid, patch: &OrderPatch) -> Result<Committed<Order>, OrderError> {
        let mut tx = self.store.begin().await?;
        let mut ledger = StockLedger::new();
        let now = Utc::now();

        let mut order = tx
            .order_for_update(id)
            .await?
            .ok_or(OrderError::NotFound(id))?;
        let expected_version = order.version;
        let previous_status = order.status;

        if let Some(inputs) = &patch.items {
            let new_items = price_items(tx.as_mut(), &order.items, inputs).await?;

            if order.stock_reserved {
                let old = order.quantities_by_product();
                let new = quantities_by_product(&new_items);

                if order.status == OrderStatus::Pending {
                    for (product_id, delta) in quantity_deltas(&old, &new) {
                        ledger.net_adjust(tx.as_mut(), product_id, delta).await?;
                    }
                } else {
                    // Goods already left under the old item set
                    ledger.release_all(tx.as_mut(), &old).await?;
                    ledger.reserve_all(tx.as_mut(), &new).await?;
                }
            }

            order.items = new_items;
        }

        apply_fields(&mut order, patch)?;
        order.recalculate_totals()?;

        if let Some(to) = patch.status {
            if let StockAction::ReleaseAll = OrderStateMachine::apply(&mut order, to, now)? {
                ledger.release_all(tx.as_mut(), &order.quantities_by_product()).await?;
            }
        }
        if let Some(payment_status) = patch.payment_status {
            OrderStateMachine::apply_payment(&mut order, payment_status, now);
        }

        if patch.refund_amount.is_some() {
            if let Some(refund) = order.refund_amount {
                if refund > order.total_amount {
                    return Err(OrderError::validation(format!(
                        "refund amount {} exceeds order total {}",
                        refund, order.total_amount
                    )));
                }
            }
        }

        order.version = expected_version + 1;
        order.updated_at = now;
        tx.update_order(&order, expected_version).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            version = order.version,
            status = order.status.as_str(),
            "✅ Order updated"
        );

        let mut events = vec![OrderEvent::Updated(OrderSummary::from(&order))];
        if order.status != previous_status {
            events.push(OrderEvent::StatusChanged(OrderStatusChanged {
                order_id: order.id,
                order_number: order.order_number.clone(),
                from: previous_status,
                to: order.status,
                changed_at: now,
            }));
        }
        Ok(Committed::new(order, ledger, events))
    }

    async fn try_delete(&self, id: Uuid) -> Result<Committed<()>, OrderError> {
        let mut tx = self.store.begin().await?;
        let mut ledger = StockLedger::new();

        let order = tx
            .order_for_update(id)
            .await?
            .ok_or(OrderError::NotFound(id))?;

        if order.status != OrderStatus::Pending {
            return Err(OrderError::InvalidState(
                "Only pending orders can be deleted".to_string(),
            ));
        }

        if order.stock_reserved {
            ledger.release_all(tx.as_mut(), &order.quantities_by_product()).await?;
        }
        tx.delete_order(id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %id, order_number = %order.order_number, "🗑️ Order deleted");

        let events = vec![OrderEvent::Deleted(OrderSummary::from(&order))];
        Ok(Committed::new((), ledger, events))
    }

    async fn try_delete_all(&self) -> Result<Committed<u64>, OrderError> {
        let mut tx = self.store.begin().await?;
        let mut ledger = StockLedger::new();

        let orders = tx.orders_for_update().await?;
        for order in orders.iter().filter(|o| o.status.is_active() && o.stock_reserved) {
            ledger.release_all(tx.as_mut(), &order.quantities_by_product()).await?;
        }

        // Only the locked rows; an order committed since then keeps its reservation
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let deleted_count = tx.delete_orders(&ids).await?;
        tx.commit().await?;

        tracing::warn!(deleted_count, "🗑️ All orders deleted");

        let events = vec![OrderEvent::Cleared(OrdersCleared { deleted_count })];
        Ok(Committed::new(deleted_count, ledger, events))
    }

    // ========================================================================
    // Retry and post-commit
    // ========================================================================

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<Committed<T>, OrderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Committed<T>, OrderError>>,
    {
        let attempts = AtomicU32::new(0);

        let result = retry_on_transient(self.retry.clone(), |n| {
            attempts.store(n, Ordering::Relaxed);
            if n > 1 {
                self.metrics.record_retry_attempt(operation, n);
            }
            attempt()
        })
        .await;

        if attempts.load(Ordering::Relaxed) > 1 {
            self.metrics
                .record_retry_outcome(operation, matches!(result, RetryResult::Success(_)));
        }

        result.into_result()
    }

    async fn settle<T>(
        &self,
        operation: &'static str,
        started: Instant,
        result: Result<Committed<T>, OrderError>,
    ) -> Result<T, OrderError> {
        let elapsed = started.elapsed().as_secs_f64();

        let committed = match result {
            Ok(committed) => committed,
            Err(err) => {
                self.metrics.record_order_operation(operation, err.kind(), elapsed);
                match &err {
                    OrderError::InsufficientStock { .. } => {
                        self.metrics.record_insufficient_stock();
                        tracing::warn!(operation, error = %err, "Order rejected");
                    }
                    OrderError::Transaction(source) => {
                        tracing::error!(operation, error = %source, "Order transaction failed");
                    }
                    _ => tracing::warn!(operation, error = %err, "Order rejected"),
                }
                return Err(err);
            }
        };

        self.metrics.record_order_operation(operation, "success", elapsed);
        self.metrics
            .record_stock_movement(committed.reserved_units, committed.released_units);

        for product in &committed.touched {
            match self.evaluator.evaluate(product).await {
                Ok(outcome) if !outcome.is_none() => tracing::debug!(
                    product_id = %product.id,
                    raised = outcome.raised.is_some(),
                    resolved = outcome.resolved.len(),
                    "Stock alerts updated"
                ),
                Ok(_) => {}
                Err(e) => tracing::error!(
                    product_id = %product.id,
                    error = %e,
                    "Stock alert evaluation failed"
                ),
            }
        }

        for event in committed.events {
            self.notifier.emit(Notification::from(event));
        }

        Ok(committed.value)
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn unique_order_number(tx: &mut dyn StoreTx, now: DateTime<Utc>) -> Result<String, OrderError> {
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let candidate = generate_order_number(now, &mut rand::thread_rng());
        if !tx.order_number_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(OrderError::Transaction(StoreError::Conflict(
        "could not allocate a unique order number".to_string(),
    )))
}

/// Build order lines for an item edit. Products already on the order keep
/// their snapshot name, price and GST unless the client overrides them;
/// new products are priced from the catalog.
async fn price_items(
    tx: &mut dyn StoreTx,
    current: &[OrderItem],
    inputs: &[OrderItemInput],
) -> Result<Vec<OrderItem>, OrderError> {
    let mut items = Vec::with_capacity(inputs.len());

    for input in inputs {
        let item = match current.iter().find(|i| i.product == input.product) {
            Some(existing) => OrderItem::new(
                existing.product,
                existing.product_name.clone(),
                input.quantity,
                input.unit_price.unwrap_or(existing.unit_price),
                input.gst_rate.unwrap_or(existing.gst_rate),
            )?,
            None => {
                let product = tx
                    .product(input.product)
                    .await?
                    .ok_or(OrderError::ProductNotFound(input.product))?;
                OrderItem::new(
                    product.id,
                    product.name,
                    input.quantity,
                    input.unit_price.unwrap_or(product.price),
                    input.gst_rate.unwrap_or(product.gst_rate),
                )?
            }
        };
        items.push(item);
    }

    Ok(items)
}

/// `old - new` per product, for every product on either side
fn quantity_deltas(old: &[(Uuid, i64)], new: &[(Uuid, i64)]) -> Vec<(Uuid, i64)> {
    let quantity_in = |side: &[(Uuid, i64)], product: Uuid| {
        side.iter()
            .find(|(p, _)| *p == product)
            .map_or(0, |(_, q)| *q)
    };

    let mut deltas: Vec<(Uuid, i64)> = old
        .iter()
        .map(|&(product, quantity)| (product, quantity - quantity_in(new, product)))
        .collect();
    deltas.extend(
        new.iter()
            .filter(|(product, _)| !old.iter().any(|(p, _)| p == product))
            .map(|&(product, quantity)| (product, -quantity)),
    );
    deltas.retain(|(_, delta)| *delta != 0);
    deltas
}

/// Plain field writes from a patch; status and payment status are handled
/// by the state machine.
fn apply_fields(order: &mut Order, patch: &OrderPatch) -> Result<(), OrderError> {
    if let Some(customer) = &patch.customer {
        order.customer = customer.clone().normalized();
    }
    if let Some(method) = &patch.payment_method {
        order.payment_method = PaymentMethod::parse(method)
            .ok_or_else(|| OrderError::validation(format!("invalid payment method: {}", method)))?;
    }
    if let Some(shipping) = patch.shipping_charges {
        order.shipping_charges = shipping;
    }
    if let Some(discount) = patch.discount {
        order.discount = discount;
    }
    if let Some(expected) = patch.expected_delivery_date {
        order.expected_delivery_date = Some(expected);
    }
    if let Some(refund) = patch.refund_amount {
        order.refund_amount = Some(refund);
    }
    if let Some(notes) = text_update(patch.notes.clone()) {
        order.notes = notes;
    }
    if let Some(tracking) = text_update(patch.tracking_number.clone()) {
        order.tracking_number = tracking;
    }
    if let Some(reason) = text_update(patch.cancellation_reason.clone()) {
        order.cancellation_reason = reason;
    }
    if let Some(reason) = text_update(patch.refund_reason.clone()) {
        order.refund_reason = reason;
    }
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
