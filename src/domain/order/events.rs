use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::aggregate::Order;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Events - emitted after a mutation commits
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    #[serde(rename = "order.created")]
    Created(OrderSummary),
    #[serde(rename = "order.updated")]
    Updated(OrderSummary),
    #[serde(rename = "order.status_changed")]
    StatusChanged(OrderStatusChanged),
    #[serde(rename = "order.deleted")]
    Deleted(OrderSummary),
    #[serde(rename = "orders.cleared")]
    Cleared(OrdersCleared),
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "order.created",
            OrderEvent::Updated(_) => "order.updated",
            OrderEvent::StatusChanged(_) => "order.status_changed",
            OrderEvent::Deleted(_) => "order.deleted",
            OrderEvent::Cleared(_) => "orders.cleared",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub status: OrderStatus,
    pub total_amount: Decimal,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number.clone(),
            customer_name: order.customer.name.clone(),
            status: order.status,
            total_amount: order.total_amount,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusChanged {
    pub order_id: Uuid,
    pub order_number: String,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrdersCleared {
    pub deleted_count: u64,
}
