use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::money::round2;
use super::aggregate::Order;
use super::value_objects::{OrderStatus, PaymentStatus};

// ============================================================================
// Order Statistics (read side)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: u64,
    pub by_status: BTreeMap<&'static str, u64>,
    pub by_payment_status: BTreeMap<&'static str, u64>,
    /// Sum of totals, excluding cancelled and refunded orders
    pub total_revenue: Decimal,
    pub average_order_value: Decimal,
    /// Unpaid totals of orders that are not cancelled
    pub pending_amount: Decimal,
}

impl OrderStats {
    pub fn from_orders(orders: &[Order]) -> Self {
        let mut by_status: BTreeMap<&'static str, u64> =
            OrderStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        let mut by_payment_status: BTreeMap<&'static str, u64> =
            PaymentStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();

        let mut total_revenue = Decimal::ZERO;
        let mut revenue_orders: u64 = 0;
        let mut pending_amount = Decimal::ZERO;

        for order in orders {
            *by_status.entry(order.status.as_str()).or_default() += 1;
            *by_payment_status.entry(order.payment_status.as_str()).or_default() += 1;

            if !matches!(order.status, OrderStatus::Cancelled | OrderStatus::Refunded) {
                total_revenue += order.total_amount;
                revenue_orders += 1;
            }
            if order.payment_status == PaymentStatus::Pending && order.status != OrderStatus::Cancelled {
                pending_amount += order.total_amount;
            }
        }

        let average_order_value = if revenue_orders == 0 {
            Decimal::ZERO
        } else {
            round2(total_revenue / Decimal::from(revenue_orders))
        };

        Self {
            total_orders: orders.len() as u64,
            by_status,
            by_payment_status,
            total_revenue: round2(total_revenue),
            average_order_value,
            pending_amount: round2(pending_amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStats {
    pub delivered: u64,
    /// Processing plus shipped
    pub in_transit: u64,
    pub on_time: u64,
    pub late: u64,
    pub overdue: u64,
    pub average_delivery_days: Decimal,
}

impl DeliveryStats {
    pub fn from_orders(orders: &[Order], now: DateTime<Utc>) -> Self {
        let mut stats = DeliveryStats {
            delivered: 0,
            in_transit: 0,
            on_time: 0,
            late: 0,
            overdue: 0,
            average_delivery_days: Decimal::ZERO,
        };
        let mut delivery_seconds: i64 = 0;
        let mut timed_deliveries: i64 = 0;

        for order in orders {
            match order.status {
                OrderStatus::Processing | OrderStatus::Shipped => stats.in_transit += 1,
                OrderStatus::Delivered => stats.delivered += 1,
                _ => {}
            }

            if order.status == OrderStatus::Delivered {
                if let Some(delivered) = order.delivered_date {
                    match order.expected_delivery_date {
                        Some(expected) if delivered.date_naive() > expected.date_naive() => {
                            stats.late += 1
                        }
                        _ => stats.on_time += 1,
                    }
                    delivery_seconds += (delivered - order.order_date).num_seconds().max(0);
                    timed_deliveries += 1;
                }
            } else if order.status.is_active()
                && order.expected_delivery_date.is_some_and(|expected| expected < now)
            {
                stats.overdue += 1;
            }
        }

        if timed_deliveries > 0 {
            let days = Decimal::from(delivery_seconds)
                / Decimal::from(86_400)
                / Decimal::from(timed_deliveries);
            stats.average_delivery_days = round2(days);
        }

        stats
    }
}
