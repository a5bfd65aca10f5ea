use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::{self, AmountOverflow, ItemTotals};
use super::value_objects::{Customer, OrderItem, OrderStatus, PaymentMethod, PaymentStatus};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// Monetary fields are derived: they are only ever written by
// `recalculate_totals`, which the service calls before every persisted write.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub order_number: String,
    pub version: i64,

    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,

    // Money (derived, except shipping and discount percent)
    pub subtotal: Decimal,
    pub total_gst: Decimal,
    pub shipping_charges: Decimal,
    pub discount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,

    // Lifecycle
    pub order_date: DateTime<Utc>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub delivered_date: Option<DateTime<Utc>>,
    pub cancelled_date: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub refund_date: Option<DateTime<Utc>>,
    pub refund_amount: Option<Decimal>,
    pub refund_reason: Option<String>,

    // Optional fields
    pub notes: Option<String>,
    pub tracking_number: Option<String>,

    /// Whether the item quantities are currently deducted from stock
    pub stock_reserved: bool,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Re-derive every line and the order totals from scratch
    pub fn recalculate_totals(&mut self) -> Result<(), AmountOverflow> {
        for item in &mut self.items {
            item.recompute()?;
        }

        let lines: Vec<ItemTotals> = self.items.iter().map(OrderItem::totals).collect();
        let totals = money::order_totals(&lines, self.shipping_charges, self.discount)?;

        self.subtotal = totals.subtotal;
        self.total_gst = totals.total_gst;
        self.discount_amount = totals.discount_amount;
        self.total_amount = totals.total_amount;
        Ok(())
    }

    /// `totalAmount == round2(subtotal + totalGst + shipping - discountAmount)`
    pub fn totals_consistent(&self) -> bool {
        let expected = self
            .subtotal
            .checked_add(self.total_gst)
            .and_then(|v| v.checked_add(self.shipping_charges))
            .and_then(|v| v.checked_sub(self.discount_amount))
            .map(money::round2);
        match expected.and_then(|e| self.total_amount.checked_sub(e)) {
            Some(diff) => diff.abs() <= Decimal::new(1, 2),
            None => false,
        }
    }

    pub fn quantities_by_product(&self) -> Vec<(Uuid, i64)> {
        quantities_by_product(&self.items)
    }
}

/// Sum quantities per product, keeping first-appearance order
pub fn quantities_by_product(items: &[OrderItem]) -> Vec<(Uuid, i64)> {
    let mut totals: Vec<(Uuid, i64)> = Vec::new();
    for item in items {
        match totals.iter_mut().find(|(product, _)| *product == item.product) {
            Some((_, quantity)) => *quantity += item.quantity,
            None => totals.push((item.product, item.quantity)),
        }
    }
    totals
}

/// `ORD-YYYYMMDD-XXXXXX`
pub fn generate_order_number<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = rng
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    pub(crate) fn sample_order(items: Vec<OrderItem>) -> Order {
        let now = Utc::now();
        let mut order = Order {
            id: Uuid::now_v7(),
            order_number: "ORD-20260101-ABC123".to_string(),
            version: 1,
            customer: Customer {
                name: "Asha".to_string(),
                email: None,
                phone: None,
                address: None,
            },
            items,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Cash,
            subtotal: Decimal::ZERO,
            total_gst: Decimal::ZERO,
            shipping_charges: Decimal::ZERO,
            discount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            order_date: now,
            expected_delivery_date: None,
            delivered_date: None,
            cancelled_date: None,
            cancellation_reason: None,
            refund_date: None,
            refund_amount: None,
            refund_reason: None,
            notes: None,
            tracking_number: None,
            stock_reserved: true,
            updated_at: now,
        };
        order.recalculate_totals().unwrap();
        order
    }

    #[test]
    fn test_recalculate_totals_with_shipping_and_discount() {
        let mut order = sample_order(vec![
            OrderItem::new(Uuid::new_v4(), "A", 2, Decimal::new(100, 0), Decimal::new(18, 0)).unwrap(),
            OrderItem::new(Uuid::new_v4(), "B", 1, Decimal::new(50, 0), Decimal::new(18, 0)).unwrap(),
        ]);
        order.shipping_charges = Decimal::new(20, 0);
        order.discount = Decimal::new(10, 0);
        order.recalculate_totals().unwrap();

        assert_eq!(order.subtotal, Decimal::new(250, 0));
        assert_eq!(order.total_gst, Decimal::new(45, 0));
        assert_eq!(order.discount_amount, Decimal::new(295, 1));
        assert_eq!(order.total_amount, Decimal::new(2855, 1));
        assert!(order.totals_consistent());
    }

    #[test]
    fn test_client_supplied_totals_are_overwritten() {
        let mut order = sample_order(vec![OrderItem::new(
            Uuid::new_v4(),
            "A",
            1,
            Decimal::new(10, 0),
            Decimal::ZERO,
        )
        .unwrap()]);
        order.total_amount = Decimal::new(1, 0);
        order.items[0].final_price = Decimal::new(999, 0);

        order.recalculate_totals().unwrap();

        assert_eq!(order.items[0].final_price, Decimal::new(10, 0));
        assert_eq!(order.total_amount, Decimal::new(10, 0));
    }

    #[test]
    fn test_recalculate_totals_reports_overflow() {
        let mut order = sample_order(Vec::new());
        order.items = vec![OrderItem {
            product: Uuid::new_v4(),
            product_name: "A".to_string(),
            quantity: i64::MAX,
            unit_price: Decimal::from(10_000_000_000_i64),
            gst_rate: Decimal::ZERO,
            total_price: Decimal::ZERO,
            gst_amount: Decimal::ZERO,
            final_price: Decimal::ZERO,
        }];

        assert_eq!(order.recalculate_totals(), Err(AmountOverflow));

        order.subtotal = Decimal::MAX;
        order.total_gst = Decimal::MAX;
        assert!(!order.totals_consistent());
    }

    #[test]
    fn test_quantities_by_product_merges_duplicate_lines() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let items = vec![
            OrderItem::new(a, "A", 2, Decimal::ONE, Decimal::ZERO).unwrap(),
            OrderItem::new(b, "B", 1, Decimal::ONE, Decimal::ZERO).unwrap(),
            OrderItem::new(a, "A", 3, Decimal::ONE, Decimal::ZERO).unwrap(),
        ];

        assert_eq!(quantities_by_product(&items), vec![(a, 5), (b, 1)]);
    }

    #[test]
    fn test_order_number_format() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();

        let number = generate_order_number(now, &mut rng);

        assert!(number.starts_with("ORD-20260309-"));
        let suffix = number.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_order_serializes_camel_case() {
        let order = sample_order(vec![]);
        let json = serde_json::to_value(&order).unwrap();

        assert!(json.get("orderNumber").is_some());
        assert!(json.get("totalAmount").is_some());
        assert!(json.get("stockReserved").is_some());
        assert_eq!(json["status"], "pending");
    }
}
