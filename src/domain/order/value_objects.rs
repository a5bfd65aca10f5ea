use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::{self, AmountOverflow, ItemTotals};

// ============================================================================
// Order Value Objects
// ============================================================================

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// Statuses in which the goods are still committed but not yet handed over
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Shipped
        )
    }
}

/// Payment axis, independent of the lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
    NetBanking,
    BankTransfer,
    Cod,
    Wallet,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 7] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::Upi,
        PaymentMethod::NetBanking,
        PaymentMethod::BankTransfer,
        PaymentMethod::Cod,
        PaymentMethod::Wallet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::NetBanking => "net_banking",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cod => "cod",
            PaymentMethod::Wallet => "wallet",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|m| m.as_str() == value)
    }
}

/// Customer details captured on the order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Customer {
    /// Collect every problem with the customer block
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("customer name is required".to_string());
        }
        if let Some(email) = &self.email {
            if !is_valid_email(email) {
                problems.push(format!("invalid customer email: {}", email));
            }
        }
        if let Some(phone) = &self.phone {
            if !is_valid_phone(phone) {
                problems.push(format!("invalid customer phone: {}", phone));
            }
        }

        problems
    }

    /// Trim whitespace and drop empty optional fields
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            name: self.name.trim().to_string(),
            email: clean(self.email),
            phone: clean(self.phone),
            address: clean(self.address),
        }
    }
}

fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        _ => false,
    }
}

fn is_valid_phone(phone: &str) -> bool {
    let trimmed = phone.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if body
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')')))
    {
        return false;
    }
    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    (7..=15).contains(&digits)
}

/// One order line. Price fields are derived and always recomputed from
/// quantity, unit price and GST rate.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product: Uuid,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub gst_rate: Decimal,
    pub total_price: Decimal,
    pub gst_amount: Decimal,
    pub final_price: Decimal,
}

impl OrderItem {
    pub fn new(
        product: Uuid,
        product_name: impl Into<String>,
        quantity: i64,
        unit_price: Decimal,
        gst_rate: Decimal,
    ) -> Result<Self, AmountOverflow> {
        let totals = money::item_totals(quantity, unit_price, gst_rate)?;
        Ok(Self {
            product,
            product_name: product_name.into(),
            quantity,
            unit_price,
            gst_rate,
            total_price: totals.total_price,
            gst_amount: totals.gst_amount,
            final_price: totals.final_price,
        })
    }

    pub fn totals(&self) -> ItemTotals {
        ItemTotals {
            total_price: self.total_price,
            gst_amount: self.gst_amount,
            final_price: self.final_price,
        }
    }

    /// Re-derive price fields from the inputs
    pub fn recompute(&mut self) -> Result<(), AmountOverflow> {
        let totals = money::item_totals(self.quantity, self.unit_price, self.gst_rate)?;
        self.total_price = totals.total_price;
        self.gst_amount = totals.gst_amount;
        self.final_price = totals.final_price;
        Ok(())
    }
}

/// Upper bounds on client-supplied lines
pub const MAX_ITEM_QUANTITY: i64 = 1_000_000;
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000;

/// Client-supplied order line
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
    pub product: Uuid,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub gst_rate: Option<Decimal>,
}

impl OrderItemInput {
    pub fn problems(&self, index: usize) -> Vec<String> {
        let mut problems = Vec::new();

        if !(1..=MAX_ITEM_QUANTITY).contains(&self.quantity) {
            problems.push(format!(
                "items[{}]: quantity must be between 1 and {}, got {}",
                index, MAX_ITEM_QUANTITY, self.quantity
            ));
        }
        if let Some(price) = self.unit_price {
            if price < Decimal::ZERO || price > Decimal::from(MAX_UNIT_PRICE) {
                problems.push(format!(
                    "items[{}]: unit price must be between 0 and {}",
                    index, MAX_UNIT_PRICE
                ));
            }
        }
        if let Some(rate) = self.gst_rate {
            if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
                problems.push(format!("items[{}]: GST rate must be between 0 and 100", index));
            }
        }

        problems
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(name: &str) -> Customer {
        Customer {
            name: name.to_string(),
            email: None,
            phone: None,
            address: None,
        }
    }

    #[test]
    fn test_order_status_wire_format() {
        let json = serde_json::to_string(&OrderStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");

        let parsed: OrderStatus = serde_json::from_str("\"shipped\"").unwrap();
        assert_eq!(parsed, OrderStatus::Shipped);
        assert!(serde_json::from_str::<OrderStatus>("\"lost\"").is_err());
    }

    #[test]
    fn test_active_statuses() {
        assert!(OrderStatus::Pending.is_active());
        assert!(OrderStatus::Shipped.is_active());
        assert!(!OrderStatus::Delivered.is_active());
        assert!(!OrderStatus::Cancelled.is_active());
        assert!(!OrderStatus::Refunded.is_active());
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!(PaymentMethod::parse("UPI"), Some(PaymentMethod::Upi));
        assert_eq!(PaymentMethod::parse(" bank_transfer "), Some(PaymentMethod::BankTransfer));
        assert_eq!(PaymentMethod::parse("barter"), None);
    }

    #[test]
    fn test_customer_requires_name() {
        assert_eq!(customer("  ").problems().len(), 1);
        assert!(customer("Asha").problems().is_empty());
    }

    #[test]
    fn test_customer_contact_validation() {
        let mut c = customer("Asha");
        c.email = Some("asha@example.com".to_string());
        c.phone = Some("+91 98765-43210".to_string());
        assert!(c.problems().is_empty());

        c.email = Some("asha.example.com".to_string());
        c.phone = Some("12ab".to_string());
        assert_eq!(c.problems().len(), 2);
    }

    #[test]
    fn test_customer_normalized_drops_blank_fields() {
        let c = Customer {
            name: "  Ravi ".to_string(),
            email: Some("   ".to_string()),
            phone: None,
            address: Some(" 12 MG Road ".to_string()),
        }
        .normalized();

        assert_eq!(c.name, "Ravi");
        assert_eq!(c.email, None);
        assert_eq!(c.address.as_deref(), Some("12 MG Road"));
    }

    #[test]
    fn test_order_item_derives_prices() {
        let item = OrderItem::new(Uuid::new_v4(), "Widget", 2, Decimal::new(100, 0), Decimal::new(18, 0)).unwrap();

        assert_eq!(item.total_price, Decimal::new(200, 0));
        assert_eq!(item.gst_amount, Decimal::new(36, 0));
        assert_eq!(item.final_price, Decimal::new(236, 0));
    }

    #[test]
    fn test_order_item_recompute_ignores_stale_figures() {
        let mut item = OrderItem::new(Uuid::new_v4(), "Widget", 2, Decimal::new(100, 0), Decimal::ZERO).unwrap();
        item.quantity = 3;
        item.total_price = Decimal::new(1, 0);
        item.recompute().unwrap();

        assert_eq!(item.total_price, Decimal::new(300, 0));
    }

    #[test]
    fn test_item_input_problems() {
        let input = OrderItemInput {
            product: Uuid::new_v4(),
            quantity: 0,
            unit_price: Some(Decimal::new(-5, 0)),
            gst_rate: Some(Decimal::new(101, 0)),
        };

        assert_eq!(input.problems(0).len(), 3);
    }

    #[test]
    fn test_item_input_rejects_amounts_past_the_bounds() {
        let input = OrderItemInput {
            product: Uuid::new_v4(),
            quantity: i64::MAX,
            unit_price: Some(Decimal::from(10_000_000_000_i64)),
            gst_rate: None,
        };
        assert_eq!(input.problems(0).len(), 2);

        let at_limit = OrderItemInput {
            product: Uuid::new_v4(),
            quantity: MAX_ITEM_QUANTITY,
            unit_price: Some(Decimal::from(MAX_UNIT_PRICE)),
            gst_rate: Some(Decimal::ONE_HUNDRED),
        };
        assert!(at_limit.problems(0).is_empty());
    }
}
