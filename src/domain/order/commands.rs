use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::value_objects::{Customer, OrderItemInput, OrderStatus, PaymentMethod, PaymentStatus};

// ============================================================================
// Order Commands - Represent client intent
// ============================================================================

/// Body of `POST /orders`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub customer: Customer,
    #[serde(default)]
    pub items: Vec<OrderItemInput>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub shipping_charges: Option<Decimal>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub expected_delivery_date: Option<DateTime<Utc>>,
}

impl CreateOrder {
    /// Every problem with the request, in field order
    pub fn problems(&self) -> Vec<String> {
        let mut problems = self.customer.problems();

        if self.items.is_empty() {
            problems.push("order must contain at least one item".to_string());
        }
        for (index, item) in self.items.iter().enumerate() {
            problems.extend(item.problems(index));
        }

        match self.payment_method.as_deref() {
            None => problems.push("payment method is required".to_string()),
            Some(method) if PaymentMethod::parse(method).is_none() => {
                problems.push(format!("invalid payment method: {}", method))
            }
            Some(_) => {}
        }

        problems.extend(charge_problems(self.shipping_charges, self.discount));
        problems
    }
}

/// Body of `PUT /orders/:id`. Absent fields are left untouched; an empty
/// string clears an optional text field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    #[serde(default)]
    pub customer: Option<Customer>,
    #[serde(default)]
    pub items: Option<Vec<OrderItemInput>>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub shipping_charges: Option<Decimal>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub expected_delivery_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub refund_amount: Option<Decimal>,
    #[serde(default)]
    pub refund_reason: Option<String>,
}

impl OrderPatch {
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if let Some(customer) = &self.customer {
            problems.extend(customer.problems());
        }
        if let Some(items) = &self.items {
            if items.is_empty() {
                problems.push("order must contain at least one item".to_string());
            }
            for (index, item) in items.iter().enumerate() {
                problems.extend(item.problems(index));
            }
        }
        if let Some(method) = &self.payment_method {
            if PaymentMethod::parse(method).is_none() {
                problems.push(format!("invalid payment method: {}", method));
            }
        }
        if let Some(refund) = self.refund_amount {
            if refund < Decimal::ZERO {
                problems.push("refund amount must not be negative".to_string());
            }
        }

        problems.extend(charge_problems(self.shipping_charges, self.discount));
        problems
    }
}

/// Body of `DELETE /orders`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAllOrders {
    #[serde(default)]
    pub confirm_delete_all: bool,
}

fn charge_problems(shipping: Option<Decimal>, discount: Option<Decimal>) -> Vec<String> {
    let mut problems = Vec::new();
    if let Some(shipping) = shipping {
        if shipping < Decimal::ZERO {
            problems.push("shipping charges must not be negative".to_string());
        }
    }
    if let Some(discount) = discount {
        if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
            problems.push("discount must be between 0 and 100".to_string());
        }
    }
    problems
}

/// Trim an optional text field; `Some("")` means "clear"
pub(crate) fn text_update(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_order_deserializes_client_body() {
        let body = json!({
            "customer": { "name": "Asha", "email": "asha@example.com" },
            "items": [
                { "product": "7f8c7c2e-8a5e-4a7b-9a64-6f1e8f4d2b10", "quantity": 2, "unitPrice": 100 }
            ],
            "paymentMethod": "upi",
            "shippingCharges": 20,
            "discount": 10
        });

        let cmd: CreateOrder = serde_json::from_value(body).unwrap();

        assert_eq!(cmd.items.len(), 1);
        assert_eq!(cmd.items[0].unit_price, Some(Decimal::new(100, 0)));
        assert_eq!(cmd.items[0].gst_rate, None);
        assert!(cmd.problems().is_empty());
    }

    #[test]
    fn test_create_order_collects_all_problems() {
        let cmd = CreateOrder {
            customer: Customer {
                name: "".to_string(),
                email: None,
                phone: None,
                address: None,
            },
            items: vec![],
            payment_method: Some("barter".to_string()),
            shipping_charges: Some(Decimal::new(-1, 0)),
            discount: Some(Decimal::new(150, 0)),
            notes: None,
            expected_delivery_date: None,
        };

        let problems = cmd.problems();
        assert_eq!(problems.len(), 5, "{problems:?}");
    }

    #[test]
    fn test_patch_ignores_client_totals() {
        let patch: OrderPatch = serde_json::from_value(json!({
            "status": "shipped",
            "totalAmount": 1,
            "subtotal": 1
        }))
        .unwrap();

        assert_eq!(patch.status, Some(OrderStatus::Shipped));
        assert!(patch.problems().is_empty());
    }

    #[test]
    fn test_patch_rejects_empty_item_list() {
        let patch = OrderPatch {
            items: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(patch.problems(), vec!["order must contain at least one item".to_string()]);
    }

    #[test]
    fn test_text_update() {
        assert_eq!(text_update(None), None);
        assert_eq!(text_update(Some("  ".into())), Some(None));
        assert_eq!(text_update(Some(" 1Z99 ".into())), Some(Some("1Z99".to_string())));
    }

    #[test]
    fn test_delete_all_defaults_to_unconfirmed() {
        let body: DeleteAllOrders = serde_json::from_value(json!({})).unwrap();
        assert!(!body.confirm_delete_all);
    }
}
