use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Catalog & Alert Models
// ============================================================================
//
// Records owned by collaborators outside the order core. The core reads the
// product's price/GST/name and treats `stock` as a counter it may move, but
// never edits anything else.
//
// ============================================================================

/// Catalog product as seen by the order core
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub gst_rate: Decimal,
    pub stock: i64,
}

/// Stock thresholds served by the Settings collaborator
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub low_stock: i64,
    pub out_of_stock: i64,
    pub low_stock_alerts: bool,
    pub out_of_stock_alerts: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low_stock: 10,
            out_of_stock: 0,
            low_stock_alerts: true,
            out_of_stock_alerts: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AlertType {
    LowStock,
    OutOfStock,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LowStock => "low-stock",
            AlertType::OutOfStock => "out-of-stock",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low-stock" => Some(AlertType::LowStock),
            "out-of-stock" => Some(AlertType::OutOfStock),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(AlertStatus::Active),
            "resolved" => Some(AlertStatus::Resolved),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Medium,
    High,
    Critical,
}

impl AlertPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertPriority::Medium => "medium",
            AlertPriority::High => "high",
            AlertPriority::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "medium" => Some(AlertPriority::Medium),
            "high" => Some(AlertPriority::High),
            "critical" => Some(AlertPriority::Critical),
            _ => None,
        }
    }
}

/// Threshold alert for one product
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockAlert {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub alert_type: AlertType,
    pub priority: AlertPriority,
    pub threshold: i64,
    pub current_stock: i64,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_type_wire_names() {
        let json = serde_json::to_string(&AlertType::OutOfStock).unwrap();
        assert_eq!(json, "\"out-of-stock\"");
        assert_eq!(AlertType::parse("low-stock"), Some(AlertType::LowStock));
        assert_eq!(AlertType::parse("LOW"), None);
    }

    #[test]
    fn test_product_deserializes_from_catalog_json() {
        let json = r#"{
            "id": "7f8c7c2e-8a5e-4a7b-9a64-6f1e8f4d2b10",
            "name": "Widget",
            "price": 100.5,
            "gstRate": 18,
            "stock": 5
        }"#;

        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.name, "Widget");
        assert_eq!(product.price, Decimal::new(1005, 1));
        assert_eq!(product.stock, 5);
    }

    #[test]
    fn test_default_thresholds() {
        let thresholds = Thresholds::default();
        assert_eq!(thresholds.low_stock, 10);
        assert_eq!(thresholds.out_of_stock, 0);
        assert!(thresholds.low_stock_alerts && thresholds.out_of_stock_alerts);
    }
}
