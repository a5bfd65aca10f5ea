use uuid::Uuid;

use crate::domain::money::AmountOverflow;
use crate::store::StoreError;
use crate::utils::IsTransient;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },

    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Insufficient stock for {product_name}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: Uuid,
        product_name: String,
        available: i64,
        requested: i64,
    },

    #[error("{0}")]
    InvalidState(String),

    #[error("Cannot change order status from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Transaction failed: {0}")]
    Transaction(#[from] StoreError),
}

impl OrderError {
    pub fn validation(message: impl Into<String>) -> Self {
        OrderError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Build a validation error from collected problems, or `None` if there are none
    pub fn from_problems(problems: Vec<String>) -> Option<Self> {
        match problems.len() {
            0 => None,
            1 => Some(OrderError::validation(problems[0].clone())),
            n => Some(OrderError::Validation {
                message: format!("Validation failed with {} errors", n),
                details: problems,
            }),
        }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::Validation { .. } => "validation",
            OrderError::NotFound(_) => "not_found",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::InvalidState(_) => "invalid_state",
            OrderError::InvalidTransition { .. } => "invalid_transition",
            OrderError::Transaction(_) => "transaction",
        }
    }
}

impl From<AmountOverflow> for OrderError {
    fn from(_: AmountOverflow) -> Self {
        OrderError::validation("order amounts are too large to calculate")
    }
}

impl IsTransient for OrderError {
    fn is_transient(&self) -> bool {
        matches!(self, OrderError::Transaction(StoreError::Conflict(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_names_product_and_quantities() {
        let err = OrderError::InsufficientStock {
            product_id: Uuid::new_v4(),
            product_name: "Widget".to_string(),
            available: 2,
            requested: 5,
        };

        assert_eq!(
            err.to_string(),
            "Insufficient stock for Widget: available 2, requested 5"
        );
    }

    #[test]
    fn test_from_problems() {
        assert!(OrderError::from_problems(vec![]).is_none());

        let single = OrderError::from_problems(vec!["customer name is required".into()]).unwrap();
        assert_eq!(single.to_string(), "customer name is required");

        let many = OrderError::from_problems(vec!["a".into(), "b".into()]).unwrap();
        match many {
            OrderError::Validation { details, .. } => assert_eq!(details.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_only_conflicts_are_transient() {
        assert!(OrderError::Transaction(StoreError::Conflict("version".into())).is_transient());
        assert!(!OrderError::validation("bad").is_transient());
        assert!(!OrderError::Transaction(StoreError::Corrupt("bad row".into())).is_transient());
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = OrderError::InvalidTransition {
            from: OrderStatus::Cancelled,
            to: OrderStatus::Delivered,
        };
        assert_eq!(err.to_string(), "Cannot change order status from cancelled to delivered");
    }
}
