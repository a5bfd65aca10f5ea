use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Settings;
use crate::messaging::{Notification, Notifier};
use crate::metrics::Metrics;
use crate::models::{AlertPriority, AlertStatus, AlertType, Product, StockAlert, Thresholds};
use crate::store::{AlertStore, StoreError};

// ============================================================================
// Stock Alert Evaluator
// ============================================================================
//
// Runs after a stock movement has committed, against a fresh read of the
// product rather than the transaction's snapshot. Raises at most one active alert
// per product and type; any active alert whose threshold the new stock now
// exceeds is resolved.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AlertEvent {
    #[serde(rename = "stock.alert_raised")]
    Raised(StockAlert),
    #[serde(rename = "stock.alert_resolved")]
    Resolved(StockAlert),
}

impl AlertEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            AlertEvent::Raised(_) => "stock.alert_raised",
            AlertEvent::Resolved(_) => "stock.alert_resolved",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertOutcome {
    pub raised: Option<StockAlert>,
    pub resolved: Vec<StockAlert>,
}

impl AlertOutcome {
    pub fn is_none(&self) -> bool {
        self.raised.is_none() && self.resolved.is_empty()
    }
}

/// Which alert, if any, a stock level calls for
pub fn classify(stock: i64, thresholds: &Thresholds) -> Option<(AlertType, AlertPriority, i64)> {
    if thresholds.out_of_stock_alerts && stock <= thresholds.out_of_stock {
        return Some((AlertType::OutOfStock, AlertPriority::Critical, thresholds.out_of_stock));
    }
    if thresholds.low_stock_alerts && stock <= thresholds.low_stock {
        let priority = if stock * 2 <= thresholds.low_stock {
            AlertPriority::High
        } else {
            AlertPriority::Medium
        };
        return Some((AlertType::LowStock, priority, thresholds.low_stock));
    }
    None
}

pub struct StockAlertEvaluator {
    alerts: Arc<dyn AlertStore>,
    settings: Arc<dyn Settings>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,
}

impl StockAlertEvaluator {
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        settings: Arc<dyn Settings>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            alerts,
            settings,
            notifier,
            metrics,
        }
    }

    /// Evaluate the product's latest committed stock. `touched` is only used
    /// when the product is no longer in the catalog, so evaluations that finish
    /// out of commit order still judge the current level.
    pub async fn evaluate(&self, touched: &Product) -> Result<AlertOutcome, StoreError> {
        let latest = self.alerts.current_product(touched.id).await?;
        let product = latest.as_ref().unwrap_or(touched);
        let thresholds = self.settings.thresholds().await;
        let now = Utc::now();
        let mut outcome = AlertOutcome::default();

        for alert in self.alerts.active_alerts(product.id).await? {
            if product.stock > alert.threshold && self.alerts.resolve_alert(alert.id, now).await? {
                let resolved = StockAlert {
                    status: AlertStatus::Resolved,
                    resolved_at: Some(now),
                    current_stock: product.stock,
                    ..alert
                };

                tracing::info!(
                    product_id = %product.id,
                    alert_type = resolved.alert_type.as_str(),
                    stock = product.stock,
                    "Stock alert resolved"
                );
                self.metrics.record_alert(resolved.alert_type.as_str(), "resolved");
                self.notifier.emit(Notification::from(AlertEvent::Resolved(resolved.clone())));
                outcome.resolved.push(resolved);
            }
        }

        if let Some((alert_type, priority, threshold)) = classify(product.stock, &thresholds) {
            let alert = StockAlert {
                id: Uuid::new_v4(),
                product_id: product.id,
                product_name: product.name.clone(),
                alert_type,
                priority,
                threshold,
                current_stock: product.stock,
                status: AlertStatus::Active,
                created_at: now,
                resolved_at: None,
            };

            if self.alerts.insert_alert(&alert).await? {
                tracing::warn!(
                    product_id = %product.id,
                    product_name = %product.name,
                    alert_type = alert_type.as_str(),
                    priority = priority.as_str(),
                    stock = product.stock,
                    threshold,
                    "⚠️ Stock alert raised"
                );
                self.metrics.record_alert(alert_type.as_str(), "raised");
                self.notifier.emit(Notification::from(AlertEvent::Raised(alert.clone())));
                outcome.raised = Some(alert);
            } else {
                tracing::debug!(
                    product_id = %product.id,
                    alert_type = alert_type.as_str(),
                    "Active alert already exists"
                );
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticSettings;
    use crate::messaging::tests::RecordingNotifier;
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;

    fn product(stock: i64) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Widget".to_string(),
            price: Decimal::new(100, 0),
            gst_rate: Decimal::new(18, 0),
            stock,
        }
    }

    fn evaluator(thresholds: Thresholds) -> (StockAlertEvaluator, Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let evaluator = StockAlertEvaluator::new(
            store.clone(),
            Arc::new(StaticSettings::new(thresholds)),
            notifier.clone(),
            Arc::new(Metrics::new().unwrap()),
        );
        (evaluator, store, notifier)
    }

    #[test]
    fn test_classify() {
        let t = Thresholds::default();

        assert_eq!(classify(0, &t).map(|c| c.0), Some(AlertType::OutOfStock));
        assert_eq!(classify(0, &t).map(|c| c.1), Some(AlertPriority::Critical));
        assert_eq!(classify(5, &t).map(|c| c.1), Some(AlertPriority::High));
        assert_eq!(classify(6, &t).map(|c| c.1), Some(AlertPriority::Medium));
        assert_eq!(classify(10, &t).map(|c| c.0), Some(AlertType::LowStock));
        assert_eq!(classify(11, &t), None);
    }

    #[test]
    fn test_classify_respects_disabled_alerts() {
        let t = Thresholds {
            out_of_stock_alerts: false,
            ..Thresholds::default()
        };
        // Falls through to the low-stock rule
        assert_eq!(classify(0, &t).map(|c| c.0), Some(AlertType::LowStock));

        let t = Thresholds {
            out_of_stock_alerts: false,
            low_stock_alerts: false,
            ..Thresholds::default()
        };
        assert_eq!(classify(0, &t), None);
    }

    #[tokio::test]
    async fn test_evaluate_is_idempotent() {
        let (evaluator, store, notifier) = evaluator(Thresholds::default());
        let p = product(0);

        let first = evaluator.evaluate(&p).await.unwrap();
        let second = evaluator.evaluate(&p).await.unwrap();

        assert!(first.raised.is_some());
        assert!(second.is_none());
        assert_eq!(store.active_alerts(p.id).await.unwrap().len(), 1);
        assert_eq!(notifier.event_types(), vec!["stock.alert_raised"]);
    }

    #[tokio::test]
    async fn test_restock_resolves_alerts() {
        let (evaluator, store, _notifier) = evaluator(Thresholds::default());
        let mut p = product(0);
        evaluator.evaluate(&p).await.unwrap();

        // 0 -> 4: out-of-stock resolves, low-stock raised
        p.stock = 4;
        let outcome = evaluator.evaluate(&p).await.unwrap();
        assert_eq!(outcome.resolved.len(), 1);
        assert_eq!(outcome.resolved[0].alert_type, AlertType::OutOfStock);
        assert_eq!(outcome.raised.as_ref().map(|a| a.alert_type), Some(AlertType::LowStock));

        // 4 -> 25: everything clears
        p.stock = 25;
        let outcome = evaluator.evaluate(&p).await.unwrap();
        assert_eq!(outcome.resolved.len(), 1);
        assert!(outcome.raised.is_none());
        assert!(store.active_alerts(p.id).await.unwrap().is_empty());
        assert_eq!(store.list_alerts(Some(AlertStatus::Resolved)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_healthy_stock_is_quiet() {
        let (evaluator, _store, notifier) = evaluator(Thresholds::default());

        let outcome = evaluator.evaluate(&product(50)).await.unwrap();

        assert!(outcome.is_none());
        assert!(notifier.event_types().is_empty());
    }

    #[tokio::test]
    async fn test_stale_snapshot_defers_to_current_stock() {
        let restocked = product(20);
        let store = Arc::new(MemoryStore::with_products([restocked.clone()]));
        let notifier = Arc::new(RecordingNotifier::default());
        let evaluator = StockAlertEvaluator::new(
            store.clone(),
            Arc::new(StaticSettings::new(Thresholds::default())),
            notifier.clone(),
            Arc::new(Metrics::new().unwrap()),
        );

        // A slower evaluation still holding the pre-restock level
        let stale = Product {
            stock: 0,
            ..restocked.clone()
        };
        let outcome = evaluator.evaluate(&stale).await.unwrap();

        assert!(outcome.is_none());
        assert!(store.active_alerts(restocked.id).await.unwrap().is_empty());
        assert!(notifier.event_types().is_empty());
    }
}
