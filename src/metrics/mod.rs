// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;
pub(crate) use server::health_handler;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order operations (outcome, latency)
// - Stock movements and insufficient-stock rejections
// - Stock alerts raised and resolved
// - Transaction retry attempts and outcomes
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Order Metrics
    pub order_operations: IntCounterVec,
    pub order_operation_duration: HistogramVec,

    // Stock Metrics
    pub stock_units_reserved: IntCounter,
    pub stock_units_released: IntCounter,
    pub insufficient_stock_rejections: IntCounter,
    pub stock_alerts: IntCounterVec,

    // Retry Metrics
    pub retry_attempts_total: IntCounterVec,
    pub retry_success: IntCounterVec,
    pub retry_failure: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Order Metrics
        let order_operations = IntCounterVec::new(
            Opts::new("order_operations_total", "Order operations by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(order_operations.clone()))?;

        let order_operation_duration = HistogramVec::new(
            HistogramOpts::new("order_operation_duration_seconds", "Order operation duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(order_operation_duration.clone()))?;

        // Stock Metrics
        let stock_units_reserved = IntCounter::new(
            "stock_units_reserved_total",
            "Total units taken out of stock by orders",
        )?;
        registry.register(Box::new(stock_units_reserved.clone()))?;

        let stock_units_released = IntCounter::new(
            "stock_units_released_total",
            "Total units returned to stock by orders",
        )?;
        registry.register(Box::new(stock_units_released.clone()))?;

        let insufficient_stock_rejections = IntCounter::new(
            "insufficient_stock_rejections_total",
            "Order mutations rejected for insufficient stock",
        )?;
        registry.register(Box::new(insufficient_stock_rejections.clone()))?;

        let stock_alerts = IntCounterVec::new(
            Opts::new("stock_alerts_total", "Stock alerts raised and resolved"),
            &["alert_type", "action"],
        )?;
        registry.register(Box::new(stock_alerts.clone()))?;

        // Retry Metrics
        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Total retry attempts"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let retry_success = IntCounterVec::new(
            Opts::new("retry_success_total", "Total successful retries"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_success.clone()))?;

        let retry_failure = IntCounterVec::new(
            Opts::new("retry_failure_total", "Total failed retries after all attempts"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_failure.clone()))?;

        Ok(Self {
            registry,
            order_operations,
            order_operation_duration,
            stock_units_reserved,
            stock_units_released,
            insufficient_stock_rejections,
            stock_alerts,
            retry_attempts_total,
            retry_success,
            retry_failure,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record an order operation
    pub fn record_order_operation(&self, operation: &str, outcome: &str, duration_secs: f64) {
        self.order_operations.with_label_values(&[operation, outcome]).inc();
        self.order_operation_duration
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Helper to record committed stock movements
    pub fn record_stock_movement(&self, reserved: i64, released: i64) {
        if reserved > 0 {
            self.stock_units_reserved.inc_by(reserved as u64);
        }
        if released > 0 {
            self.stock_units_released.inc_by(released as u64);
        }
    }

    pub fn record_insufficient_stock(&self) {
        self.insufficient_stock_rejections.inc();
    }

    /// Helper to record an alert being raised or resolved
    pub fn record_alert(&self, alert_type: &str, action: &str) {
        self.stock_alerts.with_label_values(&[alert_type, action]).inc();
    }

    /// Helper to record retry attempt
    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        self.retry_attempts_total
            .with_label_values(&[operation, &attempt.to_string()])
            .inc();
    }

    /// Helper to record retry outcome
    pub fn record_retry_outcome(&self, operation: &str, success: bool) {
        if success {
            self.retry_success.with_label_values(&[operation]).inc();
        } else {
            self.retry_failure.with_label_values(&[operation]).inc();
        }
    }
}
