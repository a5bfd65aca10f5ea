use actix::Addr;
use serde::Serialize;

use crate::actors::{NotificationHub, Publish};
use crate::domain::order::OrderEvent;
use crate::domain::stock::AlertEvent;

// ============================================================================
// Notifications Port
// ============================================================================
//
// The order core only knows `Notifier::emit`. Delivery is fire-and-forget:
// a failed delivery is logged by the notifier and never reaches the caller.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Notification {
    StockAlert(AlertEvent),
    Order(OrderEvent),
}

impl Notification {
    pub fn event_type(&self) -> &'static str {
        match self {
            Notification::StockAlert(event) => event.event_type(),
            Notification::Order(event) => event.event_type(),
        }
    }
}

impl From<AlertEvent> for Notification {
    fn from(event: AlertEvent) -> Self {
        Notification::StockAlert(event)
    }
}

impl From<OrderEvent> for Notification {
    fn from(event: OrderEvent) -> Self {
        Notification::Order(event)
    }
}

pub trait Notifier: Send + Sync {
    fn emit(&self, notification: Notification);
}

/// Writes every notification to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn emit(&self, notification: Notification) {
        match serde_json::to_string(&notification) {
            Ok(payload) => tracing::info!(
                event_type = notification.event_type(),
                payload = %payload,
                "Notification emitted"
            ),
            Err(e) => tracing::error!(
                event_type = notification.event_type(),
                error = %e,
                "Failed to serialize notification"
            ),
        }
    }
}

/// Logs each notification, then forwards it to the `NotificationHub` actor
pub struct HubNotifier {
    hub: Addr<NotificationHub>,
    log: LogNotifier,
}

impl HubNotifier {
    pub fn new(hub: Addr<NotificationHub>) -> Self {
        Self { hub, log: LogNotifier }
    }
}

impl Notifier for HubNotifier {
    fn emit(&self, notification: Notification) {
        self.log.emit(notification.clone());
        if let Err(e) = self.hub.try_send(Publish(notification)) {
            tracing::warn!(error = %e, "Notification hub unavailable, dropping notification");
        }
    }
}
