use std::collections::VecDeque;

use actix::prelude::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::messaging::Notification;

// ============================================================================
// Notification Hub Actor
// ============================================================================
//
// Receives every notification emitted by the order core and keeps the most
// recent ones for `GET /notifications`. Oldest entries are evicted first.
//
// ============================================================================

pub const DEFAULT_CAPACITY: usize = 100;

pub struct NotificationHub {
    capacity: usize,
    recent: VecDeque<RecordedNotification>,
    published: u64,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            recent: VecDeque::with_capacity(capacity.max(1)),
            published: 0,
        }
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Actor for NotificationHub {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(capacity = self.capacity, "NotificationHub started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(published = self.published, "NotificationHub stopped");
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedNotification {
    pub sequence: u64,
    pub emitted_at: DateTime<Utc>,
    pub notification: Notification,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct Publish(pub Notification);

#[derive(Message)]
#[rtype(result = "Vec<RecordedNotification>")]
pub struct RecentNotifications {
    pub limit: usize,
}

// ============================================================================
// Handlers
// ============================================================================

impl Handler<Publish> for NotificationHub {
    type Result = ();

    fn handle(&mut self, msg: Publish, _: &mut Self::Context) -> Self::Result {
        self.published += 1;

        tracing::info!(
            sequence = self.published,
            event_type = msg.0.event_type(),
            "🔔 Notification received"
        );

        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(RecordedNotification {
            sequence: self.published,
            emitted_at: Utc::now(),
            notification: msg.0,
        });
    }
}

impl Handler<RecentNotifications> for NotificationHub {
    type Result = MessageResult<RecentNotifications>;

    fn handle(&mut self, msg: RecentNotifications, _: &mut Self::Context) -> Self::Result {
        MessageResult(self.recent.iter().rev().take(msg.limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderEvent, OrdersCleared};

    fn cleared(count: u64) -> Notification {
        Notification::Order(OrderEvent::Cleared(OrdersCleared { deleted_count: count }))
    }

    #[actix::test]
    async fn test_recent_notifications_newest_first() {
        let hub = NotificationHub::new(10).start();

        for n in 1..=3 {
            hub.send(Publish(cleared(n))).await.unwrap();
        }

        let recent = hub.send(RecentNotifications { limit: 2 }).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].sequence, 3);
        assert_eq!(recent[1].sequence, 2);
    }

    #[actix::test]
    async fn test_capacity_evicts_oldest() {
        let hub = NotificationHub::new(2).start();

        for n in 1..=5 {
            hub.send(Publish(cleared(n))).await.unwrap();
        }

        let recent = hub.send(RecentNotifications { limit: 10 }).await.unwrap();
        let sequences: Vec<u64> = recent.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![5, 4]);
        assert_eq!(recent[0].notification, cleared(5));
    }
}
