// ============================================================================
// Actors Module
// ============================================================================
//
// Actors are reserved for infrastructure concerns. Order and stock logic
// runs in `OrderService` inside store transactions, not in actors.
//
// ============================================================================

mod notification_hub;

pub use notification_hub::{
    NotificationHub, Publish, RecentNotifications, DEFAULT_CAPACITY,
};
