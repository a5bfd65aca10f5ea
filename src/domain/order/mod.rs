// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (OrderItem, OrderStatus, Customer)
// - Commands (CreateOrder, OrderPatch)
// - Events published after commit
// - Errors (OrderError enum)
// - Aggregate (Order and its totals)
// - State machine for status changes
// - Service running each command as one store transaction
// - Read-side statistics
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod state_machine;
pub mod service;
pub mod stats;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::{CreateOrder, DeleteAllOrders, OrderPatch};
pub use errors::*;
pub use aggregate::Order;
pub use service::OrderService;
