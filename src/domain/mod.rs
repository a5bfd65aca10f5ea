// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// money: pure price arithmetic
// stock: the only code that moves product stock, plus alert evaluation
// order: the order aggregate, its state machine and the service around it
//
// ============================================================================

pub mod money;
pub mod stock;
pub mod order;
