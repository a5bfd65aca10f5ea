// ============================================================================
// Stock Domain
// ============================================================================
//
// - StockLedger: every change to a product's stock counter
// - StockAlertEvaluator: threshold alerts after a change commits
//
// ============================================================================

pub mod ledger;
pub mod alerts;

pub use ledger::StockLedger;
pub use alerts::{AlertEvent, StockAlertEvaluator};
