use chrono::{DateTime, Utc};

use super::aggregate::Order;
use super::errors::OrderError;
use super::value_objects::{OrderStatus, PaymentStatus};

// ============================================================================
// Order State Machine
// ============================================================================
//
//   pending ⇄ processing ⇄ shipped      (active statuses move freely)
//   active   → delivered | cancelled
//   delivered → active | refunded
//   cancelled → active
//   refunded  → delivered
//
// Stock is never moved here. `apply` reports the stock action the caller
// must perform inside the same unit of work.
//
// ============================================================================

/// Side-effect row selected for a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same status, nothing to do
    Unchanged,
    /// Plain field write between active statuses
    Move,
    Deliver,
    Cancel,
    /// Back to an active status from delivered or cancelled
    Reopen,
    Refund,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockAction {
    None,
    /// Return every item's current quantity to stock
    ReleaseAll,
}

pub struct OrderStateMachine;

impl OrderStateMachine {
    pub fn transition(from: OrderStatus, to: OrderStatus) -> Result<Transition, OrderError> {
        use OrderStatus::*;

        if from == to {
            return Ok(Transition::Unchanged);
        }

        let transition = match (from, to) {
            (f, t) if f.is_active() && t.is_active() => Transition::Move,
            (f, Delivered) if f.is_active() => Transition::Deliver,
            (f, Cancelled) if f.is_active() => Transition::Cancel,
            (Delivered, t) if t.is_active() => Transition::Reopen,
            (Cancelled, t) if t.is_active() => Transition::Reopen,
            (Delivered, Refunded) => Transition::Refund,
            (Refunded, Delivered) => Transition::Deliver,
            _ => return Err(OrderError::InvalidTransition { from, to }),
        };

        Ok(transition)
    }

    /// Move `order` to `to`, stamping dates. Returns the stock action to run.
    pub fn apply(
        order: &mut Order,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<StockAction, OrderError> {
        let transition = Self::transition(order.status, to)?;

        let action = match transition {
            Transition::Unchanged => return Ok(StockAction::None),
            Transition::Move => StockAction::None,
            Transition::Deliver => {
                order.delivered_date = Some(now);
                StockAction::None
            }
            Transition::Cancel => {
                order.cancelled_date = Some(now);
                if order.stock_reserved {
                    order.stock_reserved = false;
                    StockAction::ReleaseAll
                } else {
                    StockAction::None
                }
            }
            Transition::Reopen => {
                order.delivered_date = None;
                order.cancelled_date = None;
                order.cancellation_reason = None;
                StockAction::None
            }
            Transition::Refund => {
                order.payment_status = PaymentStatus::Refunded;
                Self::stamp_refund(order, now);
                StockAction::None
            }
        };

        order.status = to;
        Ok(action)
    }

    /// Payment axis. Only the move into `refunded` has a side effect.
    pub fn apply_payment(order: &mut Order, to: PaymentStatus, now: DateTime<Utc>) {
        if order.payment_status != PaymentStatus::Refunded && to == PaymentStatus::Refunded {
            Self::stamp_refund(order, now);
        }
        order.payment_status = to;
    }

    fn stamp_refund(order: &mut Order, now: DateTime<Utc>) {
        order.refund_date = Some(now);
        if order.refund_amount.is_none() {
            order.refund_amount = Some(order.total_amount);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
