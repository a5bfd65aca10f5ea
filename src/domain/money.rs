use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

// ============================================================================
// Monetary Calculator
// ============================================================================
//
// Pure, deterministic arithmetic for line items and order totals.
// Every intermediate figure is rounded to 2 decimal places (half away from
// zero) so that summing many lines never accumulates drift.
//
// Inputs are assumed already validated (quantity > 0, rates in [0, 100]).
//
// ============================================================================

const DECIMAL_PLACES: u32 = 2;
const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Derived figures for a single order line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTotals {
    pub total_price: Decimal,
    pub gst_amount: Decimal,
    pub final_price: Decimal,
}

/// Derived figures for a whole order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub total_gst: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

/// Round to 2 decimal places, midpoints away from zero
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// A figure fell outside the range `Decimal` can represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("monetary amount out of range")]
pub struct AmountOverflow;

fn mul(a: Decimal, b: Decimal) -> Result<Decimal, AmountOverflow> {
    a.checked_mul(b).ok_or(AmountOverflow)
}

fn add(a: Decimal, b: Decimal) -> Result<Decimal, AmountOverflow> {
    a.checked_add(b).ok_or(AmountOverflow)
}

fn percent_of(amount: Decimal, rate: Decimal) -> Result<Decimal, AmountOverflow> {
    mul(amount, rate)?.checked_div(HUNDRED).ok_or(AmountOverflow)
}

/// Compute the derived price fields of one line
pub fn item_totals(
    quantity: i64,
    unit_price: Decimal,
    gst_rate: Decimal,
) -> Result<ItemTotals, AmountOverflow> {
    let total_price = round2(mul(Decimal::from(quantity), unit_price)?);
    let gst_amount = round2(percent_of(total_price, gst_rate)?);
    let final_price = round2(add(total_price, gst_amount)?);

    Ok(ItemTotals {
        total_price,
        gst_amount,
        final_price,
    })
}

/// Compute order-level totals from already computed line totals
pub fn order_totals(
    lines: &[ItemTotals],
    shipping_charges: Decimal,
    discount_percent: Decimal,
) -> Result<OrderTotals, AmountOverflow> {
    let mut subtotal = Decimal::ZERO;
    let mut total_gst = Decimal::ZERO;
    for line in lines {
        subtotal = add(subtotal, line.total_price)?;
        total_gst = add(total_gst, line.gst_amount)?;
    }
    let subtotal = round2(subtotal);
    let total_gst = round2(total_gst);

    let gross = add(subtotal, total_gst)?;
    let discount_amount = round2(percent_of(gross, discount_percent)?);
    let total_amount = add(gross, shipping_charges)?
        .checked_sub(discount_amount)
        .map(round2)
        .ok_or(AmountOverflow)?;

    Ok(OrderTotals {
        subtotal,
        total_gst,
        discount_amount,
        total_amount,
    })
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn test_round2_half_away_from_zero() {
        assert_eq!(round2(dec("2.345")), dec("2.35"));
        assert_eq!(round2(dec("2.344")), dec("2.34"));
        assert_eq!(round2(dec("-2.345")), dec("-2.35"));
        assert_eq!(round2(dec("0.005")), dec("0.01"));
    }

    #[test]
    fn test_item_totals() {
        let totals = item_totals(3, dec("10.99"), dec("18.0")).unwrap();

        assert_eq!(totals.total_price, dec("32.97"));
        assert_eq!(totals.gst_amount, dec("5.93")); // 5.9346
        assert_eq!(totals.final_price, dec("38.90"));
    }

    #[test]
    fn test_item_totals_zero_gst() {
        let totals = item_totals(4, dec("2.5"), Decimal::ZERO).unwrap();

        assert_eq!(totals.total_price, dec("10.0"));
        assert_eq!(totals.gst_amount, Decimal::ZERO);
        assert_eq!(totals.final_price, dec("10.0"));
    }

    #[test]
    fn test_order_totals_two_items_with_shipping_and_discount() {
        let lines = vec![
            item_totals(2, dec("100.0"), dec("18.0")).unwrap(),
            item_totals(1, dec("50.0"), dec("18.0")).unwrap(),
        ];

        let totals = order_totals(&lines, dec("20.0"), dec("10.0")).unwrap();

        assert_eq!(totals.subtotal, dec("250.0"));
        assert_eq!(totals.total_gst, dec("45.0"));
        assert_eq!(totals.discount_amount, dec("29.5"));
        assert_eq!(totals.total_amount, dec("285.5"));
    }

    #[test]
    fn test_order_totals_no_items() {
        let totals = order_totals(&[], dec("15.0"), Decimal::ZERO).unwrap();

        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total_amount, dec("15.0"));
    }

    #[test]
    fn test_accumulation_does_not_drift() {
        let lines: Vec<ItemTotals> = (0..1000)
            .map(|_| item_totals(1, dec("0.01"), Decimal::ZERO).unwrap())
            .collect();

        let totals = order_totals(&lines, Decimal::ZERO, Decimal::ZERO).unwrap();
        assert_eq!(totals.subtotal, dec("10.0"));
    }

    #[test]
    fn test_overflow_is_reported_not_panicked() {
        assert_eq!(
            item_totals(i64::MAX, dec("10000000000"), Decimal::ZERO),
            Err(AmountOverflow)
        );

        let line = item_totals(1, Decimal::MAX, Decimal::ZERO).unwrap();
        assert_eq!(order_totals(&[line, line], Decimal::ZERO, Decimal::ZERO), Err(AmountOverflow));
        assert_eq!(order_totals(&[line], Decimal::MAX, Decimal::ZERO), Err(AmountOverflow));
    }

    #[test]
    fn test_totals_idempotent_and_consistent_on_random_inputs() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..500 {
            let line_count = rng.gen_range(1..8);
            let lines: Vec<ItemTotals> = (0..line_count)
                .map(|_| {
                    let quantity = rng.gen_range(1..50);
                    let unit_price = Decimal::new(rng.gen_range(0..100_000), 2);
                    let gst_rate = Decimal::new(rng.gen_range(0..=10_000), 2);
                    item_totals(quantity, unit_price, gst_rate).unwrap()
                })
                .collect();
            let shipping = Decimal::new(rng.gen_range(0..5_000), 2);
            let discount = Decimal::new(rng.gen_range(0..=10_000), 2);

            let first = order_totals(&lines, shipping, discount).unwrap();
            let second = order_totals(&lines, shipping, discount).unwrap();
            assert_eq!(first, second);

            let expected = round2(
                first.subtotal + first.total_gst + shipping - first.discount_amount,
            );
            assert!((first.total_amount - expected).abs() <= dec("0.01"));

            for line in &lines {
                assert_eq!(line.final_price, round2(line.total_price + line.gst_amount));
            }
        }
    }
}
