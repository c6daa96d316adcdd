//! Fixed-point money helpers shared by the request, ledger and settlement paths.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::core::errors::PayError;

/// Currency minor-unit tolerance used for every amount comparison.
pub const TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

pub const MINOR_UNIT_SCALE: u32 = 2;

/// Smallest chargeable amount.
pub const MINOR_UNIT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

pub fn within_tolerance(expected: Decimal, received: Decimal) -> bool {
    (expected - received).abs() <= TOLERANCE
}

pub fn round_minor(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

pub fn ensure_positive(field: &str, amount: Decimal) -> Result<(), PayError> {
    if amount <= Decimal::ZERO {
        return Err(PayError::invalid(field, "Amount must be greater than 0"));
    }
    if amount.normalize().scale() > MINOR_UNIT_SCALE {
        return Err(PayError::invalid(
            field,
            "Amount cannot have more than 2 decimal places",
        ));
    }
    Ok(())
}

/// Splits `total` into `parts` shares rounded to minor units.
///
/// Every share is `total / parts` rounded down to the cent; the cents left over go to the
/// last share so the shares always sum to `total` exactly.
pub fn equal_shares(total: Decimal, parts: usize) -> Vec<Decimal> {
    if parts == 0 {
        return Vec::new();
    }
    let count = Decimal::from(parts as u64);
    let share = (total / count).round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::ToZero);
    let mut shares = vec![share; parts];
    let remainder = total - share * count;
    if let Some(last) = shares.last_mut() {
        *last += remainder;
    }
    shares
}

pub fn fee_for(amount: Decimal, rate: Decimal) -> Decimal {
    round_minor(amount * rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tolerance_is_one_cent() {
        assert_eq!(TOLERANCE, dec!(0.01));
        assert!(within_tolerance(dec!(100.00), dec!(100.01)));
        assert!(!within_tolerance(dec!(100.00), dec!(100.02)));
    }

    #[test]
    fn equal_shares_even_split() {
        assert_eq!(
            equal_shares(dec!(75000), 3),
            vec![dec!(25000.00), dec!(25000.00), dec!(25000.00)]
        );
    }

    #[test]
    fn equal_shares_push_remainder_to_last() {
        let shares = equal_shares(dec!(100), 3);
        assert_eq!(shares, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
        assert_eq!(shares.iter().copied().sum::<Decimal>(), dec!(100));
    }

    #[test]
    fn fee_rounds_to_cents() {
        assert_eq!(fee_for(dec!(60000), dec!(0.02)), dec!(1200.00));
        assert_eq!(fee_for(dec!(10.55), dec!(0.015)), dec!(0.16));
    }

    #[test]
    fn positive_amount_rules() {
        assert!(ensure_positive("amount", dec!(10.50)).is_ok());
        assert!(ensure_positive("amount", dec!(0)).is_err());
        assert!(ensure_positive("amount", dec!(-1)).is_err());
        assert!(ensure_positive("amount", dec!(1.001)).is_err());
    }
}
