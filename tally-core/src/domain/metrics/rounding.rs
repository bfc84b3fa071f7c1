// tally-core/src/domain/metrics/rounding.rs

use rust_decimal::{Decimal, RoundingStrategy};

pub const DEFAULT_ROUNDING_PLACES: u32 = 4;

/// Largest scale a `Decimal` can carry.
pub const MAX_ROUNDING_PLACES: u32 = 28;

/// Banker's rounding to `places` decimals, trailing zeros stripped.
pub fn round_half_even(value: Decimal, places: u32) -> Decimal {
    value
        .round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
        .normalize()
}

/// `numerator / denominator` rounded, or `None` when the denominator is zero.
pub fn ratio(numerator: Decimal, denominator: Decimal, places: u32) -> Option<Decimal> {
    if denominator.is_zero() {
        return None;
    }
    numerator
        .checked_div(denominator)
        .map(|r| round_half_even(r, places))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_half_even_ties() {
        assert_eq!(round_half_even(dec!(0.12345), 4), dec!(0.1234));
        assert_eq!(round_half_even(dec!(0.12355), 4), dec!(0.1236));
        assert_eq!(round_half_even(dec!(2.5), 0), dec!(2));
        assert_eq!(round_half_even(dec!(-2.5), 0), dec!(-2));
    }

    #[test]
    fn test_ratio_zero_denominator_is_none() {
        assert_eq!(ratio(dec!(5), Decimal::ZERO, 4), None);
        assert_eq!(ratio(dec!(-5), dec!(20), 4), Some(dec!(-0.25)));
    }

    #[test]
    fn test_rounded_values_are_normalized() {
        let r = round_half_even(dec!(12.300000), 4);
        assert_eq!(r.to_string(), "12.3");
    }
}
