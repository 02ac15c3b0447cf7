use rust_decimal::Decimal;

/// Convert accepts at most 8 fractional digits on `fromAmount`.
pub const CONVERT_AMOUNT_SCALE: u32 = 8;

/// Floor (round toward zero) to the Convert amount scale.
pub fn floor_8dp(amount: Decimal) -> Decimal {
    amount.trunc_with_scale(CONVERT_AMOUNT_SCALE)
}

/// Canonical `fromAmount` wire string: floored to 8 fractional digits with
/// trailing zeros stripped, never in exponent notation.
pub fn amount_str(amount: Decimal) -> String {
    floor_8dp(amount).normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_floor_rounds_toward_zero() {
        assert_eq!(floor_8dp(dec!(0.123456789)), dec!(0.12345678));
        assert_eq!(floor_8dp(dec!(1.999999999)), dec!(1.99999999));
        assert_eq!(floor_8dp(dec!(5)), dec!(5));
    }

    #[test]
    fn test_amount_str_strips_trailing_zeros() {
        assert_eq!(amount_str(dec!(100.50000000)), "100.5");
        assert_eq!(amount_str(dec!(100)), "100");
        assert_eq!(amount_str(dec!(0.00000001)), "0.00000001");
        assert_eq!(amount_str(dec!(0.000000009)), "0");
    }
}
