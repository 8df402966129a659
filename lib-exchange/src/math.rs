//! Constant-Product Math
//!
//! Pure pricing functions for the AMM. No state and no fees here; fees are
//! applied by the caller. All intermediates are widened to `u128` and every
//! multiplication is checked.

use lib_types::Amount;

use crate::error::{ExchangeError, ExchangeResult};

/// Fixed-point scale for spot-price quotes (1e18)
pub const PRICE_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Swap output under the constant-product rule.
///
/// `amount_out = reserve_out * amount_in / (reserve_in + amount_in)`
///
/// Floor division truncates in the pool's favor, so `k = x * y` never
/// decreases across a swap. Zero input or zero reserves fail with
/// `InvalidReserves`: a zero-reserve pool cannot price anything and a
/// zero input is a no-op the caller should have rejected.
pub fn swap_output(
    amount_in: Amount,
    reserve_in: Amount,
    reserve_out: Amount,
) -> ExchangeResult<Amount> {
    if amount_in == 0 || reserve_in == 0 || reserve_out == 0 {
        return Err(ExchangeError::InvalidReserves);
    }

    let numerator = (reserve_out as u128)
        .checked_mul(amount_in as u128)
        .ok_or(ExchangeError::Overflow)?;

    let denominator = (reserve_in as u128)
        .checked_add(amount_in as u128)
        .ok_or(ExchangeError::Overflow)?;

    // amount_out < reserve_out, so the narrowing cast is lossless
    Ok((numerator / denominator) as Amount)
}

/// Floor of `a * b / denom` with `u128` widening.
pub fn mul_div(a: Amount, b: Amount, denom: Amount) -> ExchangeResult<Amount> {
    if denom == 0 {
        return Err(ExchangeError::InvalidReserves);
    }
    let product = (a as u128)
        .checked_mul(b as u128)
        .ok_or(ExchangeError::Overflow)?;
    Amount::try_from(product / denom as u128).map_err(|_| ExchangeError::Overflow)
}

/// 1e18-scaled BNB-per-equity spot quote.
///
/// Display-only: spot prices ignore the slippage a real trade would incur
/// and are never used to settle anything.
pub fn spot_price(bnb_reserve: Amount, equity_reserve: Amount) -> ExchangeResult<u128> {
    if bnb_reserve == 0 || equity_reserve == 0 {
        return Err(ExchangeError::InvalidReserves);
    }

    let scaled = (bnb_reserve as u128)
        .checked_mul(PRICE_PRECISION)
        .ok_or(ExchangeError::Overflow)?;

    Ok(scaled / equity_reserve as u128)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_output_basic() {
        // equity 100_000.000, bnb 10.000, buy with 0.100 (3-decimal units):
        // out = 100_000_000 * 100 / (10_000 + 100) = 990_099 (floor)
        let out = swap_output(100, 10_000, 100_000_000).unwrap();
        assert_eq!(out, 990_099);
    }

    #[test]
    fn test_swap_output_zero_args() {
        assert_eq!(
            swap_output(0, 10, 10).unwrap_err(),
            ExchangeError::InvalidReserves
        );
        assert_eq!(
            swap_output(10, 0, 10).unwrap_err(),
            ExchangeError::InvalidReserves
        );
        assert_eq!(
            swap_output(10, 10, 0).unwrap_err(),
            ExchangeError::InvalidReserves
        );
    }

    #[test]
    fn test_swap_output_never_drains_reserve() {
        // Even an absurdly large input cannot reach the full output reserve
        let out = swap_output(u64::MAX, 1, 1_000_000).unwrap();
        assert!(out < 1_000_000);
    }

    #[test]
    fn test_k_never_decreases() {
        let (mut r_in, mut r_out) = (10_000u64, 10_000u64);
        for amount_in in [1u64, 7, 333, 9_999, 123_456] {
            let k_before = r_in as u128 * r_out as u128;
            let out = swap_output(amount_in, r_in, r_out).unwrap();
            r_in += amount_in;
            r_out -= out;
            let k_after = r_in as u128 * r_out as u128;
            assert!(k_after >= k_before, "k decreased for input {}", amount_in);
        }
    }

    #[test]
    fn test_mul_div() {
        assert_eq!(mul_div(10, 3, 4).unwrap(), 7);
        assert_eq!(mul_div(u64::MAX, u64::MAX, u64::MAX).unwrap(), u64::MAX);
        assert_eq!(
            mul_div(1, 1, 0).unwrap_err(),
            ExchangeError::InvalidReserves
        );
        // quotient exceeds u64
        assert_eq!(
            mul_div(u64::MAX, u64::MAX, 1).unwrap_err(),
            ExchangeError::Overflow
        );
    }

    #[test]
    fn test_spot_price() {
        // 1:1 reserves quote exactly 1e18
        assert_eq!(spot_price(10_000, 10_000).unwrap(), PRICE_PRECISION);
        // 2:1 BNB:equity quotes 2e18
        assert_eq!(spot_price(20_000, 10_000).unwrap(), 2 * PRICE_PRECISION);
        assert_eq!(
            spot_price(0, 10_000).unwrap_err(),
            ExchangeError::InvalidReserves
        );
    }
}
