//! Fixed-point math primitives shared by every handler.
//!
//! All protocol arithmetic is `U256` with explicit, caller-specified rounding.
//! Intermediate products go through `U512` so `a * b / c` never overflows for
//! any representable inputs; converting a result back down panics if it does
//! not fit, which is a logic bug rather than a recoverable input error.

use alloy_primitives::{U256, U512};

/// Scale of percentage and rate values (1e18).
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Scale of oracle prices (1e36): loan assets per collateral asset.
pub const ORACLE_PRICE_SCALE: U256 =
    U256::from_limbs([0xb34b_9f10_0000_0000, 0x00c0_97ce_7bc9_0715, 0, 0]);

/// Virtual shares added to a market's total shares in share/asset conversions.
pub const VIRTUAL_SHARES: U256 = U256::from_limbs([1_000_000, 0, 0, 0]);

/// Virtual assets added to a market's total assets in share/asset conversions.
pub const VIRTUAL_ASSETS: U256 = U256::from_limbs([1, 0, 0, 0]);

/// Sentinel meaning "everything available" in reallocation targets.
pub const MAX_UINT_256: U256 = U256::MAX;

/// Rounding direction for a division. Always caller-specified, never implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingDirection {
    /// Round the quotient toward zero.
    Down,
    /// Round the quotient away from zero.
    Up,
}

/// Returns `a * b / c`, rounded down, with unbounded intermediate precision.
pub fn mul_div_down(a: U256, b: U256, c: U256) -> U256 {
    let num = U512::from(a) * U512::from(b);
    (num / U512::from(c)).to::<U256>()
}

/// Returns `a * b / c`, rounded up, with unbounded intermediate precision.
pub fn mul_div_up(a: U256, b: U256, c: U256) -> U256 {
    let c = U512::from(c);
    let num = U512::from(a) * U512::from(b) + (c - U512::from(1u8));
    (num / c).to::<U256>()
}

/// Returns `a * b / c` rounded in the requested direction.
pub fn mul_div(a: U256, b: U256, c: U256, rounding: RoundingDirection) -> U256 {
    match rounding {
        RoundingDirection::Down => mul_div_down(a, b, c),
        RoundingDirection::Up => mul_div_up(a, b, c),
    }
}

/// WAD-scaled multiplication, rounded down.
pub fn w_mul_down(a: U256, b: U256) -> U256 {
    mul_div_down(a, b, WAD)
}

/// WAD-scaled division, rounded down.
pub fn w_div_down(a: U256, b: U256) -> U256 {
    mul_div_down(a, WAD, b)
}

/// WAD-scaled division, rounded up.
pub fn w_div_up(a: U256, b: U256) -> U256 {
    mul_div_up(a, WAD, b)
}

/// Returns `max(a - b, 0)`, never negative.
pub fn zero_floor_sub(a: U256, b: U256) -> U256 {
    a.saturating_sub(b)
}

pub fn min(a: U256, b: U256) -> U256 {
    if a < b {
        a
    } else {
        b
    }
}

pub fn max(a: U256, b: U256) -> U256 {
    if a > b {
        a
    } else {
        b
    }
}

/// Converts assets to shares using the virtual offsets, rounded down.
pub fn to_shares_down(assets: U256, total_assets: U256, total_shares: U256) -> U256 {
    mul_div_down(
        assets,
        total_shares + VIRTUAL_SHARES,
        total_assets + VIRTUAL_ASSETS,
    )
}

/// Converts assets to shares using the virtual offsets, rounded up.
pub fn to_shares_up(assets: U256, total_assets: U256, total_shares: U256) -> U256 {
    mul_div_up(
        assets,
        total_shares + VIRTUAL_SHARES,
        total_assets + VIRTUAL_ASSETS,
    )
}

/// Converts shares to assets using the virtual offsets, rounded down.
pub fn to_assets_down(shares: U256, total_assets: U256, total_shares: U256) -> U256 {
    mul_div_down(
        shares,
        total_assets + VIRTUAL_ASSETS,
        total_shares + VIRTUAL_SHARES,
    )
}

/// Converts shares to assets using the virtual offsets, rounded up.
pub fn to_assets_up(shares: U256, total_assets: U256, total_shares: U256) -> U256 {
    mul_div_up(
        shares,
        total_assets + VIRTUAL_ASSETS,
        total_shares + VIRTUAL_SHARES,
    )
}

/// 3-term Taylor expansion of `e^(rate * elapsed) - 1`, WAD-scaled.
///
/// This is the compounding approximation used for interest accrual: a lower
/// bound of continuous compounding, exact enough for per-second rates.
pub fn w_taylor_compounded(rate: U256, elapsed: U256) -> U256 {
    let first_term = rate * elapsed;
    let second_term = mul_div_down(first_term, first_term, WAD);
    let third_term = mul_div_down(second_term, first_term, WAD);

    first_term + second_term / U256::from(2) + third_term / U256::from(6)
}
