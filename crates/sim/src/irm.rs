//! The interest-rate model boundary.
//!
//! The engine treats the rate model as an opaque, deterministic collaborator:
//! given a market's utilization, its stored rate-at-target state and the
//! elapsed time, the model returns the average per-second borrow rate over
//! the interval and the adapted rate-at-target. [`AdaptiveCurveIrm`] is the
//! model used by live markets; [`FixedRateIrm`] is a trivial model for tests
//! and for markets priced off-curve.

use alloy_primitives::U256;

use crate::math::{max, min, w_div_down, w_mul_down, WAD};

/// Curve steepness parameter (4.0 in WAD).
pub const CURVE_STEEPNESS: U256 = U256::from_limbs([4_000_000_000_000_000_000, 0, 0, 0]);

/// Target utilization rate (90% in WAD).
pub const TARGET_UTILIZATION: U256 = U256::from_limbs([900_000_000_000_000_000, 0, 0, 0]);

/// Initial rate at target (4% APY over seconds per year).
pub const INITIAL_RATE_AT_TARGET: U256 = U256::from_limbs([1_268_391_679, 0, 0, 0]);

/// Adjustment speed (50% per year over seconds per year).
pub const ADJUSTMENT_SPEED: U256 = U256::from_limbs([15_854_895_991, 0, 0, 0]);

/// Minimum rate at target (0.1% APY over seconds per year).
pub const MIN_RATE_AT_TARGET: U256 = U256::from_limbs([31_709_791, 0, 0, 0]);

/// Maximum rate at target (200% APY over seconds per year).
pub const MAX_RATE_AT_TARGET: U256 = U256::from_limbs([63_419_583_967, 0, 0, 0]);

/// ln(2) scaled by WAD.
const LN_2_INT: i128 = 693_147_180_559_945_309;

/// ln(1e-18) scaled by WAD.
const LN_WEI_INT: i128 = -41_446_531_673_892_822_312;

/// Upper bound for `w_exp` inputs to avoid overflow.
const WEXP_UPPER_BOUND: i128 = 93_859_467_695_000_404_319;

/// Value of `w_exp` at the upper bound.
const WEXP_UPPER_VALUE: U256 = U256::from_limbs([0, 0, 0x31d8_1650_c7d8_8b80, 0x9]);

/// Borrow rate over an accrual interval, as returned by a rate model.
#[derive(Debug, Clone, Copy)]
pub struct BorrowRate {
    /// Average per-second borrow rate over the interval (WAD-scaled).
    pub avg_borrow_rate: U256,
    /// The model's adapted rate-at-target state at the end of the interval.
    pub end_rate_at_target: U256,
}

/// A pluggable borrow-rate model, invoked once per interest accrual.
pub trait BorrowRateModel {
    /// Returns the borrow rate for a market at `utilization` (WAD-scaled)
    /// whose stored rate-at-target is `rate_at_target` (zero on first
    /// interaction), `elapsed` seconds after the last accrual.
    fn borrow_rate(&self, utilization: U256, rate_at_target: U256, elapsed: u64) -> BorrowRate;
}

/// The adaptive curve model: an asymmetric curve around the target
/// utilization whose anchor rate drifts toward equilibrium over time.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveCurveIrm;

/// A model returning the same rate at every utilization. The stored
/// rate-at-target passes through unchanged.
#[derive(Debug, Clone, Copy)]
pub struct FixedRateIrm {
    pub rate: U256,
}

impl BorrowRateModel for FixedRateIrm {
    fn borrow_rate(&self, _utilization: U256, rate_at_target: U256, _elapsed: u64) -> BorrowRate {
        BorrowRate {
            avg_borrow_rate: self.rate,
            end_rate_at_target: rate_at_target,
        }
    }
}

/// Approximation of `e^x` (WAD-scaled) via `e^x = 2^q * e^r` with
/// `x = q*ln(2) + r` and `|r| <= ln(2)/2`, then a 2nd-order Taylor
/// polynomial for `e^r`.
pub fn w_exp(x: i128) -> U256 {
    // Below ln(1e-18) the result rounds to zero.
    if x < LN_WEI_INT {
        return U256::ZERO;
    }

    // Clip to avoid overflow.
    if x >= WEXP_UPPER_BOUND {
        return WEXP_UPPER_VALUE;
    }

    let rounding_adjustment = if x < 0 { -(LN_2_INT / 2) } else { LN_2_INT / 2 };
    let q = (x + rounding_adjustment) / LN_2_INT;
    let r = x - q * LN_2_INT;

    // e^r ~= 1 + r + r^2/2
    let wad_i128 = 1_000_000_000_000_000_000i128;
    let exp_r = wad_i128 + r + (r * r) / wad_i128 / 2;
    let exp_r = U256::from(exp_r.unsigned_abs());

    if q >= 0 {
        exp_r << usize::try_from(q).unwrap_or(usize::MAX)
    } else {
        exp_r >> usize::try_from(-q).unwrap_or(usize::MAX)
    }
}

impl BorrowRateModel for AdaptiveCurveIrm {
    fn borrow_rate(&self, utilization: U256, rate_at_target: U256, elapsed: u64) -> BorrowRate {
        // Normalized distance from target, sign tracked separately.
        let err_below = utilization < TARGET_UTILIZATION;
        let err_norm_factor = if err_below {
            TARGET_UTILIZATION
        } else {
            WAD - TARGET_UTILIZATION
        };
        let err = if err_below {
            w_div_down(TARGET_UTILIZATION - utilization, err_norm_factor)
        } else {
            w_div_down(utilization - TARGET_UTILIZATION, err_norm_factor)
        };

        let (avg_rate_at_target, end_rate_at_target) = if rate_at_target.is_zero() {
            // First interaction.
            (INITIAL_RATE_AT_TARGET, INITIAL_RATE_AT_TARGET)
        } else {
            let speed = w_mul_down(ADJUSTMENT_SPEED, err);
            let linear_adaptation = speed * U256::from(elapsed);

            if linear_adaptation.is_zero() {
                (rate_at_target, rate_at_target)
            } else {
                let adapted = |adaptation: U256| -> U256 {
                    let exp_arg = adaptation.saturating_to::<i128>();
                    let exp_arg = if err_below { -exp_arg } else { exp_arg };
                    let raw = w_mul_down(rate_at_target, w_exp(exp_arg));
                    min(max(raw, MIN_RATE_AT_TARGET), MAX_RATE_AT_TARGET)
                };

                let end_rate = adapted(linear_adaptation);
                // Trapezoidal average over the interval.
                let mid_rate = adapted(linear_adaptation / U256::from(2));
                let avg_rate =
                    (rate_at_target + end_rate + U256::from(2) * mid_rate) / U256::from(4);

                (avg_rate, end_rate)
            }
        };

        let curve = |rate: U256| -> U256 {
            let factor = if err_below {
                let coeff = WAD - w_div_down(WAD, CURVE_STEEPNESS);
                WAD.saturating_sub(w_mul_down(coeff, err))
            } else {
                WAD + w_mul_down(CURVE_STEEPNESS - WAD, err)
            };
            w_mul_down(factor, rate)
        };

        BorrowRate {
            avg_borrow_rate: curve(avg_rate_at_target),
            end_rate_at_target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn w_exp_of_zero_is_one() {
        assert_eq!(w_exp(0), WAD);
    }

    #[test]
    fn w_exp_of_one_is_e() {
        let result = w_exp(1_000_000_000_000_000_000);
        // e ~= 2.718; tolerate the 2nd-order approximation error.
        assert!(result > U256::from(2_700_000_000_000_000_000u64));
        assert!(result < U256::from(2_730_000_000_000_000_000u64));
    }

    #[test]
    fn w_exp_clips_at_bounds() {
        assert_eq!(w_exp(LN_WEI_INT - 1), U256::ZERO);
        assert_eq!(w_exp(WEXP_UPPER_BOUND), WEXP_UPPER_VALUE);
        assert_eq!(w_exp(WEXP_UPPER_BOUND + 1), WEXP_UPPER_VALUE);
    }

    #[test]
    fn first_interaction_uses_initial_rate() {
        let irm = AdaptiveCurveIrm;
        let rate = irm.borrow_rate(TARGET_UTILIZATION, U256::ZERO, 0);
        assert_eq!(rate.end_rate_at_target, INITIAL_RATE_AT_TARGET);
    }

    #[test]
    fn rate_at_target_is_stable_at_target_utilization() {
        let irm = AdaptiveCurveIrm;
        let rate = irm.borrow_rate(TARGET_UTILIZATION, INITIAL_RATE_AT_TARGET, 86_400);
        assert_eq!(rate.end_rate_at_target, INITIAL_RATE_AT_TARGET);
        // At target the curve factor is exactly 1.
        assert_eq!(rate.avg_borrow_rate, INITIAL_RATE_AT_TARGET);
    }

    #[test]
    fn curve_is_asymmetric_around_target() {
        let irm = AdaptiveCurveIrm;
        let high = irm.borrow_rate(
            U256::from(950_000_000_000_000_000u64),
            INITIAL_RATE_AT_TARGET,
            0,
        );
        let low = irm.borrow_rate(
            U256::from(500_000_000_000_000_000u64),
            INITIAL_RATE_AT_TARGET,
            0,
        );
        assert!(high.avg_borrow_rate > INITIAL_RATE_AT_TARGET);
        assert!(low.avg_borrow_rate < INITIAL_RATE_AT_TARGET);
    }

    #[test]
    fn rate_at_target_adapts_over_time() {
        let irm = AdaptiveCurveIrm;
        let elapsed = 86_400;
        let high = irm.borrow_rate(
            U256::from(950_000_000_000_000_000u64),
            INITIAL_RATE_AT_TARGET,
            elapsed,
        );
        let low = irm.borrow_rate(
            U256::from(500_000_000_000_000_000u64),
            INITIAL_RATE_AT_TARGET,
            elapsed,
        );
        assert!(high.end_rate_at_target > INITIAL_RATE_AT_TARGET);
        assert!(low.end_rate_at_target < INITIAL_RATE_AT_TARGET);
    }

    #[test]
    fn rate_at_target_is_clamped() {
        let irm = AdaptiveCurveIrm;
        let year = 365 * 86_400;
        let up = irm.borrow_rate(
            U256::from(990_000_000_000_000_000u64),
            MAX_RATE_AT_TARGET,
            year,
        );
        assert!(up.end_rate_at_target <= MAX_RATE_AT_TARGET);

        let down = irm.borrow_rate(
            U256::from(100_000_000_000_000_000u64),
            MIN_RATE_AT_TARGET,
            year,
        );
        assert!(down.end_rate_at_target >= MIN_RATE_AT_TARGET);
    }

    #[test]
    fn fixed_rate_model_passes_state_through() {
        let irm = FixedRateIrm {
            rate: U256::from(42),
        };
        let rate = irm.borrow_rate(WAD, U256::from(7), 1000);
        assert_eq!(rate.avg_borrow_rate, U256::from(42));
        assert_eq!(rate.end_rate_at_target, U256::from(7));
    }
}
