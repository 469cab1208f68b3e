//! Markets: isolated lending pools pairing one loan token and one collateral
//! token under one oracle and one rate model.

use alloy_primitives::{keccak256, Address, U256};

use crate::error::MarketId;
use crate::math::{
    min, mul_div_down, mul_div_up, to_assets_down, to_assets_up, to_shares_down, to_shares_up,
    w_div_down, w_div_up, w_mul_down, w_taylor_compounded, zero_floor_sub, RoundingDirection,
    ORACLE_PRICE_SCALE, WAD,
};

/// Liquidation cursor used to derive the liquidation incentive (30%).
pub const LIQUIDATION_CURSOR: U256 = U256::from_limbs([300_000_000_000_000_000, 0, 0, 0]);

/// Maximum liquidation incentive factor (115%).
pub const MAX_LIQUIDATION_INCENTIVE_FACTOR: U256 =
    U256::from_limbs([1_150_000_000_000_000_000, 0, 0, 0]);

/// A market's immutable parameters. Their hash is the market's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketParams {
    pub loan_token: Address,
    pub collateral_token: Address,
    pub oracle: Address,
    pub irm: Address,
    /// Liquidation loan-to-value (WAD-scaled).
    pub lltv: U256,
}

impl MarketParams {
    /// The content-derived market id: keccak256 of the ABI-encoded params.
    pub fn id(&self) -> MarketId {
        let mut buf = [0u8; 160];
        buf[0..32].copy_from_slice(self.loan_token.into_word().as_slice());
        buf[32..64].copy_from_slice(self.collateral_token.into_word().as_slice());
        buf[64..96].copy_from_slice(self.oracle.into_word().as_slice());
        buf[96..128].copy_from_slice(self.irm.into_word().as_slice());
        buf[128..160].copy_from_slice(&self.lltv.to_be_bytes::<32>());
        keccak256(buf)
    }
}

/// One lending market's mutable accounting state.
#[derive(Debug, Clone)]
pub struct Market {
    pub params: MarketParams,
    pub total_supply_assets: U256,
    pub total_supply_shares: U256,
    pub total_borrow_assets: U256,
    pub total_borrow_shares: U256,
    /// Timestamp of the last interest accrual.
    pub last_update: u64,
    /// Fraction of interest taken as protocol fee (WAD-scaled).
    pub fee: U256,
    /// Oracle price of collateral in loan assets, scaled by 1e36.
    /// `None` when the oracle is unset or reverted during the snapshot.
    pub price: Option<U256>,
    /// Adaptive rate model state. `None` for markets without one, which
    /// accrue no interest.
    pub rate_at_target: Option<U256>,
}

/// Interest to apply to a market over one accrual interval.
#[derive(Debug, Clone, Copy)]
pub struct AccruedInterest {
    pub interest: U256,
    /// Supply shares minted to the protocol fee recipient.
    pub fee_shares: U256,
}

impl Market {
    pub fn id(&self) -> MarketId {
        self.params.id()
    }

    /// Assets available for borrowing or withdrawal.
    pub fn liquidity(&self) -> U256 {
        zero_floor_sub(self.total_supply_assets, self.total_borrow_assets)
    }

    /// `total_borrow_assets / total_supply_assets`, WAD-scaled.
    pub fn utilization(&self) -> U256 {
        if self.total_supply_assets.is_zero() {
            if self.total_borrow_assets.is_zero() {
                return U256::ZERO;
            }
            return U256::MAX;
        }
        w_div_down(self.total_borrow_assets, self.total_supply_assets)
    }

    pub fn to_supply_shares(&self, assets: U256, rounding: RoundingDirection) -> U256 {
        match rounding {
            RoundingDirection::Down => {
                to_shares_down(assets, self.total_supply_assets, self.total_supply_shares)
            }
            RoundingDirection::Up => {
                to_shares_up(assets, self.total_supply_assets, self.total_supply_shares)
            }
        }
    }

    pub fn to_supply_assets(&self, shares: U256, rounding: RoundingDirection) -> U256 {
        match rounding {
            RoundingDirection::Down => {
                to_assets_down(shares, self.total_supply_assets, self.total_supply_shares)
            }
            RoundingDirection::Up => {
                to_assets_up(shares, self.total_supply_assets, self.total_supply_shares)
            }
        }
    }

    pub fn to_borrow_shares(&self, assets: U256, rounding: RoundingDirection) -> U256 {
        match rounding {
            RoundingDirection::Down => {
                to_shares_down(assets, self.total_borrow_assets, self.total_borrow_shares)
            }
            RoundingDirection::Up => {
                to_shares_up(assets, self.total_borrow_assets, self.total_borrow_shares)
            }
        }
    }

    pub fn to_borrow_assets(&self, shares: U256, rounding: RoundingDirection) -> U256 {
        match rounding {
            RoundingDirection::Down => {
                to_assets_down(shares, self.total_borrow_assets, self.total_borrow_shares)
            }
            RoundingDirection::Up => {
                to_assets_up(shares, self.total_borrow_assets, self.total_borrow_shares)
            }
        }
    }

    /// Interest over `elapsed` seconds at the given average per-second rate,
    /// compounded by Taylor expansion, with the protocol's fee share priced
    /// on the post-interest, pre-fee totals.
    pub fn accrued_interest(&self, avg_borrow_rate: U256, elapsed: u64) -> AccruedInterest {
        let interest = w_mul_down(
            self.total_borrow_assets,
            w_taylor_compounded(avg_borrow_rate, U256::from(elapsed)),
        );
        let fee_amount = w_mul_down(interest, self.fee);
        let fee_shares = to_shares_down(
            fee_amount,
            self.total_supply_assets + interest - fee_amount,
            self.total_supply_shares,
        );

        AccruedInterest {
            interest,
            fee_shares,
        }
    }

    /// The value of `collateral` in loan assets at the oracle price.
    pub fn collateral_value(&self, collateral: U256) -> Option<U256> {
        self.price
            .map(|price| mul_div_down(collateral, price, ORACLE_PRICE_SCALE))
    }

    /// The maximum debt `collateral` can back under the market's lltv.
    pub fn max_borrow_assets(&self, collateral: U256) -> Option<U256> {
        self.collateral_value(collateral)
            .map(|value| w_mul_down(value, self.params.lltv))
    }

    /// Whether a position with the given collateral and debt is solvent.
    /// `None` when the oracle price is unknown.
    pub fn is_healthy(&self, collateral: U256, borrow_shares: U256) -> Option<bool> {
        if borrow_shares.is_zero() {
            return Some(true);
        }
        let max_borrow = self.max_borrow_assets(collateral)?;
        let borrow_assets = self.to_borrow_assets(borrow_shares, RoundingDirection::Up);
        Some(max_borrow >= borrow_assets)
    }

    /// `min(1.15, 1 / (1 - 0.3 * (1 - lltv)))`, WAD-scaled.
    pub fn liquidation_incentive_factor(&self) -> U256 {
        min(
            MAX_LIQUIDATION_INCENTIVE_FACTOR,
            w_div_down(
                WAD,
                WAD - w_mul_down(LIQUIDATION_CURSOR, WAD - self.params.lltv),
            ),
        )
    }

    /// Collateral seized when repaying `repaid_assets` of debt, incentive
    /// included. `None` when the oracle price is unknown.
    pub fn seized_for_repaid_assets(&self, repaid_assets: U256) -> Option<U256> {
        let price = self.price?;
        if price.is_zero() {
            return Some(U256::ZERO);
        }
        Some(mul_div_down(
            w_mul_down(repaid_assets, self.liquidation_incentive_factor()),
            ORACLE_PRICE_SCALE,
            price,
        ))
    }

    /// Debt shares that must be repaid to seize `seized_assets` of
    /// collateral. `None` when the oracle price is unknown.
    pub fn repaid_shares_for_seized(&self, seized_assets: U256) -> Option<U256> {
        let price = self.price?;
        let seized_quoted = mul_div_up(seized_assets, price, ORACLE_PRICE_SCALE);
        Some(self.to_borrow_shares(
            w_div_up(seized_quoted, self.liquidation_incentive_factor()),
            RoundingDirection::Up,
        ))
    }

    /// Collateral that can be withdrawn while keeping the position solvent.
    pub fn withdrawable_collateral(&self, collateral: U256, borrow_shares: U256) -> Option<U256> {
        let price = self.price?;
        if price.is_zero() {
            return Some(U256::ZERO);
        }
        let borrow_assets = self.to_borrow_assets(borrow_shares, RoundingDirection::Up);
        let required = w_div_up(
            mul_div_up(borrow_assets, ORACLE_PRICE_SCALE, price),
            self.params.lltv,
        );
        Some(zero_floor_sub(collateral, required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> MarketParams {
        MarketParams {
            loan_token: Address::from([0xaa; 20]),
            collateral_token: Address::from([0xbb; 20]),
            oracle: Address::from([0xcc; 20]),
            irm: Address::from([0xdd; 20]),
            lltv: U256::from(800_000_000_000_000_000u64),
        }
    }

    fn market() -> Market {
        Market {
            params: params(),
            total_supply_assets: U256::from(1_000_000u64),
            total_supply_shares: U256::from(1_000_000u64) * crate::math::VIRTUAL_SHARES,
            total_borrow_assets: U256::from(800_000u64),
            total_borrow_shares: U256::from(800_000u64) * crate::math::VIRTUAL_SHARES,
            last_update: 1000,
            fee: U256::ZERO,
            price: Some(ORACLE_PRICE_SCALE),
            rate_at_target: Some(U256::from(1_268_391_679u64)),
        }
    }

    #[test]
    fn id_is_deterministic_and_param_sensitive() {
        let a = params().id();
        let b = params().id();
        assert_eq!(a, b);

        let mut other = params();
        other.lltv = U256::from(900_000_000_000_000_000u64);
        assert_ne!(a, other.id());
    }

    #[test]
    fn liquidity_and_utilization() {
        let market = market();
        assert_eq!(market.liquidity(), U256::from(200_000u64));
        assert_eq!(
            market.utilization(),
            U256::from(800_000_000_000_000_000u64)
        );
    }

    #[test]
    fn utilization_of_empty_market() {
        let mut market = market();
        market.total_supply_assets = U256::ZERO;
        market.total_borrow_assets = U256::ZERO;
        assert_eq!(market.utilization(), U256::ZERO);

        market.total_borrow_assets = U256::from(1);
        assert_eq!(market.utilization(), U256::MAX);
    }

    #[test]
    fn accrued_interest_splits_fee_shares() {
        let mut market = market();
        market.fee = U256::from(100_000_000_000_000_000u64); // 10%

        let accrued = market.accrued_interest(U256::from(1_268_391_679u64), 86_400);
        assert!(accrued.interest > U256::ZERO);
        assert!(accrued.fee_shares > U256::ZERO);

        // Fee shares value out to ~10% of the interest.
        let total_assets = market.total_supply_assets + accrued.interest;
        let total_shares = market.total_supply_shares + accrued.fee_shares;
        let fee_value = to_assets_down(accrued.fee_shares, total_assets, total_shares);
        let expected = w_mul_down(accrued.interest, market.fee);
        assert!(fee_value <= expected);
        assert!(expected - fee_value <= U256::from(1));
    }

    #[test]
    fn zero_rate_accrues_nothing() {
        let market = market();
        let accrued = market.accrued_interest(U256::ZERO, 86_400);
        assert_eq!(accrued.interest, U256::ZERO);
        assert_eq!(accrued.fee_shares, U256::ZERO);
    }

    #[test]
    fn health_check_against_lltv() {
        let market = market();
        let collateral = U256::from(100u64);

        // At a 1:1 price and lltv 80%, 100 collateral backs up to 80 debt.
        let healthy_shares = market.to_borrow_shares(U256::from(50u64), RoundingDirection::Down);
        assert_eq!(market.is_healthy(collateral, healthy_shares), Some(true));

        let unhealthy_shares = market.to_borrow_shares(U256::from(90u64), RoundingDirection::Down);
        assert_eq!(market.is_healthy(collateral, unhealthy_shares), Some(false));
    }

    #[test]
    fn health_unknown_without_price() {
        let mut market = market();
        market.price = None;
        assert_eq!(market.is_healthy(U256::from(100u64), U256::from(1)), None);
        // Debt-free positions are healthy regardless of the oracle.
        assert_eq!(market.is_healthy(U256::ZERO, U256::ZERO), Some(true));
    }

    #[test]
    fn liquidation_incentive_factor_matches_reference() {
        let mut market = market();
        market.params.lltv = U256::from(860_000_000_000_000_000u64);
        assert_eq!(
            market.liquidation_incentive_factor(),
            U256::from(1_043_841_336_116_910_229u64)
        );

        // Very low lltv hits the cap.
        market.params.lltv = U256::from(100_000_000_000_000_000u64);
        assert_eq!(
            market.liquidation_incentive_factor(),
            MAX_LIQUIDATION_INCENTIVE_FACTOR
        );
    }

    #[test]
    fn withdrawable_collateral_without_debt_is_everything() {
        let market = market();
        assert_eq!(
            market.withdrawable_collateral(U256::from(100u64), U256::ZERO),
            Some(U256::from(100u64))
        );
    }
}
