//! Per-user, per-market position accounting.

use alloy_primitives::U256;

use crate::market::Market;
use crate::math::RoundingDirection;

/// A user's stake in one market: supply and borrow shares plus raw collateral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub supply_shares: U256,
    pub borrow_shares: U256,
    pub collateral: U256,
}

impl Position {
    /// Current value of the supply shares in loan assets, rounded down.
    pub fn supply_assets(&self, market: &Market) -> U256 {
        market.to_supply_assets(self.supply_shares, RoundingDirection::Down)
    }

    /// Current debt in loan assets, rounded up against the borrower.
    pub fn borrow_assets(&self, market: &Market) -> U256 {
        market.to_borrow_assets(self.borrow_shares, RoundingDirection::Up)
    }

    /// Whether the position satisfies the market's lltv constraint.
    /// `None` when the oracle price is unknown.
    pub fn is_healthy(&self, market: &Market) -> Option<bool> {
        market.is_healthy(self.collateral, self.borrow_shares)
    }

    pub fn is_empty(&self) -> bool {
        self.supply_shares.is_zero() && self.borrow_shares.is_zero() && self.collateral.is_zero()
    }
}
