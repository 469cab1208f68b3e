//! Handlers for the core lending markets.
//!
//! Rounding always favors the protocol: deriving the secondary quantity of a
//! supply or repay rounds shares down (assets up), withdraw and borrow round
//! shares up (assets down).

use alloy_primitives::{Address, U256};

use crate::error::{MarketId, SimError};
use crate::handlers::Simulator;
use crate::math::{min, zero_floor_sub, RoundingDirection};
use crate::operations::{exactly_one, AssetsOrShares};

impl Simulator {
    /// Brings a market's accounting up to the snapshot clock. Markets without
    /// a rate model only advance their `last_update`.
    pub(crate) fn accrue_interest(&mut self, id: MarketId) -> Result<(), SimError> {
        let timestamp = self.state.timestamp;
        let market = self.state.market(id)?;

        if timestamp < market.last_update {
            return Err(SimError::InvalidInterestAccrual {
                timestamp,
                last_update: market.last_update,
            });
        }
        let elapsed = timestamp - market.last_update;
        if elapsed == 0 {
            return Ok(());
        }

        let Some(rate_at_target) = market.rate_at_target else {
            self.state.market_mut(id)?.last_update = timestamp;
            return Ok(());
        };

        let rate = self
            .irm
            .borrow_rate(market.utilization(), rate_at_target, elapsed);
        let accrued = market.accrued_interest(rate.avg_borrow_rate, elapsed);

        let fee_recipient = self.state.fee_recipient;
        let market = self.state.market_mut(id)?;
        market.total_borrow_assets += accrued.interest;
        market.total_supply_assets += accrued.interest;
        market.total_supply_shares += accrued.fee_shares;
        market.rate_at_target = Some(rate.end_rate_at_target);
        market.last_update = timestamp;

        if !accrued.fee_shares.is_zero() {
            self.state.position_mut(fee_recipient, id).supply_shares += accrued.fee_shares;
        }
        Ok(())
    }

    pub(crate) fn supply(
        &mut self,
        sender: Address,
        id: MarketId,
        assets: Option<U256>,
        shares: Option<U256>,
        on_behalf: Address,
    ) -> Result<(), SimError> {
        let amount = exactly_one(assets, shares)?;
        self.accrue_interest(id)?;

        let market = self.state.market(id)?;
        let loan_token = market.params.loan_token;
        let (assets, shares) = match amount {
            AssetsOrShares::Assets(assets) => {
                (assets, market.to_supply_shares(assets, RoundingDirection::Down))
            }
            AssetsOrShares::Shares(shares) => {
                (market.to_supply_assets(shares, RoundingDirection::Up), shares)
            }
        };

        let morpho = self.state.morpho;
        self.transfer(loan_token, sender, morpho, assets)?;

        let market = self.state.market_mut(id)?;
        market.total_supply_assets += assets;
        market.total_supply_shares += shares;
        self.state.position_mut(on_behalf, id).supply_shares += shares;
        Ok(())
    }

    pub(crate) fn withdraw(
        &mut self,
        sender: Address,
        id: MarketId,
        assets: Option<U256>,
        shares: Option<U256>,
        on_behalf: Address,
        receiver: Address,
    ) -> Result<(), SimError> {
        let amount = exactly_one(assets, shares)?;
        self.accrue_interest(id)?;

        if !self.state.is_authorized(on_behalf, sender) {
            return Err(SimError::Unauthorized { sender, on_behalf });
        }

        let market = self.state.market(id)?;
        let loan_token = market.params.loan_token;
        let (assets, shares) = match amount {
            AssetsOrShares::Assets(assets) => {
                (assets, market.to_supply_shares(assets, RoundingDirection::Up))
            }
            AssetsOrShares::Shares(shares) => {
                (market.to_supply_assets(shares, RoundingDirection::Down), shares)
            }
        };

        if self.state.position(on_behalf, id).supply_shares < shares {
            return Err(SimError::InsufficientPosition { user: on_behalf, id });
        }
        if market.liquidity() < assets {
            return Err(SimError::InsufficientLiquidity { id });
        }

        let market = self.state.market_mut(id)?;
        market.total_supply_assets -= assets;
        market.total_supply_shares -= shares;
        self.state.position_mut(on_behalf, id).supply_shares -= shares;

        let morpho = self.state.morpho;
        self.transfer(loan_token, morpho, receiver, assets)
    }

    pub(crate) fn borrow(
        &mut self,
        sender: Address,
        id: MarketId,
        assets: Option<U256>,
        shares: Option<U256>,
        on_behalf: Address,
        receiver: Address,
    ) -> Result<(), SimError> {
        let amount = exactly_one(assets, shares)?;
        self.accrue_interest(id)?;

        if !self.state.is_authorized(on_behalf, sender) {
            return Err(SimError::Unauthorized { sender, on_behalf });
        }

        let market = self.state.market(id)?;
        let loan_token = market.params.loan_token;
        let (assets, shares) = match amount {
            AssetsOrShares::Assets(assets) => {
                (assets, market.to_borrow_shares(assets, RoundingDirection::Up))
            }
            AssetsOrShares::Shares(shares) => {
                (market.to_borrow_assets(shares, RoundingDirection::Down), shares)
            }
        };

        let market = self.state.market_mut(id)?;
        market.total_borrow_assets += assets;
        market.total_borrow_shares += shares;
        let position = self.state.position_mut(on_behalf, id);
        position.borrow_shares += shares;

        let market = self.state.market(id)?;
        match self.state.position(on_behalf, id).is_healthy(market) {
            None => return Err(SimError::UnknownOraclePrice { id }),
            Some(false) => {
                return Err(SimError::InsufficientCollateral { user: on_behalf, id })
            }
            Some(true) => {}
        }
        // The borrow is already in the totals; the invariant is that debt
        // never exceeds supply.
        if market.total_borrow_assets > market.total_supply_assets {
            return Err(SimError::InsufficientLiquidity { id });
        }

        let morpho = self.state.morpho;
        self.transfer(loan_token, morpho, receiver, assets)
    }

    pub(crate) fn repay(
        &mut self,
        sender: Address,
        id: MarketId,
        assets: Option<U256>,
        shares: Option<U256>,
        on_behalf: Address,
    ) -> Result<(), SimError> {
        let amount = exactly_one(assets, shares)?;
        self.accrue_interest(id)?;

        let market = self.state.market(id)?;
        let loan_token = market.params.loan_token;
        let (assets, shares) = match amount {
            AssetsOrShares::Assets(assets) => {
                (assets, market.to_borrow_shares(assets, RoundingDirection::Down))
            }
            AssetsOrShares::Shares(shares) => {
                (market.to_borrow_assets(shares, RoundingDirection::Up), shares)
            }
        };

        if self.state.position(on_behalf, id).borrow_shares < shares {
            return Err(SimError::InsufficientPosition { user: on_behalf, id });
        }

        let morpho = self.state.morpho;
        self.transfer(loan_token, sender, morpho, assets)?;

        let market = self.state.market_mut(id)?;
        // Rounding up on the assets side can overshoot the remaining debt.
        market.total_borrow_assets = zero_floor_sub(market.total_borrow_assets, assets);
        market.total_borrow_shares -= shares;
        self.state.position_mut(on_behalf, id).borrow_shares -= shares;
        Ok(())
    }

    pub(crate) fn supply_collateral(
        &mut self,
        sender: Address,
        id: MarketId,
        assets: U256,
        on_behalf: Address,
    ) -> Result<(), SimError> {
        let collateral_token = self.state.market(id)?.params.collateral_token;
        let morpho = self.state.morpho;
        self.transfer(collateral_token, sender, morpho, assets)?;
        self.state.position_mut(on_behalf, id).collateral += assets;
        Ok(())
    }

    pub(crate) fn withdraw_collateral(
        &mut self,
        sender: Address,
        id: MarketId,
        assets: U256,
        on_behalf: Address,
        receiver: Address,
    ) -> Result<(), SimError> {
        self.accrue_interest(id)?;

        if !self.state.is_authorized(on_behalf, sender) {
            return Err(SimError::Unauthorized { sender, on_behalf });
        }
        if self.state.position(on_behalf, id).collateral < assets {
            return Err(SimError::InsufficientPosition { user: on_behalf, id });
        }

        let collateral_token = self.state.market(id)?.params.collateral_token;
        self.state.position_mut(on_behalf, id).collateral -= assets;

        let market = self.state.market(id)?;
        match self.state.position(on_behalf, id).is_healthy(market) {
            None => return Err(SimError::UnknownOraclePrice { id }),
            Some(false) => {
                return Err(SimError::InsufficientCollateral { user: on_behalf, id })
            }
            Some(true) => {}
        }

        let morpho = self.state.morpho;
        self.transfer(collateral_token, morpho, receiver, assets)
    }

    /// Seizes collateral from an unhealthy position. Exactly one of
    /// `seized_assets` and `repaid_shares` picks the liquidation size; the
    /// other side is derived through the liquidation incentive factor. A
    /// liquidation that empties the collateral realizes the remaining debt
    /// as bad debt against the suppliers.
    pub(crate) fn liquidate(
        &mut self,
        sender: Address,
        id: MarketId,
        borrower: Address,
        seized_assets: Option<U256>,
        repaid_shares: Option<U256>,
    ) -> Result<(), SimError> {
        let amount = exactly_one(seized_assets, repaid_shares)?;
        self.accrue_interest(id)?;

        let market = self.state.market(id)?;
        let loan_token = market.params.loan_token;
        let collateral_token = market.params.collateral_token;
        let position = self.state.position(borrower, id);

        match position.is_healthy(market) {
            None => return Err(SimError::UnknownOraclePrice { id }),
            Some(true) => {
                return Err(SimError::HealthyPosition { user: borrower, id })
            }
            Some(false) => {}
        }

        let (seized_assets, repaid_shares) = match amount {
            AssetsOrShares::Assets(seized) => {
                let repaid = market
                    .repaid_shares_for_seized(seized)
                    .ok_or(SimError::UnknownOraclePrice { id })?;
                (seized, repaid)
            }
            AssetsOrShares::Shares(repaid) => {
                let repaid_assets = market.to_borrow_assets(repaid, RoundingDirection::Down);
                let seized = market
                    .seized_for_repaid_assets(repaid_assets)
                    .ok_or(SimError::UnknownOraclePrice { id })?;
                (seized, repaid)
            }
        };
        let repaid_assets = market.to_borrow_assets(repaid_shares, RoundingDirection::Up);

        if position.borrow_shares < repaid_shares {
            return Err(SimError::InsufficientPosition { user: borrower, id });
        }
        if position.collateral < seized_assets {
            return Err(SimError::InsufficientCollateral { user: borrower, id });
        }

        let morpho = self.state.morpho;
        self.transfer(loan_token, sender, morpho, repaid_assets)?;

        let market = self.state.market_mut(id)?;
        market.total_borrow_shares -= repaid_shares;
        market.total_borrow_assets = zero_floor_sub(market.total_borrow_assets, repaid_assets);

        let position = self.state.position_mut(borrower, id);
        position.borrow_shares -= repaid_shares;
        position.collateral -= seized_assets;

        // Bad debt: a fully stripped position's residual debt is socialized.
        if position.collateral.is_zero() && !position.borrow_shares.is_zero() {
            let bad_debt_shares = position.borrow_shares;
            position.borrow_shares = U256::ZERO;

            let market = self.state.market_mut(id)?;
            let bad_debt_assets = min(
                market.total_borrow_assets,
                market.to_borrow_assets(bad_debt_shares, RoundingDirection::Up),
            );
            market.total_borrow_assets -= bad_debt_assets;
            market.total_supply_assets -= bad_debt_assets;
            market.total_borrow_shares -= bad_debt_shares;
        }

        self.transfer(collateral_token, morpho, sender, seized_assets)
    }
}
