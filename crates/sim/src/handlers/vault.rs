//! Vault handlers: ERC4626 deposits and withdrawals, fee accrual, and
//! allocator-driven reallocations.

use alloy_primitives::{Address, U256};

use crate::error::{MarketId, SimError};
use crate::handlers::Simulator;
use crate::math::{min, mul_div_down, w_mul_down, zero_floor_sub, RoundingDirection, MAX_UINT_256};
use crate::operations::{exactly_one, AssetsOrShares, MarketAllocation, MarketWithdrawal};
use crate::token::NATIVE_ADDRESS;

impl Simulator {
    /// Accrues interest on every market the vault allocates to, then takes
    /// the vault's performance fee on the growth of assets under management
    /// since the last accrual. Fee shares dilute holders and are minted to
    /// the vault's fee recipient.
    pub(crate) fn accrue_vault_interest(&mut self, vault: Address) -> Result<(), SimError> {
        let withdraw_queue = self.state.vault(vault)?.withdraw_queue.clone();

        let mut total_assets = U256::ZERO;
        for id in withdraw_queue {
            self.accrue_interest(id)?;
            let market = self.state.market(id)?;
            total_assets += self.state.position(vault, id).supply_assets(market);
        }

        let vault_state = self.state.vault_mut(vault)?;
        let interest = zero_floor_sub(total_assets, vault_state.last_total_assets);
        let fee_assets = w_mul_down(interest, vault_state.fee);
        // Shares priced against post-interest assets net of the fee itself.
        let fee_shares = if fee_assets.is_zero() {
            U256::ZERO
        } else {
            mul_div_down(
                fee_assets,
                vault_state.total_supply + vault_state.virtual_shares(),
                total_assets - fee_assets + U256::from(1),
            )
        };

        vault_state.total_assets = total_assets;
        vault_state.last_total_assets = total_assets;
        vault_state.total_supply += fee_shares;
        let fee_recipient = vault_state.fee_recipient;

        if !fee_shares.is_zero() {
            // Vault shares live in holdings under the vault's own address.
            self.state.holding_mut(fee_recipient, vault).balance += fee_shares;
        }
        Ok(())
    }

    /// Deposits `assets` into the vault for `owner`, routing them into the
    /// supply queue's markets up to each market's cap.
    pub(crate) fn vault_deposit(
        &mut self,
        sender: Address,
        vault: Address,
        assets: U256,
        owner: Address,
    ) -> Result<(), SimError> {
        self.accrue_vault_interest(vault)?;

        let vault_state = self.state.vault(vault)?;
        let asset = vault_state.asset;
        let shares = vault_state.to_shares(assets, RoundingDirection::Down);
        let supply_queue = vault_state.supply_queue.clone();

        self.transfer(asset, sender, vault, assets)?;

        let mut remaining = assets;
        for id in supply_queue {
            if remaining.is_zero() {
                break;
            }
            let cap = self.state.vault_market_config(vault, id)?.cap;
            if cap.is_zero() {
                continue;
            }
            self.accrue_interest(id)?;
            let market = self.state.market(id)?;
            let supply_assets = self.state.position(vault, id).supply_assets(market);
            let to_supply = min(remaining, zero_floor_sub(cap, supply_assets));
            if to_supply.is_zero() {
                continue;
            }
            self.supply(vault, id, Some(to_supply), None, vault)?;
            remaining -= to_supply;
        }
        if !remaining.is_zero() {
            return Err(SimError::AllCapsReached { vault, remaining });
        }

        let vault_state = self.state.vault_mut(vault)?;
        vault_state.total_assets += assets;
        vault_state.last_total_assets = vault_state.total_assets;
        vault_state.total_supply += shares;
        self.state.holding_mut(owner, vault).balance += shares;
        Ok(())
    }

    /// Redeems vault shares for `owner`, draining the withdraw queue's
    /// markets up to each market's available liquidity.
    pub(crate) fn vault_withdraw(
        &mut self,
        sender: Address,
        vault: Address,
        assets: Option<U256>,
        shares: Option<U256>,
        owner: Address,
        receiver: Address,
    ) -> Result<(), SimError> {
        let amount = exactly_one(assets, shares)?;
        self.accrue_vault_interest(vault)?;

        let vault_state = self.state.vault(vault)?;
        let asset = vault_state.asset;
        let withdraw_queue = vault_state.withdraw_queue.clone();
        let (assets, shares) = match amount {
            AssetsOrShares::Assets(assets) => {
                (assets, vault_state.to_shares(assets, RoundingDirection::Up))
            }
            AssetsOrShares::Shares(shares) => {
                (vault_state.to_assets(shares, RoundingDirection::Down), shares)
            }
        };

        if sender != owner {
            let holding = self.state.holding_mut(owner, vault);
            let allowance = holding.allowance(sender);
            if allowance < shares {
                return Err(SimError::InsufficientAllowance {
                    token: vault,
                    owner,
                    spender: sender,
                });
            }
            if allowance != U256::MAX {
                holding.allowances.insert(sender, allowance - shares);
            }
        }

        let holding = self.state.holding_mut(owner, vault);
        if holding.balance < shares {
            return Err(SimError::InsufficientBalance {
                user: owner,
                token: vault,
            });
        }
        holding.balance -= shares;

        let mut remaining = assets;
        for id in withdraw_queue {
            if remaining.is_zero() {
                break;
            }
            self.accrue_interest(id)?;
            let market = self.state.market(id)?;
            let supply_assets = self.state.position(vault, id).supply_assets(market);
            let to_withdraw = min(remaining, min(supply_assets, market.liquidity()));
            if to_withdraw.is_zero() {
                continue;
            }
            self.withdraw(vault, id, Some(to_withdraw), None, vault, vault)?;
            remaining -= to_withdraw;
        }
        if !remaining.is_zero() {
            return Err(SimError::NotEnoughLiquidity { vault, remaining });
        }

        let vault_state = self.state.vault_mut(vault)?;
        vault_state.total_assets = zero_floor_sub(vault_state.total_assets, assets);
        vault_state.last_total_assets = vault_state.total_assets;
        vault_state.total_supply -= shares;

        self.transfer(asset, vault, receiver, assets)
    }

    /// Rebalances the vault's supply across markets. Each allocation is a
    /// target supply level: markets above their target are withdrawn from
    /// first, markets below are then supplied to, and the batch must net to
    /// zero. A `U256::MAX` target absorbs everything withdrawn so far.
    pub(crate) fn reallocate(
        &mut self,
        sender: Address,
        vault: Address,
        allocations: &[MarketAllocation],
    ) -> Result<(), SimError> {
        let vault_state = self.state.vault(vault)?;
        // The vault itself reallocates when delegating for the public
        // allocator.
        let is_public_delegation =
            sender == vault && vault_state.public_allocator_config.is_some();
        if !vault_state.is_allocator(sender) && !is_public_delegation {
            return Err(SimError::NotAllocatorRole { vault, sender });
        }

        let mut total_supplied = U256::ZERO;
        let mut total_withdrawn = U256::ZERO;

        for allocation in allocations {
            let id = allocation.id;
            self.accrue_interest(id)?;

            let config = self.state.vault_market_config(vault, id)?;
            let cap = config.cap;
            let enabled = config.enabled;
            let market = self.state.market(id)?;
            let position = self.state.position(vault, id);
            let supply_assets = position.supply_assets(market);
            let supply_shares = position.supply_shares;

            let withdrawn = zero_floor_sub(supply_assets, allocation.assets);
            if !withdrawn.is_zero() {
                if !enabled {
                    return Err(SimError::MarketNotEnabled { vault, id });
                }
                // Emptying a market redeems by shares to leave no dust.
                if allocation.assets.is_zero() {
                    self.withdraw(vault, id, None, Some(supply_shares), vault, vault)?;
                    total_withdrawn += supply_assets;
                } else {
                    self.withdraw(vault, id, Some(withdrawn), None, vault, vault)?;
                    total_withdrawn += withdrawn;
                }
                continue;
            }

            let supplied = if allocation.assets == MAX_UINT_256 {
                zero_floor_sub(total_withdrawn, total_supplied)
            } else {
                allocation.assets - supply_assets
            };
            if supplied.is_zero() {
                continue;
            }

            if cap.is_zero() {
                return Err(SimError::UnauthorizedMarket { vault, id });
            }
            if supply_assets + supplied > cap {
                return Err(SimError::SupplyCapExceeded { vault, id, cap });
            }

            self.supply(vault, id, Some(supplied), None, vault)?;
            total_supplied += supplied;
        }

        if total_supplied != total_withdrawn {
            return Err(SimError::InconsistentReallocation {
                vault,
                supplied: total_supplied,
                withdrawn: total_withdrawn,
            });
        }

        // Asset-neutral by construction, but share rounding on the markets
        // can move the total by dust.
        let withdraw_queue = self.state.vault(vault)?.withdraw_queue.clone();
        let mut total_assets = U256::ZERO;
        for id in withdraw_queue {
            let market = self.state.market(id)?;
            total_assets += self.state.position(vault, id).supply_assets(market);
        }
        self.state.vault_mut(vault)?.total_assets = total_assets;
        Ok(())
    }

    /// Permissionless reallocation within owner-set flow bounds: anyone may
    /// move vault funds out of the listed markets into one supply market,
    /// paying the vault's flat native-token fee.
    pub(crate) fn public_reallocate(
        &mut self,
        sender: Address,
        vault: Address,
        withdrawals: &[MarketWithdrawal],
        supply_market_id: MarketId,
    ) -> Result<(), SimError> {
        let vault_state = self.state.vault(vault)?;
        let fee = vault_state
            .public_allocator_config
            .as_ref()
            .ok_or(SimError::UnknownVaultPublicAllocatorConfig { vault })?
            .fee;

        if !fee.is_zero() {
            self.transfer(NATIVE_ADDRESS, sender, Address::ZERO, fee)?;
            let vault_state = self.state.vault_mut(vault)?;
            if let Some(config) = vault_state.public_allocator_config.as_mut() {
                config.accrued_fee += fee;
            }
        }

        if withdrawals.is_empty() {
            return Err(SimError::EmptyWithdrawals { vault });
        }

        let supply_config = self.state.vault_market_config(vault, supply_market_id)?;
        if !supply_config.enabled {
            return Err(SimError::MarketNotEnabled {
                vault,
                id: supply_market_id,
            });
        }
        if supply_config.public_allocator_config.is_none() {
            return Err(SimError::UnknownVaultMarketPublicAllocatorConfig {
                vault,
                id: supply_market_id,
            });
        }

        let mut allocations = Vec::with_capacity(withdrawals.len() + 1);
        let mut total_withdrawn = U256::ZERO;
        let mut prev: Option<MarketId> = None;

        for withdrawal in withdrawals {
            let id = withdrawal.id;
            // Sorted, unique withdrawals make the batch canonical.
            if let Some(prev) = prev {
                if prev >= id {
                    return Err(SimError::InconsistentWithdrawals {
                        vault,
                        prev,
                        next: id,
                    });
                }
            }
            prev = Some(id);

            let config = self.state.vault_market_config(vault, id)?;
            if !config.enabled {
                return Err(SimError::MarketNotEnabled { vault, id });
            }
            let market_flow = config.public_allocator_config.ok_or(
                SimError::UnknownVaultMarketPublicAllocatorConfig { vault, id },
            )?;
            if market_flow.max_out < withdrawal.assets {
                return Err(SimError::MaxOutflowExceeded { vault, id });
            }
            if withdrawal.assets.is_zero() {
                return Err(SimError::WithdrawZero { vault, id });
            }
            if id == supply_market_id {
                return Err(SimError::DepositMarketInWithdrawals { vault, id });
            }

            self.accrue_interest(id)?;
            let market = self.state.market(id)?;
            let supply_assets = self.state.position(vault, id).supply_assets(market);
            if supply_assets < withdrawal.assets {
                return Err(SimError::NotEnoughSupply { vault, id });
            }

            let config = self.state.vault_market_config_mut(vault, id)?;
            if let Some(flow) = config.public_allocator_config.as_mut() {
                flow.max_in += withdrawal.assets;
                flow.max_out -= withdrawal.assets;
            }

            total_withdrawn += withdrawal.assets;
            allocations.push(MarketAllocation {
                id,
                assets: supply_assets - withdrawal.assets,
            });
        }

        let supply_config = self.state.vault_market_config_mut(vault, supply_market_id)?;
        if let Some(flow) = supply_config.public_allocator_config.as_mut() {
            if flow.max_in < total_withdrawn {
                return Err(SimError::MaxInflowExceeded {
                    vault,
                    id: supply_market_id,
                });
            }
            flow.max_in -= total_withdrawn;
            flow.max_out += total_withdrawn;
        }

        allocations.push(MarketAllocation {
            id: supply_market_id,
            assets: MAX_UINT_256,
        });
        self.reallocate(vault, vault, &allocations)
    }
}
