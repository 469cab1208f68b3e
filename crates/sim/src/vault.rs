//! Vault state: ERC4626-style share accounting over a set of markets.
//!
//! A vault owns one position per market in its withdraw queue and issues its
//! own share token at the vault's address. Deposits are routed through the
//! supply queue under per-market caps; withdrawals drain the withdraw queue.

use std::collections::HashSet;

use alloy_primitives::{Address, U256};

use crate::error::MarketId;
use crate::math::{mul_div, RoundingDirection};

/// One vault's mutable state.
#[derive(Debug, Clone)]
pub struct VaultState {
    pub address: Address,
    pub owner: Address,
    /// The single asset token accepted by the vault.
    pub asset: Address,
    /// Addresses holding the allocator role, in addition to the owner.
    pub allocators: HashSet<Address>,
    /// Assets under management after the last vault-level accrual.
    pub total_assets: U256,
    /// Assets under management at the time fees were last taken. Interest is
    /// the growth of `total_assets` past this watermark.
    pub last_total_assets: U256,
    /// Total vault shares in circulation.
    pub total_supply: U256,
    /// Performance fee on interest (WAD-scaled).
    pub fee: U256,
    pub fee_recipient: Address,
    /// Decimals offset applied to the share/asset virtual accounting.
    pub decimals_offset: u8,
    /// Markets deposits are routed into, in order.
    pub supply_queue: Vec<MarketId>,
    /// Markets withdrawals are drained from, in order. Superset of the supply
    /// queue: every market the vault has a position on appears here.
    pub withdraw_queue: Vec<MarketId>,
    /// Present when the vault opted in to the public allocator.
    pub public_allocator_config: Option<PublicAllocatorConfig>,
}

/// Vault-level public allocator settings.
#[derive(Debug, Clone, Default)]
pub struct PublicAllocatorConfig {
    /// Flat fee in native tokens charged per public reallocation.
    pub fee: U256,
    /// Fees collected so far, withdrawable by the vault owner.
    pub accrued_fee: U256,
}

/// A vault's per-market settings.
#[derive(Debug, Clone, Default)]
pub struct VaultMarketConfig {
    /// Maximum assets the vault may supply on this market. Zero means the
    /// market is not authorized for deposits.
    pub cap: U256,
    /// Whether the market is part of the vault's withdraw queue.
    pub enabled: bool,
    /// Timestamp at which a pending removal becomes effective.
    pub removable_at: u64,
    /// Present when the public allocator may move funds on this market.
    pub public_allocator_config: Option<VaultMarketPublicAllocatorConfig>,
}

/// Per-market flow bounds for the public allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct VaultMarketPublicAllocatorConfig {
    /// Remaining assets the public allocator may move into this market.
    pub max_in: U256,
    /// Remaining assets the public allocator may move out of this market.
    pub max_out: U256,
}

impl VaultState {
    /// Virtual shares backing the virtual asset: `10^decimals_offset`.
    pub fn virtual_shares(&self) -> U256 {
        U256::from(10u64).pow(U256::from(self.decimals_offset))
    }

    /// Converts vault assets to vault shares at the current exchange rate.
    pub fn to_shares(&self, assets: U256, rounding: RoundingDirection) -> U256 {
        mul_div(
            assets,
            self.total_supply + self.virtual_shares(),
            self.total_assets + U256::from(1),
            rounding,
        )
    }

    /// Converts vault shares to vault assets at the current exchange rate.
    pub fn to_assets(&self, shares: U256, rounding: RoundingDirection) -> U256 {
        mul_div(
            shares,
            self.total_assets + U256::from(1),
            self.total_supply + self.virtual_shares(),
            rounding,
        )
    }

    pub fn is_allocator(&self, address: Address) -> bool {
        address == self.owner || self.allocators.contains(&address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> VaultState {
        VaultState {
            address: Address::from([0x11; 20]),
            owner: Address::from([0x22; 20]),
            asset: Address::from([0x33; 20]),
            allocators: HashSet::new(),
            total_assets: U256::ZERO,
            last_total_assets: U256::ZERO,
            total_supply: U256::ZERO,
            fee: U256::ZERO,
            fee_recipient: Address::ZERO,
            decimals_offset: 6,
            supply_queue: Vec::new(),
            withdraw_queue: Vec::new(),
            public_allocator_config: None,
        }
    }

    #[test]
    fn empty_vault_prices_shares_by_offset() {
        let vault = vault();
        let shares = vault.to_shares(U256::from(100), RoundingDirection::Down);
        assert_eq!(shares, U256::from(100_000_000u64));
        assert_eq!(
            vault.to_assets(shares, RoundingDirection::Down),
            U256::from(100)
        );
    }

    #[test]
    fn share_price_tracks_total_assets() {
        let mut vault = vault();
        vault.total_supply = U256::from(1_000_000_000u64);
        vault.total_assets = U256::from(2_000u64);

        // ~2 assets per 1e6 shares.
        let assets = vault.to_assets(U256::from(1_000_000u64), RoundingDirection::Down);
        assert_eq!(assets, U256::from(1));

        let assets_up = vault.to_assets(U256::from(1_000_000u64), RoundingDirection::Up);
        assert_eq!(assets_up, U256::from(2));
    }

    #[test]
    fn owner_is_always_an_allocator() {
        let mut vault = vault();
        assert!(vault.is_allocator(vault.owner));
        assert!(!vault.is_allocator(Address::from([0x44; 20])));

        vault.allocators.insert(Address::from([0x44; 20]));
        assert!(vault.is_allocator(Address::from([0x44; 20])));
    }
}
