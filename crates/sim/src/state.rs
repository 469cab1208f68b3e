//! The in-memory ledger snapshot operations are applied to.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::error::{MarketId, SimError};
use crate::market::Market;
use crate::position::Position;
use crate::token::{Holding, Token};
use crate::vault::{VaultMarketConfig, VaultState};

/// A complete snapshot of every balance, market, position and vault the
/// engine knows about at one instant. Cloning a snapshot is how speculative
/// execution stays isolated from the caller's state.
#[derive(Debug, Clone, Default)]
pub struct SimulationState {
    /// The snapshot's clock, in seconds.
    pub timestamp: u64,
    /// Pseudo-address holding all market-escrowed funds.
    pub morpho: Address,
    /// Recipient of protocol fee shares minted on accrual.
    pub fee_recipient: Address,
    pub tokens: HashMap<Address, Token>,
    pub markets: HashMap<MarketId, Market>,
    /// Keyed by `(user, market id)`. Missing entries read as empty.
    pub positions: HashMap<(Address, MarketId), Position>,
    /// Keyed by `(user, token)`. Missing entries read as empty.
    pub holdings: HashMap<(Address, Address), Holding>,
    pub vaults: HashMap<Address, VaultState>,
    /// Keyed by `(vault, market id)`.
    pub vault_market_configs: HashMap<(Address, MarketId), VaultMarketConfig>,
    /// `(on_behalf, sender)` pairs where `sender` may manage positions.
    pub authorizations: HashMap<(Address, Address), bool>,
}

impl SimulationState {
    pub fn market(&self, id: MarketId) -> Result<&Market, SimError> {
        self.markets.get(&id).ok_or(SimError::UnknownMarket { id })
    }

    pub fn market_mut(&mut self, id: MarketId) -> Result<&mut Market, SimError> {
        self.markets
            .get_mut(&id)
            .ok_or(SimError::UnknownMarket { id })
    }

    pub fn token(&self, token: Address) -> Result<&Token, SimError> {
        self.tokens
            .get(&token)
            .ok_or(SimError::UnknownToken { token })
    }

    pub fn vault(&self, vault: Address) -> Result<&VaultState, SimError> {
        self.vaults
            .get(&vault)
            .ok_or(SimError::UnknownVault { vault })
    }

    pub fn vault_mut(&mut self, vault: Address) -> Result<&mut VaultState, SimError> {
        self.vaults
            .get_mut(&vault)
            .ok_or(SimError::UnknownVault { vault })
    }

    pub fn vault_market_config(
        &self,
        vault: Address,
        id: MarketId,
    ) -> Result<&VaultMarketConfig, SimError> {
        self.vault_market_configs
            .get(&(vault, id))
            .ok_or(SimError::UnknownVaultMarketConfig { vault, id })
    }

    pub fn vault_market_config_mut(
        &mut self,
        vault: Address,
        id: MarketId,
    ) -> Result<&mut VaultMarketConfig, SimError> {
        self.vault_market_configs
            .get_mut(&(vault, id))
            .ok_or(SimError::UnknownVaultMarketConfig { vault, id })
    }

    /// Copy-read of a position; missing positions are empty, not errors.
    pub fn position(&self, user: Address, id: MarketId) -> Position {
        self.positions.get(&(user, id)).copied().unwrap_or_default()
    }

    pub fn position_mut(&mut self, user: Address, id: MarketId) -> &mut Position {
        self.positions.entry((user, id)).or_default()
    }

    /// Read of a holding; missing holdings are empty, not errors.
    pub fn holding(&self, user: Address, token: Address) -> Holding {
        self.holdings
            .get(&(user, token))
            .cloned()
            .unwrap_or_default()
    }

    pub fn holding_mut(&mut self, user: Address, token: Address) -> &mut Holding {
        self.holdings.entry((user, token)).or_default()
    }

    pub fn balance(&self, user: Address, token: Address) -> U256 {
        self.holdings
            .get(&(user, token))
            .map(|h| h.balance)
            .unwrap_or_default()
    }

    /// Whether `sender` may act on positions owned by `on_behalf`.
    pub fn is_authorized(&self, on_behalf: Address, sender: Address) -> bool {
        sender == on_behalf
            || self
                .authorizations
                .get(&(on_behalf, sender))
                .copied()
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_position_reads_empty() {
        let state = SimulationState::default();
        let user = Address::from([1u8; 20]);
        let id = MarketId::from([2u8; 32]);
        assert!(state.position(user, id).is_empty());
        assert_eq!(state.balance(user, Address::from([3u8; 20])), U256::ZERO);
    }

    #[test]
    fn missing_market_is_an_error() {
        let state = SimulationState::default();
        let id = MarketId::from([2u8; 32]);
        assert_eq!(state.market(id).err(), Some(SimError::UnknownMarket { id }));
    }

    #[test]
    fn self_authorization_is_implicit() {
        let mut state = SimulationState::default();
        let owner = Address::from([1u8; 20]);
        let manager = Address::from([2u8; 20]);

        assert!(state.is_authorized(owner, owner));
        assert!(!state.is_authorized(owner, manager));

        state.authorizations.insert((owner, manager), true);
        assert!(state.is_authorized(owner, manager));
    }
}
