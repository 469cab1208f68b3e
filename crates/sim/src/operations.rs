//! The operation vocabulary: everything the engine can be asked to apply.
//!
//! Amount-or-shares arguments mirror the contracts' calling convention:
//! exactly one of `assets` and `shares` must be set, and which one is set
//! picks the rounding direction of the derived quantity.

use alloy_primitives::{Address, U256};

use crate::error::{MarketId, SimError};

/// A single ledger operation, tagged with its sender.
#[derive(Debug, Clone)]
pub enum Operation {
    Blue {
        sender: Address,
        op: BlueOperation,
    },
    Erc20 {
        sender: Address,
        token: Address,
        op: Erc20Operation,
    },
    Vault {
        sender: Address,
        vault: Address,
        op: VaultOperation,
    },
}

/// Operations against the core lending markets.
#[derive(Debug, Clone, Copy)]
pub enum BlueOperation {
    AccrueInterest {
        id: MarketId,
    },
    Supply {
        id: MarketId,
        assets: Option<U256>,
        shares: Option<U256>,
        on_behalf: Address,
    },
    Withdraw {
        id: MarketId,
        assets: Option<U256>,
        shares: Option<U256>,
        on_behalf: Address,
        receiver: Address,
    },
    Borrow {
        id: MarketId,
        assets: Option<U256>,
        shares: Option<U256>,
        on_behalf: Address,
        receiver: Address,
    },
    Repay {
        id: MarketId,
        assets: Option<U256>,
        shares: Option<U256>,
        on_behalf: Address,
    },
    SupplyCollateral {
        id: MarketId,
        assets: U256,
        on_behalf: Address,
    },
    WithdrawCollateral {
        id: MarketId,
        assets: U256,
        on_behalf: Address,
        receiver: Address,
    },
    Liquidate {
        id: MarketId,
        borrower: Address,
        seized_assets: Option<U256>,
        repaid_shares: Option<U256>,
    },
}

/// Token-level operations.
#[derive(Debug, Clone, Copy)]
pub enum Erc20Operation {
    Transfer {
        to: Address,
        amount: U256,
    },
    TransferFrom {
        from: Address,
        to: Address,
        amount: U256,
    },
    Approve {
        spender: Address,
        amount: U256,
    },
    /// Signed approval consuming the owner's permit nonce.
    Permit {
        spender: Address,
        amount: U256,
        nonce: u64,
    },
    Wrap {
        amount: U256,
    },
    Unwrap {
        amount: U256,
    },
}

/// Operations against a vault.
#[derive(Debug, Clone)]
pub enum VaultOperation {
    AccrueInterest,
    Deposit {
        assets: U256,
        owner: Address,
    },
    Withdraw {
        assets: Option<U256>,
        shares: Option<U256>,
        owner: Address,
        receiver: Address,
    },
    Reallocate {
        allocations: Vec<MarketAllocation>,
    },
    PublicReallocate {
        withdrawals: Vec<MarketWithdrawal>,
        supply_market_id: MarketId,
    },
}

/// One target of a reallocation: bring the vault's supply on `id` to
/// `assets`. `U256::MAX` means "absorb everything withdrawn so far".
#[derive(Debug, Clone, Copy)]
pub struct MarketAllocation {
    pub id: MarketId,
    pub assets: U256,
}

/// One source of a public reallocation: move `assets` out of market `id`.
#[derive(Debug, Clone, Copy)]
pub struct MarketWithdrawal {
    pub id: MarketId,
    pub assets: U256,
}

/// The resolved side of an amount-or-shares argument.
#[derive(Debug, Clone, Copy)]
pub enum AssetsOrShares {
    Assets(U256),
    Shares(U256),
}

/// Enforces the exactly-one convention shared by every dual-argument
/// operation.
pub fn exactly_one(
    assets: Option<U256>,
    shares: Option<U256>,
) -> Result<AssetsOrShares, SimError> {
    match (assets, shares) {
        (Some(assets), None) => Ok(AssetsOrShares::Assets(assets)),
        (None, Some(shares)) => Ok(AssetsOrShares::Shares(shares)),
        (Some(_), Some(_)) => Err(SimError::InvalidInput {
            reason: "exactly one of assets and shares must be set, got both",
        }),
        (None, None) => Err(SimError::InvalidInput {
            reason: "exactly one of assets and shares must be set, got neither",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_accepts_each_side() {
        assert!(matches!(
            exactly_one(Some(U256::from(1)), None),
            Ok(AssetsOrShares::Assets(_))
        ));
        assert!(matches!(
            exactly_one(None, Some(U256::from(1))),
            Ok(AssetsOrShares::Shares(_))
        ));
    }

    #[test]
    fn exactly_one_rejects_both_and_neither() {
        assert!(matches!(
            exactly_one(Some(U256::ZERO), Some(U256::ZERO)),
            Err(SimError::InvalidInput { .. })
        ));
        assert!(matches!(
            exactly_one(None, None),
            Err(SimError::InvalidInput { .. })
        ));
    }
}
