//! The closed taxonomy of simulation failures.
//!
//! Each variant corresponds to one distinct revert condition of the on-chain
//! contracts and carries the offending address, market id or amount so a
//! failure can be correlated back to the operation that triggered it. There
//! are two severities only: rejected input (malformed arguments) and rejected
//! state transition (would violate a protocol invariant). Arithmetic overflow
//! in the math module is a fatal programming error and is deliberately absent.

use alloy_primitives::{Address, FixedBytes, U256};
use thiserror::Error;

/// A market's unique 32-byte identifier (keccak256 of its immutable params).
pub type MarketId = FixedBytes<32>;

/// Errors raised while applying an operation to a ledger snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// Malformed operation arguments, identical across all handlers.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: &'static str },

    /// Interest accrual attempted with a timestamp before the last update.
    #[error("invalid accrual: timestamp {timestamp} is before last update {last_update}")]
    InvalidInterestAccrual { timestamp: u64, last_update: u64 },

    #[error("unknown market {id}")]
    UnknownMarket { id: MarketId },

    #[error("unknown token {token}")]
    UnknownToken { token: Address },

    /// Wrap/unwrap requested on a token with no wrapper conversion.
    #[error("token {token} is not a wrapped token")]
    UnknownWrappedToken { token: Address },

    #[error("unknown vault {vault}")]
    UnknownVault { vault: Address },

    #[error("unknown config for market {id} on vault {vault}")]
    UnknownVaultMarketConfig { vault: Address, id: MarketId },

    #[error("unknown public allocator config for vault {vault}")]
    UnknownVaultPublicAllocatorConfig { vault: Address },

    #[error("unknown public allocator config for market {id} on vault {vault}")]
    UnknownVaultMarketPublicAllocatorConfig { vault: Address, id: MarketId },

    #[error("unknown oracle price on market {id}")]
    UnknownOraclePrice { id: MarketId },

    #[error("insufficient balance of token {token} for user {user}")]
    InsufficientBalance { user: Address, token: Address },

    #[error("insufficient allowance on token {token} from {owner} to {spender}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
    },

    #[error("invalid permit nonce {nonce} on token {token} for user {user}")]
    InvalidPermitNonce {
        token: Address,
        user: Address,
        nonce: u64,
    },

    /// Sender is neither `on_behalf` nor an authorized manager of it.
    #[error("sender {sender} is not authorized to manage {on_behalf}")]
    Unauthorized { sender: Address, on_behalf: Address },

    /// The position lacks the shares or collateral the operation consumes.
    #[error("insufficient position for user {user} on market {id}")]
    InsufficientPosition { user: Address, id: MarketId },

    #[error("insufficient liquidity on market {id}")]
    InsufficientLiquidity { id: MarketId },

    #[error("insufficient collateral for user {user} on market {id}")]
    InsufficientCollateral { user: Address, id: MarketId },

    /// Liquidation attempted against a position that is still healthy.
    #[error("position of user {user} on market {id} is healthy")]
    HealthyPosition { user: Address, id: MarketId },

    #[error("sender {sender} is not an allocator of vault {vault}")]
    NotAllocatorRole { vault: Address, sender: Address },

    #[error("market {id} is not enabled on vault {vault}")]
    MarketNotEnabled { vault: Address, id: MarketId },

    /// Supplying into a market whose cap is zero.
    #[error("unauthorized market {id} on vault {vault}")]
    UnauthorizedMarket { vault: Address, id: MarketId },

    #[error("supply cap of {cap} exceeded on market {id} for vault {vault}")]
    SupplyCapExceeded {
        vault: Address,
        id: MarketId,
        cap: U256,
    },

    /// Reallocation batches must be asset-neutral.
    #[error("inconsistent reallocation on vault {vault}: supplied {supplied}, withdrawn {withdrawn}")]
    InconsistentReallocation {
        vault: Address,
        supplied: U256,
        withdrawn: U256,
    },

    /// A vault deposit could not be fully placed under the market caps.
    #[error("all caps reached on vault {vault}: {remaining} assets left to supply")]
    AllCapsReached { vault: Address, remaining: U256 },

    /// A vault withdrawal could not be fully sourced from market liquidity.
    #[error("not enough liquidity on vault {vault}: {remaining} assets left to withdraw")]
    NotEnoughLiquidity { vault: Address, remaining: U256 },

    #[error("empty withdrawals for vault {vault}")]
    EmptyWithdrawals { vault: Address },

    /// Public withdrawals must be strictly increasing by market id.
    #[error("inconsistent withdrawals for vault {vault}: market {next} does not follow {prev}")]
    InconsistentWithdrawals {
        vault: Address,
        prev: MarketId,
        next: MarketId,
    },

    #[error("zero withdrawal of market {id} for vault {vault}")]
    WithdrawZero { vault: Address, id: MarketId },

    #[error("deposit market {id} included in withdrawals for vault {vault}")]
    DepositMarketInWithdrawals { vault: Address, id: MarketId },

    #[error("max outflow exceeded on market {id} for vault {vault}")]
    MaxOutflowExceeded { vault: Address, id: MarketId },

    #[error("max inflow exceeded on market {id} for vault {vault}")]
    MaxInflowExceeded { vault: Address, id: MarketId },

    /// The vault does not hold enough supply on a public withdrawal market.
    #[error("not enough supply on market {id} for vault {vault}")]
    NotEnoughSupply { vault: Address, id: MarketId },
}
