//! Deterministic ledger simulation for Morpho Blue markets and
//! MetaMorpho-style vaults.
//!
//! The crate models the protocol's accounting as a pure in-memory state
//! machine: a [`SimulationState`] snapshot holds every token balance, market,
//! position and vault, and a [`Simulator`] applies typed operations to it
//! with the exact integer arithmetic and rounding of the on-chain contracts.
//! No chain access is involved; outcomes are reproducible from the snapshot
//! alone.
//!
//! # Overview
//!
//! - [`math`] is the fixed-point toolkit: WAD arithmetic, share/asset
//!   conversions with virtual offsets, and the Taylor-compounded interest
//!   factor.
//! - [`market`], [`position`], [`vault`] and [`token`] are the data model.
//! - [`irm`] is the pluggable borrow-rate boundary, with the adaptive curve
//!   model as the default.
//! - [`operations`] is the operation vocabulary and [`handlers`] applies it.
//!
//! # Example
//!
//! ```rust,ignore
//! use blue_sim::{BlueOperation, Operation, Simulator};
//! use alloy_primitives::U256;
//!
//! let mut simulator = Simulator::new(snapshot);
//! simulator.apply(&Operation::Blue {
//!     sender: user,
//!     op: BlueOperation::Supply {
//!         id: market_id,
//!         assets: Some(U256::from(1_000_000u64)),
//!         shares: None,
//!         on_behalf: user,
//!     },
//! })?;
//! ```

pub mod error;
pub mod handlers;
pub mod irm;
pub mod market;
pub mod math;
pub mod operations;
pub mod position;
pub mod state;
pub mod token;
pub mod vault;

// Re-export commonly used types
pub use error::{MarketId, SimError};

pub use handlers::Simulator;

pub use market::{
    AccruedInterest, Market, MarketParams, LIQUIDATION_CURSOR, MAX_LIQUIDATION_INCENTIVE_FACTOR,
};

pub use math::{RoundingDirection, MAX_UINT_256, ORACLE_PRICE_SCALE, WAD};

pub use operations::{
    exactly_one, AssetsOrShares, BlueOperation, Erc20Operation, MarketAllocation,
    MarketWithdrawal, Operation, VaultOperation,
};

pub use position::Position;

pub use state::SimulationState;

pub use token::{Holding, Token, WrapStrategy, Wrapper, NATIVE_ADDRESS};

pub use vault::{
    PublicAllocatorConfig, VaultMarketConfig, VaultMarketPublicAllocatorConfig, VaultState,
};

pub use irm::{
    w_exp, AdaptiveCurveIrm, BorrowRate, BorrowRateModel, FixedRateIrm, ADJUSTMENT_SPEED,
    CURVE_STEEPNESS, INITIAL_RATE_AT_TARGET, MAX_RATE_AT_TARGET, MIN_RATE_AT_TARGET,
    TARGET_UTILIZATION,
};
