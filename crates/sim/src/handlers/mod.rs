//! Operation handlers.
//!
//! [`Simulator`] owns a ledger snapshot and a borrow-rate model and applies
//! operations to it. Dispatch is a flat match over the operation enums; each
//! arm calls one concrete handler, and composite handlers (vault deposits,
//! reallocations) call the sub-handlers they are built from directly rather
//! than re-entering dispatch.
//!
//! Every public entry point is atomic: an operation that fails leaves the
//! snapshot exactly as it was before the call.

mod blue;
mod erc20;
mod vault;

use crate::error::SimError;
use crate::irm::{AdaptiveCurveIrm, BorrowRateModel};
use crate::operations::{BlueOperation, Erc20Operation, Operation, VaultOperation};
use crate::state::SimulationState;

/// Applies operations to a [`SimulationState`].
pub struct Simulator {
    state: SimulationState,
    irm: Box<dyn BorrowRateModel>,
}

impl Simulator {
    /// A simulator over `state` using the adaptive curve rate model.
    pub fn new(state: SimulationState) -> Self {
        Self::with_model(state, Box::new(AdaptiveCurveIrm))
    }

    /// A simulator over `state` using a caller-provided rate model.
    pub fn with_model(state: SimulationState, irm: Box<dyn BorrowRateModel>) -> Self {
        Self { state, irm }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn into_state(self) -> SimulationState {
        self.state
    }

    /// Applies one operation. On error the snapshot is left untouched.
    pub fn apply(&mut self, operation: &Operation) -> Result<(), SimError> {
        let checkpoint = self.state.clone();
        let result = self.dispatch(operation);
        if result.is_err() {
            self.state = checkpoint;
        }
        result
    }

    /// Applies a batch of operations atomically, returning the snapshot
    /// after each step. If any operation fails the whole batch is rolled
    /// back and the error is returned.
    pub fn simulate(
        &mut self,
        operations: &[Operation],
    ) -> Result<Vec<SimulationState>, SimError> {
        let checkpoint = self.state.clone();
        let mut steps = Vec::with_capacity(operations.len());
        for operation in operations {
            if let Err(err) = self.dispatch(operation) {
                self.state = checkpoint;
                return Err(err);
            }
            steps.push(self.state.clone());
        }
        Ok(steps)
    }

    fn dispatch(&mut self, operation: &Operation) -> Result<(), SimError> {
        match operation {
            Operation::Blue { sender, op } => {
                tracing::debug!(sender = %sender, op = ?op, "blue operation");
                match *op {
                    BlueOperation::AccrueInterest { id } => self.accrue_interest(id),
                    BlueOperation::Supply {
                        id,
                        assets,
                        shares,
                        on_behalf,
                    } => self.supply(*sender, id, assets, shares, on_behalf),
                    BlueOperation::Withdraw {
                        id,
                        assets,
                        shares,
                        on_behalf,
                        receiver,
                    } => self.withdraw(*sender, id, assets, shares, on_behalf, receiver),
                    BlueOperation::Borrow {
                        id,
                        assets,
                        shares,
                        on_behalf,
                        receiver,
                    } => self.borrow(*sender, id, assets, shares, on_behalf, receiver),
                    BlueOperation::Repay {
                        id,
                        assets,
                        shares,
                        on_behalf,
                    } => self.repay(*sender, id, assets, shares, on_behalf),
                    BlueOperation::SupplyCollateral {
                        id,
                        assets,
                        on_behalf,
                    } => self.supply_collateral(*sender, id, assets, on_behalf),
                    BlueOperation::WithdrawCollateral {
                        id,
                        assets,
                        on_behalf,
                        receiver,
                    } => self.withdraw_collateral(*sender, id, assets, on_behalf, receiver),
                    BlueOperation::Liquidate {
                        id,
                        borrower,
                        seized_assets,
                        repaid_shares,
                    } => self.liquidate(*sender, id, borrower, seized_assets, repaid_shares),
                }
            }
            Operation::Erc20 { sender, token, op } => {
                tracing::debug!(sender = %sender, token = %token, op = ?op, "erc20 operation");
                match *op {
                    Erc20Operation::Transfer { to, amount } => {
                        self.transfer(*token, *sender, to, amount)
                    }
                    Erc20Operation::TransferFrom { from, to, amount } => {
                        self.transfer_from(*token, *sender, from, to, amount)
                    }
                    Erc20Operation::Approve { spender, amount } => {
                        self.approve(*token, *sender, spender, amount)
                    }
                    Erc20Operation::Permit {
                        spender,
                        amount,
                        nonce,
                    } => self.permit(*token, *sender, spender, amount, nonce),
                    Erc20Operation::Wrap { amount } => self.wrap(*token, *sender, amount),
                    Erc20Operation::Unwrap { amount } => self.unwrap(*token, *sender, amount),
                }
            }
            Operation::Vault { sender, vault, op } => {
                tracing::debug!(sender = %sender, vault = %vault, op = ?op, "vault operation");
                match op {
                    VaultOperation::AccrueInterest => self.accrue_vault_interest(*vault),
                    VaultOperation::Deposit { assets, owner } => {
                        self.vault_deposit(*sender, *vault, *assets, *owner)
                    }
                    VaultOperation::Withdraw {
                        assets,
                        shares,
                        owner,
                        receiver,
                    } => self.vault_withdraw(*sender, *vault, *assets, *shares, *owner, *receiver),
                    VaultOperation::Reallocate { allocations } => {
                        self.reallocate(*sender, *vault, allocations)
                    }
                    VaultOperation::PublicReallocate {
                        withdrawals,
                        supply_market_id,
                    } => self.public_reallocate(*sender, *vault, withdrawals, *supply_market_id),
                }
            }
        }
    }
}
