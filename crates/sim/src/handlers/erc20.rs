//! Token handlers: balance moves, approvals and wrapper conversions.

use alloy_primitives::{Address, U256};

use crate::error::SimError;
use crate::handlers::Simulator;

impl Simulator {
    /// Moves `amount` of `token` from `from` to `to`. Transfers to the zero
    /// address burn. This is the single choke point every handler moves
    /// balances through.
    pub(crate) fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), SimError> {
        if amount.is_zero() {
            return Ok(());
        }

        let from_holding = self.state.holding_mut(from, token);
        if from_holding.balance < amount {
            return Err(SimError::InsufficientBalance { user: from, token });
        }
        from_holding.balance -= amount;

        if to != Address::ZERO {
            self.state.holding_mut(to, token).balance += amount;
        }
        Ok(())
    }

    pub(crate) fn transfer_from(
        &mut self,
        token: Address,
        sender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), SimError> {
        if sender != from {
            let holding = self.state.holding_mut(from, token);
            let allowance = holding.allowance(sender);
            if allowance < amount {
                return Err(SimError::InsufficientAllowance {
                    token,
                    owner: from,
                    spender: sender,
                });
            }
            // An unlimited allowance is never drawn down.
            if allowance != U256::MAX {
                holding.allowances.insert(sender, allowance - amount);
            }
        }
        self.transfer(token, from, to, amount)
    }

    pub(crate) fn approve(
        &mut self,
        token: Address,
        sender: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), SimError> {
        self.state
            .holding_mut(sender, token)
            .allowances
            .insert(spender, amount);
        Ok(())
    }

    /// Signed approval. The nonce must match the owner's current permit
    /// nonce exactly; a successful permit consumes it.
    pub(crate) fn permit(
        &mut self,
        token: Address,
        sender: Address,
        spender: Address,
        amount: U256,
        nonce: u64,
    ) -> Result<(), SimError> {
        let holding = self.state.holding_mut(sender, token);
        if holding.permit_nonce != nonce {
            return Err(SimError::InvalidPermitNonce {
                token,
                user: sender,
                nonce,
            });
        }
        holding.permit_nonce += 1;
        holding.allowances.insert(spender, amount);
        Ok(())
    }

    /// Wraps `amount` of the underlying into `token`.
    pub(crate) fn wrap(
        &mut self,
        token: Address,
        sender: Address,
        amount: U256,
    ) -> Result<(), SimError> {
        let wrapped_token = self.state.token(token)?;
        let underlying = wrapped_token
            .wrapper
            .as_ref()
            .map(|w| w.underlying)
            .ok_or(SimError::UnknownWrappedToken { token })?;
        let wrapped_amount = wrapped_token
            .to_wrapped_exact_in(amount)
            .ok_or(SimError::UnknownWrappedToken { token })?;

        // The underlying is escrowed by the wrapper contract itself.
        self.transfer(underlying, sender, token, amount)?;
        self.state.holding_mut(sender, token).balance += wrapped_amount;
        Ok(())
    }

    /// Unwraps `amount` of `token` back into its underlying.
    pub(crate) fn unwrap(
        &mut self,
        token: Address,
        sender: Address,
        amount: U256,
    ) -> Result<(), SimError> {
        let wrapped_token = self.state.token(token)?;
        let underlying = wrapped_token
            .wrapper
            .as_ref()
            .map(|w| w.underlying)
            .ok_or(SimError::UnknownWrappedToken { token })?;
        let unwrapped_amount = wrapped_token
            .to_unwrapped_exact_in(amount)
            .ok_or(SimError::UnknownWrappedToken { token })?;

        // Burn the wrapped amount, release escrow from the wrapper.
        self.transfer(token, sender, Address::ZERO, amount)?;
        self.transfer(underlying, token, sender, unwrapped_amount)
    }
}
