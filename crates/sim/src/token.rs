//! Tokens, wrapped-token conversions and per-user holdings.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::math::{mul_div, RoundingDirection, WAD};

/// Placeholder address of the chain's native gas token.
pub const NATIVE_ADDRESS: Address = Address::new([0xee; 20]);

/// An ERC20-equivalent token known to the ledger.
#[derive(Debug, Clone)]
pub struct Token {
    pub address: Address,
    pub decimals: u8,
    /// Present when the token is a wrapper around another token.
    pub wrapper: Option<Wrapper>,
}

impl Token {
    pub fn new(address: Address, decimals: u8) -> Self {
        Self {
            address,
            decimals,
            wrapper: None,
        }
    }

    pub fn wrapped(address: Address, decimals: u8, wrapper: Wrapper) -> Self {
        Self {
            address,
            decimals,
            wrapper: Some(wrapper),
        }
    }

    /// The wrapped amount received for wrapping exactly `amount` underlying.
    pub fn to_wrapped_exact_in(&self, amount: U256) -> Option<U256> {
        self.wrapper
            .as_ref()
            .map(|w| w.to_wrapped(amount, self.decimals, RoundingDirection::Down))
    }

    /// The underlying amount required to receive exactly `amount` wrapped.
    pub fn to_wrapped_exact_out(&self, amount: U256) -> Option<U256> {
        self.wrapper
            .as_ref()
            .map(|w| w.to_unwrapped(amount, self.decimals, RoundingDirection::Up))
    }

    /// The underlying amount received for unwrapping exactly `amount` wrapped.
    pub fn to_unwrapped_exact_in(&self, amount: U256) -> Option<U256> {
        self.wrapper
            .as_ref()
            .map(|w| w.to_unwrapped(amount, self.decimals, RoundingDirection::Down))
    }

    /// The wrapped amount required to receive exactly `amount` underlying.
    pub fn to_unwrapped_exact_out(&self, amount: U256) -> Option<U256> {
        self.wrapper
            .as_ref()
            .map(|w| w.to_wrapped(amount, self.decimals, RoundingDirection::Up))
    }
}

/// A deterministic, reversible conversion between a token and its underlying.
#[derive(Debug, Clone)]
pub struct Wrapper {
    pub underlying: Address,
    pub strategy: WrapStrategy,
}

/// How a wrapper converts amounts: a constant decimals-derived ratio, or an
/// exchange rate supplied externally with the ledger snapshot.
#[derive(Debug, Clone)]
pub enum WrapStrategy {
    /// `wrapped = amount * 10^decimals / 10^underlying_decimals`.
    ConstantRatio { underlying_decimals: u8 },
    /// WAD-scaled amount of underlying per wrapped unit.
    ExchangeRate { rate: U256 },
}

impl Wrapper {
    fn to_wrapped(&self, amount: U256, decimals: u8, rounding: RoundingDirection) -> U256 {
        match &self.strategy {
            WrapStrategy::ConstantRatio { underlying_decimals } => mul_div(
                amount,
                pow10(decimals),
                pow10(*underlying_decimals),
                rounding,
            ),
            WrapStrategy::ExchangeRate { rate } => mul_div(amount, WAD, *rate, rounding),
        }
    }

    fn to_unwrapped(&self, amount: U256, decimals: u8, rounding: RoundingDirection) -> U256 {
        match &self.strategy {
            WrapStrategy::ConstantRatio { underlying_decimals } => mul_div(
                amount,
                pow10(*underlying_decimals),
                pow10(decimals),
                rounding,
            ),
            WrapStrategy::ExchangeRate { rate } => mul_div(amount, *rate, WAD, rounding),
        }
    }
}

fn pow10(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

/// A user's balance sheet for one token, independent of any market.
#[derive(Debug, Clone, Default)]
pub struct Holding {
    pub balance: U256,
    /// ERC20 allowances keyed by spender.
    pub allowances: HashMap<Address, U256>,
    /// Nonce consumed by signed (permit-style) approvals.
    pub permit_nonce: u64,
}

impl Holding {
    pub fn allowance(&self, spender: Address) -> U256 {
        self.allowances.get(&spender).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_wrapper(underlying_decimals: u8) -> Wrapper {
        Wrapper {
            underlying: Address::from([1u8; 20]),
            strategy: WrapStrategy::ConstantRatio { underlying_decimals },
        }
    }

    #[test]
    fn constant_ratio_same_decimals_is_identity() {
        let token = Token::wrapped(Address::from([2u8; 20]), 18, constant_wrapper(18));
        let amount = U256::from(123_456_789u64);

        assert_eq!(token.to_wrapped_exact_in(amount), Some(amount));
        assert_eq!(token.to_unwrapped_exact_in(amount), Some(amount));
    }

    #[test]
    fn constant_ratio_scales_by_decimals() {
        // 6-decimal underlying wrapped into an 18-decimal token.
        let token = Token::wrapped(Address::from([2u8; 20]), 18, constant_wrapper(6));
        let one_underlying = U256::from(1_000_000u64);

        let wrapped = token.to_wrapped_exact_in(one_underlying);
        assert_eq!(wrapped, Some(U256::from(10u64).pow(U256::from(18))));
    }

    #[test]
    fn wrap_unwrap_roundtrip_within_one_unit() {
        // 18-decimal wrapper over a 6-decimal underlying: unwrap truncates.
        let token = Token::wrapped(Address::from([2u8; 20]), 18, constant_wrapper(6));
        let amount = U256::from(1_234_567u64);

        let wrapped = token.to_wrapped_exact_in(amount).unwrap();
        let back = token.to_unwrapped_exact_in(wrapped).unwrap();
        assert_eq!(back, amount);

        // Reverse order loses at most one unit of the smaller-decimals side.
        let unwrapped = token.to_unwrapped_exact_in(U256::from(1_999_999_999_999u64)).unwrap();
        let rewrapped = token.to_wrapped_exact_in(unwrapped).unwrap();
        assert!(rewrapped <= U256::from(1_999_999_999_999u64));
    }

    #[test]
    fn exact_out_rounds_against_the_caller() {
        let token = Token::wrapped(Address::from([2u8; 20]), 18, constant_wrapper(6));
        let target_wrapped = U256::from(1_500_000_000_000u64); // 1.5e12, not a whole unit

        let required = token.to_wrapped_exact_out(target_wrapped).unwrap();
        // Wrapping the required amount yields at least the target.
        let received = token.to_wrapped_exact_in(required).unwrap();
        assert!(received >= target_wrapped);
    }

    #[test]
    fn exchange_rate_wrapper_converts_both_ways() {
        // 1 wrapped = 1.2 underlying.
        let rate = U256::from(1_200_000_000_000_000_000u64);
        let token = Token::wrapped(
            Address::from([2u8; 20]),
            18,
            Wrapper {
                underlying: Address::from([1u8; 20]),
                strategy: WrapStrategy::ExchangeRate { rate },
            },
        );

        let underlying = U256::from(1_200_000_000_000_000_000u64);
        assert_eq!(
            token.to_wrapped_exact_in(underlying),
            Some(U256::from(1_000_000_000_000_000_000u64))
        );
        assert_eq!(
            token.to_unwrapped_exact_in(U256::from(1_000_000_000_000_000_000u64)),
            Some(underlying)
        );
    }

    #[test]
    fn holding_default_allowance_is_zero() {
        let holding = Holding::default();
        assert_eq!(holding.allowance(Address::from([3u8; 20])), U256::ZERO);
    }
}
