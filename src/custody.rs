// 9.2 custody.rs: MOCKED. the collateral currency as an in-memory balance table.
// stands in for the external fungible token; no real chain transfers happen.
// the pool and the market each hold value at their own custody address.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Address, Quote};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustodyError {
    #[error("Insufficient balance for {holder}: requested {requested}, available {available}")]
    InsufficientBalance {
        holder: Address,
        requested: Quote,
        available: Quote,
    },

    #[error("Transfer amount must be positive, got {0}")]
    InvalidAmount(Quote),

    #[error("Minting {0} would overflow the total supply")]
    SupplyOverflow(Quote),
}

/// Balances of the collateral/settlement currency, keyed by holder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenLedger {
    symbol: String,
    balances: HashMap<Address, Decimal>,
    total_supply: Decimal,
}

impl TokenLedger {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            balances: HashMap::new(),
            total_supply: Decimal::ZERO,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    // faucet for sims and tests. the real token mints elsewhere.
    // supply is bounded, so no balance or transfer can overflow after this.
    pub fn mint(&mut self, to: Address, amount: Quote) -> Result<(), CustodyError> {
        if !amount.is_positive() {
            return Err(CustodyError::InvalidAmount(amount));
        }
        let total_supply = self
            .total_supply
            .checked_add(amount.value())
            .ok_or(CustodyError::SupplyOverflow(amount))?;
        *self.balances.entry(to).or_insert(Decimal::ZERO) += amount.value();
        self.total_supply = total_supply;
        Ok(())
    }

    pub fn balance_of(&self, holder: Address) -> Quote {
        Quote::new(self.balances.get(&holder).copied().unwrap_or(Decimal::ZERO))
    }

    pub fn total_supply(&self) -> Quote {
        Quote::new(self.total_supply)
    }

    /// Check-only half of a transfer, so callers can validate before mutating anything else.
    pub fn ensure_balance(&self, holder: Address, amount: Quote) -> Result<(), CustodyError> {
        let available = self.balance_of(holder);
        if amount > available {
            return Err(CustodyError::InsufficientBalance {
                holder,
                requested: amount,
                available,
            });
        }
        Ok(())
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: Quote) -> Result<(), CustodyError> {
        if amount.is_negative() {
            return Err(CustodyError::InvalidAmount(amount));
        }
        // zero transfers are a no-op so settlement code can stay branch-free
        if amount.is_zero() {
            return Ok(());
        }
        self.ensure_balance(from, amount)?;

        if let Some(balance) = self.balances.get_mut(&from) {
            *balance -= amount.value();
        }
        *self.balances.entry(to).or_insert(Decimal::ZERO) += amount.value();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn alice() -> Address {
        Address::from_low_u64(1)
    }

    fn bob() -> Address {
        Address::from_low_u64(2)
    }

    #[test]
    fn mint_and_transfer() {
        let mut token = TokenLedger::new("USDC");
        token.mint(alice(), Quote::new(dec!(1000))).unwrap();

        token.transfer(alice(), bob(), Quote::new(dec!(250))).unwrap();

        assert_eq!(token.balance_of(alice()).value(), dec!(750));
        assert_eq!(token.balance_of(bob()).value(), dec!(250));
        assert_eq!(token.total_supply().value(), dec!(1000));
    }

    #[test]
    fn transfer_insufficient_balance() {
        let mut token = TokenLedger::new("USDC");
        token.mint(alice(), Quote::new(dec!(100))).unwrap();

        let result = token.transfer(alice(), bob(), Quote::new(dec!(101)));
        assert!(matches!(result, Err(CustodyError::InsufficientBalance { .. })));
        // nothing moved
        assert_eq!(token.balance_of(alice()).value(), dec!(100));
        assert!(token.balance_of(bob()).is_zero());
    }

    #[test]
    fn negative_amounts_rejected() {
        let mut token = TokenLedger::new("USDC");
        assert!(matches!(
            token.mint(alice(), Quote::new(dec!(-5))),
            Err(CustodyError::InvalidAmount(_))
        ));
        assert!(matches!(
            token.transfer(alice(), bob(), Quote::new(dec!(-5))),
            Err(CustodyError::InvalidAmount(_))
        ));
    }

    #[test]
    fn zero_transfer_is_noop() {
        let mut token = TokenLedger::new("USDC");
        token.transfer(alice(), bob(), Quote::zero()).unwrap();
        assert!(token.balance_of(bob()).is_zero());
    }

    #[test]
    fn mint_past_decimal_range_rejected() {
        let mut token = TokenLedger::new("USDC");
        token.mint(alice(), Quote::new(Decimal::MAX)).unwrap();
        assert_eq!(
            token.mint(bob(), Quote::new(dec!(1))),
            Err(CustodyError::SupplyOverflow(Quote::new(dec!(1))))
        );
        assert!(token.balance_of(bob()).is_zero());
        assert_eq!(token.total_supply().value(), Decimal::MAX);
    }
}
