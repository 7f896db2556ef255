//! LP deposits and withdrawals. These go straight to the pool, no relay.

use super::core::Engine;
use super::positions::check_precision;
use super::results::EngineError;
use crate::events::{EventPayload, LiquidityDepositedEvent, LiquidityWithdrawnEvent};
use crate::price_feed::PriceOracle;
use crate::types::{Address, Quote, Shares};

impl<O: PriceOracle> Engine<O> {
    pub fn deposit_liquidity(&mut self, provider: Address, amount: Quote) -> Result<Shares, EngineError> {
        if amount.is_positive() {
            check_precision(amount)?;
        }
        let shares_minted = self.pool.deposit(&mut self.token, provider, amount)?;

        self.emit_event(EventPayload::LiquidityDeposited(LiquidityDepositedEvent {
            provider,
            amount,
            shares_minted,
            total_liquidity: self.pool.total_liquidity(),
        }));

        Ok(shares_minted)
    }

    pub fn withdraw_liquidity(&mut self, provider: Address, shares: Shares) -> Result<Quote, EngineError> {
        let amount = self.pool.withdraw(&mut self.token, provider, shares)?;

        self.emit_event(EventPayload::LiquidityWithdrawn(LiquidityWithdrawnEvent {
            provider,
            shares_burned: shares,
            amount,
            total_liquidity: self.pool.total_liquidity(),
        }));

        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MarketParams;
    use crate::engine::{Engine, EngineConfig, EngineError};
    use crate::liquidity::PoolError;
    use crate::price_feed::MockPriceFeed;
    use crate::types::{Address, Price, Quote, Shares};
    use rust_decimal_macros::dec;

    fn lp() -> Address {
        Address::from_low_u64(0x11)
    }

    fn engine() -> Engine {
        let oracle = MockPriceFeed::new("ETH/USD", Price::new_unchecked(dec!(2000)));
        let mut engine = Engine::new(EngineConfig::default(), MarketParams::default(), oracle).unwrap();
        engine.mint(lp(), Quote::new(dec!(10000))).unwrap();
        engine
    }

    #[test]
    fn deposit_then_withdraw() {
        let mut engine = engine();
        let shares = engine.deposit_liquidity(lp(), Quote::new(dec!(5000))).unwrap();
        assert_eq!(engine.pool_custody_balance().value(), dec!(5000));

        let out = engine.withdraw_liquidity(lp(), shares).unwrap();
        assert_eq!(out.value(), dec!(5000));
        assert_eq!(engine.balance_of(lp()).value(), dec!(10000));

        let names: Vec<_> = engine.events().iter().map(|e| e.payload.name()).collect();
        assert_eq!(names, vec!["LiquidityDeposited", "LiquidityWithdrawn"]);
    }

    #[test]
    fn zero_deposit_fails_without_event() {
        let mut engine = engine();
        assert_eq!(
            engine.deposit_liquidity(lp(), Quote::zero()),
            Err(EngineError::Pool(PoolError::ZeroAmount))
        );
        assert!(engine.events().is_empty());
    }

    #[test]
    fn deposit_beyond_balance_fails() {
        let mut engine = engine();
        assert!(matches!(
            engine.deposit_liquidity(lp(), Quote::new(dec!(10001))),
            Err(EngineError::Pool(PoolError::Custody(_)))
        ));
        assert!(engine.pool().total_liquidity().is_zero());
        assert!(engine.withdraw_liquidity(lp(), Shares::new(dec!(1))).is_err());
    }
}
