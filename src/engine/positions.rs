//! Position lifecycle: open, increase, add collateral, decrease, close.
//!
//! Every operation validates everything up front, then updates the position table
//! and pool ledger, and only then moves value to the trader. A failed call leaves
//! no trace.

use super::core::Engine;
use super::results::{CloseOutcome, DecreaseResult, EngineError};
use crate::events::{
    CollateralAddedEvent, EventPayload, PositionClosedEvent, PositionDecreasedEvent, PositionIncreasedEvent,
    PositionOpenedEvent,
};
use crate::liquidity::PoolError;
use crate::margin::{notional_size, validate_leverage};
use crate::position::{add_collateral, increase_position, reduce_position, Position};
use crate::price_feed::PriceOracle;
use crate::types::{Address, Leverage, Price, Quote, Side};
use rust_decimal::Decimal;

impl<O: PriceOracle> Engine<O> {
    /// Open a new position. Pulls `collateral` from the trader and reserves
    /// `collateral * leverage` in the pool.
    pub fn open_position(
        &mut self,
        trader: Address,
        collateral: Quote,
        leverage: Decimal,
        side: Side,
    ) -> Result<Position, EngineError> {
        if !collateral.is_positive() {
            return Err(EngineError::ZeroCollateral);
        }
        check_precision(collateral)?;
        let leverage = self.check_leverage(leverage)?;
        if self.positions.contains_key(&trader) {
            return Err(EngineError::PositionExists(trader));
        }
        let price = self.current_price()?;
        let size = notional_size(collateral, leverage)?;
        if !size.is_positive() {
            return Err(EngineError::ZeroCollateral);
        }
        self.check_utilization(size)?;
        self.token.ensure_balance(trader, collateral)?;

        let market = self.config.market_address;
        self.pool.reserve(market, size)?;
        let position = Position::new(trader, side, size, collateral, price, self.current_time);
        self.positions.insert(trader, position.clone());

        self.token.transfer(trader, market, collateral)?;

        self.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
            trader,
            side,
            size,
            collateral,
            entry_price: price,
            leverage: leverage.value(),
        }));

        Ok(position)
    }

    /// Add notional to an open position. Entry price is re-blended at the current price.
    pub fn increase_position(
        &mut self,
        trader: Address,
        collateral: Quote,
        leverage: Decimal,
    ) -> Result<Position, EngineError> {
        if !collateral.is_positive() {
            return Err(EngineError::ZeroCollateral);
        }
        check_precision(collateral)?;
        let leverage = self.check_leverage(leverage)?;
        let existing = self.open_position_of(trader)?;
        let price = self.current_price()?;
        self.check_not_liquidatable(&existing, price)?;
        let added_size = notional_size(collateral, leverage)?;
        if !added_size.is_positive() {
            return Err(EngineError::ZeroCollateral);
        }
        self.check_utilization(added_size)?;
        self.token.ensure_balance(trader, collateral)?;
        let updated = increase_position(&existing, added_size, collateral, price, self.current_time)?;

        let market = self.config.market_address;
        self.pool.reserve(market, added_size)?;
        self.positions.insert(trader, updated.clone());

        self.token.transfer(trader, market, collateral)?;

        self.emit_event(EventPayload::PositionIncreased(PositionIncreasedEvent {
            trader,
            added_size,
            added_collateral: collateral,
            size: updated.size,
            collateral: updated.collateral,
            entry_price: updated.entry_price,
        }));

        Ok(updated)
    }

    /// Post more margin without changing size. Allowed even when liquidatable.
    pub fn add_collateral(&mut self, trader: Address, amount: Quote) -> Result<Position, EngineError> {
        if !amount.is_positive() {
            return Err(EngineError::ZeroAmount);
        }
        check_precision(amount)?;
        let existing = self.open_position_of(trader)?;
        self.token.ensure_balance(trader, amount)?;

        let updated = add_collateral(&existing, amount, self.current_time);
        self.positions.insert(trader, updated.clone());

        self.token.transfer(trader, self.config.market_address, amount)?;

        self.emit_event(EventPayload::CollateralAdded(CollateralAddedEvent {
            trader,
            amount,
            collateral: updated.collateral,
        }));

        Ok(updated)
    }

    /// Shrink a position by `size_delta` notional, realizing that slice's PnL.
    pub fn decrease_position(&mut self, trader: Address, size_delta: Quote) -> Result<DecreaseResult, EngineError> {
        let existing = self.open_position_of(trader)?;
        if !size_delta.is_positive() || size_delta > existing.size {
            return Err(EngineError::InvalidSizeDelta {
                requested: size_delta,
                size: existing.size,
            });
        }
        check_precision(size_delta)?;
        let price = self.current_price()?;
        self.check_not_liquidatable(&existing, price)?;

        let update = reduce_position(&existing, size_delta, price, &self.params.margin, self.current_time)?;
        // a slice too small to carry collateral closes the whole position
        let size_delta = match &update.new_position {
            Some(remaining) => existing.size.sub(remaining.size),
            None => existing.size,
        };
        self.check_exit(update.collateral_released, update.realized_pnl, size_delta)?;

        match &update.new_position {
            Some(remaining) => {
                self.positions.insert(trader, remaining.clone());
            }
            None => {
                self.positions.remove(&trader);
            }
        }
        let payout = self.settle_exit(trader, update.collateral_released, update.realized_pnl, size_delta)?;

        let (size, collateral) = update
            .new_position
            .as_ref()
            .map(|p| (p.size, p.collateral))
            .unwrap_or((Quote::zero(), Quote::zero()));

        self.emit_event(EventPayload::PositionDecreased(PositionDecreasedEvent {
            trader,
            size_delta,
            size,
            collateral,
            realized_pnl: update.realized_pnl,
            exit_price: price,
        }));

        Ok(DecreaseResult {
            remaining: update.new_position,
            size_delta,
            realized_pnl: update.realized_pnl,
            payout,
            exit_price: price,
        })
    }

    /// Close the whole position at the current price. A position at or below the
    /// liquidation threshold is settled as a liquidation instead: the trader gets
    /// nothing and all collateral goes to the pool.
    pub fn close_position(&mut self, trader: Address) -> Result<CloseOutcome, EngineError> {
        self.close_inner(trader, true)
    }

    /// Close requested through the relay. An under-water position is refused and
    /// left for a third-party liquidator.
    pub fn close_position_on_behalf(&mut self, trader: Address) -> Result<CloseOutcome, EngineError> {
        self.close_inner(trader, false)
    }

    fn close_inner(&mut self, trader: Address, settle_liquidatable: bool) -> Result<CloseOutcome, EngineError> {
        let existing = self.open_position_of(trader)?;
        let price = self.current_price()?;

        let status = existing.liquidation_status(price, &self.params.margin, &self.params.liquidation)?;
        if status.is_liquidatable() {
            if !settle_liquidatable {
                return Err(EngineError::PositionLiquidatable(trader));
            }
            let result = self.execute_liquidation(&existing, price, None)?;
            return Ok(CloseOutcome {
                trader,
                exit_price: price,
                realized_pnl: result.pnl,
                payout: Quote::zero(),
                liquidated: true,
            });
        }

        let pnl = existing.unrealized_pnl(price, &self.params.margin)?;
        self.check_exit(existing.collateral, pnl, existing.size)?;

        self.positions.remove(&trader);
        let payout = self.settle_exit(trader, existing.collateral, pnl, existing.size)?;

        self.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
            trader,
            side: existing.side,
            size: existing.size,
            collateral: existing.collateral,
            realized_pnl: pnl,
            exit_price: price,
            payout,
        }));

        Ok(CloseOutcome {
            trader,
            exit_price: price,
            realized_pnl: pnl,
            payout,
            liquidated: false,
        })
    }

    pub(super) fn open_position_of(&self, trader: Address) -> Result<Position, EngineError> {
        self.positions
            .get(&trader)
            .cloned()
            .ok_or(EngineError::PositionNotFound(trader))
    }

    fn check_leverage(&self, requested: Decimal) -> Result<Leverage, EngineError> {
        let margin = &self.params.margin;
        validate_leverage(requested, margin).ok_or(EngineError::InvalidLeverage {
            requested,
            min: margin.min_leverage,
            max: margin.max_leverage,
        })
    }

    fn check_utilization(&self, extra: Quote) -> Result<(), EngineError> {
        let utilization = self.pool.utilization_after(extra);
        if utilization > self.params.max_utilization {
            return Err(EngineError::UtilizationExceeded {
                utilization,
                max: self.params.max_utilization,
            });
        }
        Ok(())
    }

    fn check_not_liquidatable(&self, position: &Position, price: Price) -> Result<(), EngineError> {
        let status = position.liquidation_status(price, &self.params.margin, &self.params.liquidation)?;
        if status.is_liquidatable() {
            return Err(EngineError::PositionLiquidatable(position.trader));
        }
        Ok(())
    }

    // everything settle_exit needs, checked before anything moves
    fn check_exit(&self, collateral: Quote, pnl: Quote, released_size: Quote) -> Result<(), EngineError> {
        let reserved = self.pool.reserved_liquidity();
        if released_size > reserved {
            return Err(PoolError::ReleaseExceedsReserved {
                requested: released_size,
                reserved,
            }
            .into());
        }
        self.token.ensure_balance(self.config.market_address, collateral)?;

        let profit = pnl.max(Quote::zero());
        let free_after_release = self.pool.free_liquidity().add(released_size);
        if profit > free_after_release {
            return Err(PoolError::InsufficientFreeLiquidity {
                requested: profit,
                free: free_after_release,
            }
            .into());
        }
        Ok(())
    }

    // releases the reservation, settles pnl with the pool, then pays the trader
    fn settle_exit(
        &mut self,
        trader: Address,
        collateral: Quote,
        pnl: Quote,
        released_size: Quote,
    ) -> Result<Quote, EngineError> {
        let market = self.config.market_address;
        self.pool.release(market, released_size)?;

        if pnl.is_negative() {
            let loss = pnl.abs().min(collateral);
            let to_trader = collateral.sub(loss);
            self.pool.absorb(market, &mut self.token, loss)?;
            self.token.transfer(market, trader, to_trader)?;
            return Ok(to_trader);
        }

        self.pool.pay_out(market, &mut self.token, trader, pnl)?;
        self.token.transfer(market, trader, collateral)?;
        Ok(collateral.add(pnl))
    }
}

// the token settles at 18 decimals; anything finer cannot be transferred
pub(super) fn check_precision(amount: Quote) -> Result<(), EngineError> {
    if !amount.fits_token_precision() {
        return Err(EngineError::ExcessPrecision(amount));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::MarketParams;
    use crate::engine::{Engine, EngineConfig, EngineError};
    use crate::liquidity::PoolError;
    use crate::price_feed::MockPriceFeed;
    use crate::types::{Address, Price, Quote, Shares, Side};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn lp() -> Address {
        Address::from_low_u64(0x11)
    }

    fn trader() -> Address {
        Address::from_low_u64(0x22)
    }

    fn q(v: Decimal) -> Quote {
        Quote::new(v)
    }

    fn set_price(engine: &mut Engine, v: Decimal) {
        engine.oracle_mut().set_price(Price::new_unchecked(v));
    }

    // pool seeded with 5000, trader holds 1000, price 2000
    fn engine() -> Engine {
        let oracle = MockPriceFeed::new("ETH/USD", Price::new_unchecked(dec!(2000)));
        let mut engine = Engine::new(EngineConfig::default(), MarketParams::default(), oracle).unwrap();
        engine.mint(lp(), q(dec!(5000))).unwrap();
        engine.mint(trader(), q(dec!(1000))).unwrap();
        engine.deposit_liquidity(lp(), q(dec!(5000))).unwrap();
        engine
    }

    fn assert_custody_in_sync(engine: &Engine) {
        assert_eq!(engine.market_custody_balance(), engine.total_collateral());
        assert_eq!(engine.pool_custody_balance(), engine.pool().total_liquidity());
        assert_eq!(engine.pool().reserved_liquidity(), engine.total_open_size());
    }

    #[test]
    fn open_reserves_size() {
        let mut engine = engine();
        let pos = engine.open_position(trader(), q(dec!(100)), dec!(2), Side::Long).unwrap();

        assert_eq!(pos.size.value(), dec!(200));
        assert_eq!(pos.entry_price.value(), dec!(2000));
        assert_eq!(engine.pool().reserved_liquidity().value(), dec!(200));
        assert_eq!(engine.balance_of(trader()).value(), dec!(900));
        assert_custody_in_sync(&engine);
    }

    #[test]
    fn open_validation_errors() {
        let mut engine = engine();
        assert_eq!(
            engine.open_position(trader(), Quote::zero(), dec!(2), Side::Long),
            Err(EngineError::ZeroCollateral)
        );
        let err = engine.open_position(trader(), q(dec!(100)), dec!(11), Side::Long).unwrap_err();
        assert!(matches!(err, EngineError::InvalidLeverage { .. }));
        assert!(err.to_string().starts_with("Leverage must be 1x to 10x"));
        assert!(matches!(
            engine.open_position(trader(), q(dec!(100)), dec!(0.5), Side::Long),
            Err(EngineError::InvalidLeverage { .. })
        ));

        engine.open_position(trader(), q(dec!(100)), dec!(2), Side::Long).unwrap();
        assert_eq!(
            engine.open_position(trader(), q(dec!(100)), dec!(2), Side::Long),
            Err(EngineError::PositionExists(trader()))
        );
    }

    #[test]
    fn open_rejected_over_utilization() {
        let mut engine = engine();
        engine.withdraw_liquidity(lp(), Shares::new(dec!(4000))).unwrap();

        let err = engine.open_position(trader(), q(dec!(900)), dec!(2), Side::Long).unwrap_err();
        assert!(matches!(err, EngineError::UtilizationExceeded { .. }));
        assert!(err.to_string().starts_with("Exceeds utilization limit"));
        assert!(engine.position(trader()).is_none());
        assert_eq!(engine.balance_of(trader()).value(), dec!(1000));
    }

    #[test]
    fn open_without_funds_leaves_no_trace() {
        let mut engine = engine();
        let broke = Address::from_low_u64(0x99);
        assert!(matches!(
            engine.open_position(broke, q(dec!(10)), dec!(2), Side::Long),
            Err(EngineError::Custody(_))
        ));
        assert!(engine.pool().reserved_liquidity().is_zero());
        assert!(engine.position(broke).is_none());
    }

    #[test]
    fn profitable_long_close() {
        let mut engine = engine();
        engine.open_position(trader(), q(dec!(100)), dec!(2), Side::Long).unwrap();
        set_price(&mut engine, dec!(3000));

        let outcome = engine.close_position(trader()).unwrap();
        assert!(!outcome.liquidated);
        assert_eq!(outcome.realized_pnl.value(), dec!(100));
        assert_eq!(outcome.payout.value(), dec!(200));
        assert_eq!(engine.balance_of(trader()).value(), dec!(1100));
        assert_eq!(engine.pool().total_liquidity().value(), dec!(4900));
        assert!(engine.pool().reserved_liquidity().is_zero());
        assert!(engine.position(trader()).is_none());
        assert_eq!(engine.recent_events(1)[0].payload.name(), "PositionClosed");
        assert_custody_in_sync(&engine);
    }

    #[test]
    fn losing_short_close() {
        let mut engine = engine();
        engine.open_position(trader(), q(dec!(100)), dec!(2), Side::Short).unwrap();
        set_price(&mut engine, dec!(2100)); // +5% against a short: -10

        let outcome = engine.close_position(trader()).unwrap();
        assert_eq!(outcome.realized_pnl.value(), dec!(-10));
        assert_eq!(outcome.payout.value(), dec!(90));
        assert_eq!(engine.balance_of(trader()).value(), dec!(990));
        assert_eq!(engine.pool().total_liquidity().value(), dec!(5010));
        assert_custody_in_sync(&engine);
    }

    #[test]
    fn close_under_water_becomes_liquidation() {
        let mut engine = engine();
        engine.open_position(trader(), q(dec!(100)), dec!(10), Side::Long).unwrap();
        set_price(&mut engine, dec!(1000));

        let outcome = engine.close_position(trader()).unwrap();
        assert!(outcome.liquidated);
        assert!(outcome.payout.is_zero());
        assert_eq!(engine.balance_of(trader()).value(), dec!(900));
        assert_eq!(engine.pool().total_liquidity().value(), dec!(5100));
        assert_eq!(engine.recent_events(1)[0].payload.name(), "PositionLiquidated");
        assert_custody_in_sync(&engine);
    }

    #[test]
    fn relay_close_refuses_under_water() {
        let mut engine = engine();
        engine.open_position(trader(), q(dec!(100)), dec!(10), Side::Long).unwrap();
        set_price(&mut engine, dec!(1000));

        let err = engine.close_position_on_behalf(trader()).unwrap_err();
        assert_eq!(err, EngineError::PositionLiquidatable(trader()));
        assert!(err.to_string().starts_with("Liquidated"));
        assert!(engine.position(trader()).is_some());
    }

    #[test]
    fn increase_blends_and_reserves() {
        let mut engine = engine();
        engine.open_position(trader(), q(dec!(100)), dec!(2), Side::Long).unwrap();
        set_price(&mut engine, dec!(2700));

        let pos = engine.increase_position(trader(), q(dec!(50)), dec!(3)).unwrap();
        assert_eq!(pos.size.value(), dec!(350));
        assert_eq!(pos.collateral.value(), dec!(150));
        assert_eq!(pos.entry_price.value(), dec!(2300));
        assert_eq!(engine.pool().reserved_liquidity().value(), dec!(350));
        assert_custody_in_sync(&engine);
    }

    #[test]
    fn increase_needs_open_healthy_position() {
        let mut engine = engine();
        assert_eq!(
            engine.increase_position(trader(), q(dec!(50)), dec!(2)),
            Err(EngineError::PositionNotFound(trader()))
        );

        engine.open_position(trader(), q(dec!(100)), dec!(10), Side::Long).unwrap();
        set_price(&mut engine, dec!(1900));
        assert_eq!(
            engine.increase_position(trader(), q(dec!(50)), dec!(2)),
            Err(EngineError::PositionLiquidatable(trader()))
        );
    }

    #[test]
    fn add_collateral_rescues_position() {
        let mut engine = engine();
        engine.open_position(trader(), q(dec!(100)), dec!(10), Side::Long).unwrap();
        set_price(&mut engine, dec!(1900)); // equity 50 on 1000 → at threshold

        let pos = engine.add_collateral(trader(), q(dec!(100))).unwrap();
        assert_eq!(pos.size.value(), dec!(1000));
        assert_eq!(pos.collateral.value(), dec!(200));
        assert!(!engine.position_health(trader()).unwrap().liquidatable);
        assert_eq!(engine.add_collateral(trader(), Quote::zero()), Err(EngineError::ZeroAmount));
        assert_custody_in_sync(&engine);
    }

    #[test]
    fn partial_decrease_realizes_slice() {
        let mut engine = engine();
        engine.open_position(trader(), q(dec!(100)), dec!(2), Side::Long).unwrap();
        set_price(&mut engine, dec!(2500));

        let result = engine.decrease_position(trader(), q(dec!(50))).unwrap();
        let remaining = result.remaining.unwrap();
        assert_eq!(remaining.size.value(), dec!(150));
        assert_eq!(remaining.collateral.value(), dec!(75));
        assert_eq!(result.realized_pnl.value(), dec!(12.5));
        assert_eq!(result.payout.value(), dec!(37.5));
        assert_eq!(engine.pool().reserved_liquidity().value(), dec!(150));
        assert_custody_in_sync(&engine);
    }

    #[test]
    fn full_decrease_removes_position() {
        let mut engine = engine();
        engine.open_position(trader(), q(dec!(100)), dec!(2), Side::Long).unwrap();

        let result = engine.decrease_position(trader(), q(dec!(200))).unwrap();
        assert!(result.remaining.is_none());
        assert!(engine.position(trader()).is_none());
        assert_eq!(engine.balance_of(trader()).value(), dec!(1000));
        assert_custody_in_sync(&engine);
    }

    #[test]
    fn decrease_bounds() {
        let mut engine = engine();
        engine.open_position(trader(), q(dec!(100)), dec!(2), Side::Long).unwrap();

        assert!(matches!(
            engine.decrease_position(trader(), q(dec!(201))),
            Err(EngineError::InvalidSizeDelta { .. })
        ));
        assert!(matches!(
            engine.decrease_position(trader(), Quote::zero()),
            Err(EngineError::InvalidSizeDelta { .. })
        ));

        set_price(&mut engine, dec!(1100));
        assert_eq!(
            engine.decrease_position(trader(), q(dec!(10))),
            Err(EngineError::PositionLiquidatable(trader()))
        );
    }

    #[test]
    fn profit_capped_at_reservation() {
        let mut engine = engine();
        engine.open_position(trader(), q(dec!(100)), dec!(2), Side::Long).unwrap();
        set_price(&mut engine, dec!(10000)); // raw +400%

        let outcome = engine.close_position(trader()).unwrap();
        assert_eq!(outcome.realized_pnl.value(), dec!(200));
        assert_eq!(engine.pool().total_liquidity().value(), dec!(4800));
        assert_custody_in_sync(&engine);
    }

    #[test]
    fn reserved_blocks_lp_exit() {
        let mut engine = engine();
        engine.open_position(trader(), q(dec!(100)), dec!(2), Side::Long).unwrap();

        assert!(matches!(
            engine.withdraw_liquidity(lp(), Shares::new(dec!(5000))),
            Err(EngineError::Pool(PoolError::InsufficientFreeLiquidity { .. }))
        ));
    }

    #[test]
    fn sub_unit_amounts_rejected_without_trace() {
        let mut engine = engine();
        let dust = q(dec!(0.00000000000000000001));

        assert_eq!(
            engine.open_position(trader(), dust, dec!(2), Side::Long),
            Err(EngineError::ExcessPrecision(dust))
        );
        assert!(engine.position(trader()).is_none());
        assert!(engine.pool().reserved_liquidity().is_zero());
        assert_eq!(engine.balance_of(trader()).value(), dec!(1000));

        engine.open_position(trader(), q(dec!(100)), dec!(2), Side::Long).unwrap();
        assert_eq!(
            engine.increase_position(trader(), dust, dec!(2)),
            Err(EngineError::ExcessPrecision(dust))
        );
        assert_eq!(engine.add_collateral(trader(), dust), Err(EngineError::ExcessPrecision(dust)));
        assert_eq!(
            engine.decrease_position(trader(), dust),
            Err(EngineError::ExcessPrecision(dust))
        );
        assert_eq!(engine.position(trader()).unwrap().size.value(), dec!(200));
        assert_custody_in_sync(&engine);
    }

    #[test]
    fn smallest_unit_decrease_keeps_collateral() {
        let mut engine = engine();
        // 1e-18 at 3x: 3e-18 notional
        let pos = engine
            .open_position(trader(), q(dec!(0.000000000000000001)), dec!(3), Side::Long)
            .unwrap();
        assert_eq!(pos.size.value(), dec!(0.000000000000000003));

        let result = engine.decrease_position(trader(), q(dec!(0.000000000000000002))).unwrap();
        let remaining = result.remaining.unwrap();
        assert_eq!(remaining.size.value(), dec!(0.000000000000000001));
        assert_eq!(remaining.collateral.value(), dec!(0.000000000000000001));
        assert!(result.payout.is_zero());
        assert_custody_in_sync(&engine);

        let result = engine.decrease_position(trader(), remaining.size).unwrap();
        assert!(result.remaining.is_none());
        assert_eq!(engine.balance_of(trader()).value(), dec!(1000));
        assert_custody_in_sync(&engine);
    }

    #[test]
    fn oversized_pnl_fails_cleanly() {
        let mut engine = engine();
        set_price(&mut engine, dec!(0.000001));
        engine.open_position(trader(), q(dec!(100)), dec!(2), Side::Short).unwrap();
        // a short's loss is unbounded; this one does not fit in a decimal
        set_price(&mut engine, dec!(10_000_000_000_000_000_000_000_000));

        assert_eq!(
            engine.close_position(trader()),
            Err(EngineError::Overflow(crate::types::ArithmeticOverflow))
        );
        assert!(engine.position(trader()).is_some());
        assert_custody_in_sync(&engine);
    }
}
