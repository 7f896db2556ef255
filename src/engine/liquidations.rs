//! Liquidation detection and execution.

use super::core::Engine;
use super::results::{EngineError, LiquidationResult, PositionHealth};
use crate::events::{EventPayload, LiquidatedByEvent, PositionLiquidatedEvent};
use crate::liquidation::{split_seized_collateral, CollateralSplit};
use crate::liquidity::PoolError;
use crate::position::Position;
use crate::price_feed::PriceOracle;
use crate::types::{Address, Price, Quote};

impl<O: PriceOracle> Engine<O> {
    /// Third-party liquidation. Succeeds only at or below the threshold; the caller
    /// is paid a fraction of the seized collateral and the rest goes to the pool.
    pub fn liquidate(&mut self, liquidator: Address, trader: Address) -> Result<LiquidationResult, EngineError> {
        if liquidator == trader {
            return Err(EngineError::SelfLiquidation(trader));
        }
        let existing = self.open_position_of(trader)?;
        let price = self.current_price()?;

        let status = existing.liquidation_status(price, &self.params.margin, &self.params.liquidation)?;
        if !status.is_liquidatable() {
            return Err(EngineError::PositionHealthy(trader));
        }

        self.execute_liquidation(&existing, price, Some(liquidator))
    }

    /// Traders whose positions are liquidatable at the current price.
    pub fn liquidatable_traders(&self) -> Result<Vec<Address>, EngineError> {
        let price = self.current_price()?;
        let mut traders = Vec::new();
        for position in self.positions.values() {
            let status = position.liquidation_status(price, &self.params.margin, &self.params.liquidation)?;
            if status.is_liquidatable() {
                traders.push(position.trader);
            }
        }
        traders.sort();
        Ok(traders)
    }

    pub fn position_health(&self, trader: Address) -> Result<PositionHealth, EngineError> {
        let position = self.open_position_of(trader)?;
        let price = self.current_price()?;
        let margin = &self.params.margin;
        let status = position.liquidation_status(price, margin, &self.params.liquidation)?;

        Ok(PositionHealth {
            trader,
            size: position.size,
            collateral: position.collateral,
            entry_price: position.entry_price,
            mark_price: price,
            pnl: position.unrealized_pnl(price, margin)?,
            equity: position.equity(price, margin)?,
            margin_ratio: status.margin_ratio(),
            leverage: position.effective_leverage(),
            liquidation_price: position.liquidation_price(&self.params.liquidation),
            liquidatable: status.is_liquidatable(),
        })
    }

    pub fn liquidation_price(&self, trader: Address) -> Result<Option<Price>, EngineError> {
        let position = self.open_position_of(trader)?;
        Ok(position.liquidation_price(&self.params.liquidation))
    }

    /// Seize a position. `liquidator` is None when a close was converted; then
    /// there is no reward and the whole collateral goes to the pool.
    pub(super) fn execute_liquidation(
        &mut self,
        position: &Position,
        price: Price,
        liquidator: Option<Address>,
    ) -> Result<LiquidationResult, EngineError> {
        let trader = position.trader;
        let split = match liquidator {
            Some(_) => split_seized_collateral(position.collateral, &self.params.liquidation),
            None => CollateralSplit {
                liquidator_reward: Quote::zero(),
                to_pool: position.collateral,
            },
        };
        let pnl = position.unrealized_pnl(price, &self.params.margin)?;

        let reserved = self.pool.reserved_liquidity();
        if position.size > reserved {
            return Err(PoolError::ReleaseExceedsReserved {
                requested: position.size,
                reserved,
            }
            .into());
        }
        let market = self.config.market_address;
        self.token.ensure_balance(market, position.collateral)?;

        self.positions.remove(&trader);
        self.pool.release(market, position.size)?;
        self.pool.absorb(market, &mut self.token, split.to_pool)?;
        if let Some(liquidator) = liquidator {
            self.token.transfer(market, liquidator, split.liquidator_reward)?;
        }

        self.emit_event(EventPayload::PositionLiquidated(PositionLiquidatedEvent {
            trader,
            liquidator,
            size: position.size,
            collateral: position.collateral,
            pnl,
            liquidation_price: price,
            to_pool: split.to_pool,
        }));
        if let Some(liquidator) = liquidator {
            self.emit_event(EventPayload::LiquidatedBy(LiquidatedByEvent {
                liquidator,
                trader,
                reward: split.liquidator_reward,
            }));
        }

        Ok(LiquidationResult {
            trader,
            liquidator,
            size: position.size,
            collateral: position.collateral,
            pnl,
            liquidation_price: price,
            reward: split.liquidator_reward,
            to_pool: split.to_pool,
        })
    }
}
