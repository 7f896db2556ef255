// 4.0: one open position per trader. size is notional in collateral currency.
// pnl = size * (exit - entry) / entry, negated for shorts.
// 4.1 has increase/reduce logic at the bottom.

use crate::liquidation::{calculate_liquidation_price, evaluate_liquidation, LiquidationParams, LiquidationStatus};
use crate::margin::{blended_entry_price, calculate_equity, calculate_pnl, cap_profit, margin_ratio, MarginParams};
use crate::types::{mul_div, Address, ArithmeticOverflow, Price, Quote, Side, Timestamp, AMOUNT_DECIMALS};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub trader: Address,
    pub side: Side,
    pub size: Quote,
    pub collateral: Quote,
    pub entry_price: Price,
    pub opened_at: Timestamp,
    pub updated_at: Timestamp,
    pub realized_pnl: Quote,
}

impl Position {
    pub fn new(
        trader: Address,
        side: Side,
        size: Quote,
        collateral: Quote,
        entry_price: Price,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            trader,
            side,
            size,
            collateral,
            entry_price,
            opened_at: timestamp,
            updated_at: timestamp,
            realized_pnl: Quote::zero(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.side.is_long()
    }

    // 4.1: paper gains/losses at the given price, profit capped
    pub fn unrealized_pnl(&self, price: Price, params: &MarginParams) -> Result<Quote, ArithmeticOverflow> {
        let raw = calculate_pnl(self.side, self.size, self.entry_price, price)?;
        cap_profit(raw, self.size, params)
    }

    // 4.2: collateral + pnl. this over size decides liquidation
    pub fn equity(&self, price: Price, params: &MarginParams) -> Result<Quote, ArithmeticOverflow> {
        Ok(calculate_equity(self.collateral, self.unrealized_pnl(price, params)?))
    }

    pub fn margin_ratio(&self, price: Price, params: &MarginParams) -> Result<Decimal, ArithmeticOverflow> {
        margin_ratio(self.equity(price, params)?, self.size)
    }

    // reporting only; saturates instead of failing
    pub fn effective_leverage(&self) -> Decimal {
        if self.collateral.is_zero() {
            return Decimal::ZERO;
        }
        self.size
            .value()
            .checked_div(self.collateral.value())
            .unwrap_or(Decimal::MAX)
    }

    pub fn liquidation_status(
        &self,
        price: Price,
        margin: &MarginParams,
        liquidation: &LiquidationParams,
    ) -> Result<LiquidationStatus, ArithmeticOverflow> {
        evaluate_liquidation(self.collateral, self.unrealized_pnl(price, margin)?, self.size, liquidation)
    }

    pub fn liquidation_price(&self, liquidation: &LiquidationParams) -> Option<Price> {
        calculate_liquidation_price(self.side, self.size, self.collateral, self.entry_price, liquidation.threshold)
    }
}

#[derive(Debug, Clone)]
pub struct PositionUpdate {
    pub new_position: Option<Position>,
    pub realized_pnl: Quote,
    pub collateral_released: Quote,
}

impl PositionUpdate {
    // what the trader walks away with for the reduced slice
    pub fn payout(&self) -> Quote {
        self.collateral_released.add(self.realized_pnl)
    }
}

// 4.3: adds notional and collateral. entry is blended by notional
pub fn increase_position(
    position: &Position,
    added_size: Quote,
    added_collateral: Quote,
    fill_price: Price,
    timestamp: Timestamp,
) -> Result<Position, ArithmeticOverflow> {
    debug_assert!(!added_size.is_negative(), "increase must add notional");

    Ok(Position {
        trader: position.trader,
        side: position.side,
        size: position.size.add(added_size),
        collateral: position.collateral.add(added_collateral),
        entry_price: blended_entry_price(position.size, position.entry_price, added_size, fill_price)?,
        opened_at: position.opened_at,
        updated_at: timestamp,
        realized_pnl: position.realized_pnl,
    })
}

pub fn add_collateral(position: &Position, amount: Quote, timestamp: Timestamp) -> Position {
    Position {
        collateral: position.collateral.add(amount),
        updated_at: timestamp,
        ..position.clone()
    }
}

// 4.4: realizes pnl on the reduced slice, releases collateral proportionally.
// released collateral rounds toward zero so the remainder never goes negative;
// a slice that would strand notional with no collateral closes the position.
pub fn reduce_position(
    position: &Position,
    size_delta: Quote,
    exit_price: Price,
    params: &MarginParams,
    timestamp: Timestamp,
) -> Result<PositionUpdate, ArithmeticOverflow> {
    debug_assert!(size_delta.is_positive(), "reduce amount must be positive");

    let size_delta = size_delta.min(position.size);
    let total_pnl = position.unrealized_pnl(exit_price, params)?;
    let full_close = PositionUpdate {
        new_position: None,
        realized_pnl: total_pnl,
        collateral_released: position.collateral,
    };

    if size_delta == position.size {
        return Ok(full_close);
    }

    let realized = Quote::new(
        mul_div(total_pnl.value(), size_delta.value(), position.size.value())?.round_dp(AMOUNT_DECIMALS),
    );
    let collateral_released = Quote::new(
        mul_div(position.collateral.value(), size_delta.value(), position.size.value())?
            .round_dp_with_strategy(AMOUNT_DECIMALS, RoundingStrategy::ToZero),
    );
    if !position.collateral.sub(collateral_released).is_positive() {
        return Ok(full_close);
    }

    // entry price stays put on a reduction
    let remaining = Position {
        trader: position.trader,
        side: position.side,
        size: position.size.sub(size_delta),
        collateral: position.collateral.sub(collateral_released),
        entry_price: position.entry_price,
        opened_at: position.opened_at,
        updated_at: timestamp,
        realized_pnl: position.realized_pnl.add(realized),
    };

    Ok(PositionUpdate {
        new_position: Some(remaining),
        realized_pnl: realized,
        collateral_released,
    })
}
