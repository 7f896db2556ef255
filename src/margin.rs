//! Margin math for pool-backed positions.
//!
//! Size is notional in collateral currency: `size = collateral * leverage` at entry.
//! PnL is the relative price move applied to that notional, so a long of size 200
//! opened at 2000 earns 100 when the price reaches 3000. Margin ratio is equity over
//! notional; the liquidation module compares it against the threshold.
//!
//! Profit per position is capped at `size * max_profit_factor`. With the default
//! factor of 1 the cap equals the pool reservation, so a payout never exceeds what
//! the pool set aside for the position.
//!
//! Anything that multiplies or divides is checked and reports
//! [`ArithmeticOverflow`] instead of panicking.

use crate::types::{mul_div, ArithmeticOverflow, Leverage, Price, Quote, Side, AMOUNT_DECIMALS};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginParams {
    pub min_leverage: Decimal,
    pub max_leverage: Decimal,
    pub max_profit_factor: Decimal,
}

impl Default for MarginParams {
    fn default() -> Self {
        Self {
            min_leverage: dec!(1),
            max_leverage: dec!(10),
            max_profit_factor: dec!(1),
        }
    }
}

/// Inclusive bounds check. None means the request is outside [min, max].
pub fn validate_leverage(requested: Decimal, params: &MarginParams) -> Option<Leverage> {
    if requested < params.min_leverage || requested > params.max_leverage {
        return None;
    }
    Leverage::new(requested)
}

pub fn notional_size(collateral: Quote, leverage: Leverage) -> Result<Quote, ArithmeticOverflow> {
    collateral.checked_mul(leverage.value())
}

/// `size * (exit - entry) / entry`, negated for shorts. Uncapped.
pub fn calculate_pnl(
    side: Side,
    size: Quote,
    entry_price: Price,
    exit_price: Price,
) -> Result<Quote, ArithmeticOverflow> {
    let price_move = exit_price.value() - entry_price.value();
    let pnl = mul_div(size.value(), price_move, entry_price.value())?;
    Ok(Quote::new((side.sign() * pnl).round_dp(AMOUNT_DECIMALS)))
}

// losses pass through untouched, gains stop at the cap
pub fn cap_profit(pnl: Quote, size: Quote, params: &MarginParams) -> Result<Quote, ArithmeticOverflow> {
    let cap = size.checked_mul(params.max_profit_factor)?;
    Ok(pnl.min(cap))
}

pub fn calculate_equity(collateral: Quote, pnl: Quote) -> Quote {
    collateral.add(pnl)
}

/// Equity over notional. Zero for an empty position.
pub fn margin_ratio(equity: Quote, size: Quote) -> Result<Decimal, ArithmeticOverflow> {
    if size.is_zero() {
        return Ok(Decimal::ZERO);
    }
    equity.value().checked_div(size.value()).ok_or(ArithmeticOverflow)
}

/// Entry price after adding notional, weighted by existing vs added notional.
/// Written as `entry + (fill - entry) * added / total` so it stays between the
/// two prices without forming `size * price` products.
pub fn blended_entry_price(
    existing_size: Quote,
    existing_entry: Price,
    added_size: Quote,
    fill_price: Price,
) -> Result<Price, ArithmeticOverflow> {
    let total = existing_size.add(added_size);
    if total.is_zero() {
        return Ok(existing_entry);
    }
    let shift = mul_div(
        fill_price.value() - existing_entry.value(),
        added_size.value(),
        total.value(),
    )?;
    Ok(Price::new_unchecked(existing_entry.value() + shift))
}
