// 8.0.2: result types and errors for engine operations.

use crate::config::ConfigError;
use crate::custody::CustodyError;
use crate::liquidity::PoolError;
use crate::position::Position;
use crate::price_feed::OracleError;
use crate::types::{Address, ArithmeticOverflow, Price, Quote};
use rust_decimal::Decimal;
use serde::Serialize;

/// What a decrease did. `remaining` is None when the whole position was reduced.
#[derive(Debug, Clone, PartialEq)]
pub struct DecreaseResult {
    pub remaining: Option<Position>,
    pub size_delta: Quote,
    pub realized_pnl: Quote,
    pub payout: Quote,
    pub exit_price: Price,
}

/// Outcome of a close. A close that found the position under water is
/// settled as a liquidation: `liquidated` is set and `payout` is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseOutcome {
    pub trader: Address,
    pub exit_price: Price,
    pub realized_pnl: Quote,
    pub payout: Quote,
    pub liquidated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiquidationResult {
    pub trader: Address,
    pub liquidator: Option<Address>,
    pub size: Quote,
    pub collateral: Quote,
    pub pnl: Quote,
    pub liquidation_price: Price,
    pub reward: Quote,
    pub to_pool: Quote,
}

/// Read-only snapshot of a position at the current oracle price.
#[derive(Debug, Clone, Serialize)]
pub struct PositionHealth {
    pub trader: Address,
    pub size: Quote,
    pub collateral: Quote,
    pub entry_price: Price,
    pub mark_price: Price,
    pub pnl: Quote,
    pub equity: Quote,
    pub margin_ratio: Decimal,
    pub leverage: Decimal,
    pub liquidation_price: Option<Price>,
    pub liquidatable: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Zero collateral")]
    ZeroCollateral,

    #[error("Zero amount")]
    ZeroAmount,

    #[error("Amount {0} is finer than the token's 18 decimals")]
    ExcessPrecision(Quote),

    #[error("Leverage must be {min}x to {max}x, got {requested}x")]
    InvalidLeverage {
        requested: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("Exceeds utilization limit: {utilization} > {max}")]
    UtilizationExceeded { utilization: Decimal, max: Decimal },

    #[error("Position already open for {0}")]
    PositionExists(Address),

    #[error("No open position for {0}")]
    PositionNotFound(Address),

    #[error("Liquidated: position of {0} is at or below the liquidation threshold")]
    PositionLiquidatable(Address),

    #[error("Position of {0} is healthy")]
    PositionHealthy(Address),

    #[error("Trader {0} cannot liquidate their own position")]
    SelfLiquidation(Address),

    #[error("Size delta {requested} must be in (0, {size}]")]
    InvalidSizeDelta { requested: Quote, size: Quote },

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Overflow(#[from] ArithmeticOverflow),
}
