//! Liquidation conditions and collateral split.
//!
//! A position is liquidatable once its margin ratio (equity / notional) sits at or
//! below the threshold, evaluated at the current oracle price. The liquidator is paid
//! a fixed fraction of the seized collateral; the rest moves into the pool.

use crate::margin::{calculate_equity, margin_ratio};
use crate::types::{ArithmeticOverflow, Price, Quote, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationParams {
    /// Margin ratio at or below which a position can be liquidated.
    pub threshold: Decimal,
    /// Fraction of seized collateral paid to the liquidator.
    pub reward_fraction: Decimal,
}

impl Default for LiquidationParams {
    fn default() -> Self {
        Self {
            threshold: dec!(0.05),
            reward_fraction: dec!(0.05),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiquidationStatus {
    Safe {
        margin_ratio: Decimal,
    },
    Liquidatable {
        margin_ratio: Decimal,
        shortfall: Quote,
    },
    // equity below zero. the pool only recovers the collateral.
    Bankrupt {
        margin_ratio: Decimal,
        deficit: Quote,
    },
}

impl LiquidationStatus {
    pub fn is_liquidatable(&self) -> bool {
        !matches!(self, LiquidationStatus::Safe { .. })
    }

    pub fn margin_ratio(&self) -> Decimal {
        match self {
            LiquidationStatus::Safe { margin_ratio }
            | LiquidationStatus::Liquidatable { margin_ratio, .. }
            | LiquidationStatus::Bankrupt { margin_ratio, .. } => *margin_ratio,
        }
    }
}

pub fn evaluate_liquidation(
    collateral: Quote,
    pnl: Quote,
    size: Quote,
    params: &LiquidationParams,
) -> Result<LiquidationStatus, ArithmeticOverflow> {
    let equity = calculate_equity(collateral, pnl);
    let ratio = margin_ratio(equity, size)?;

    if equity.is_negative() {
        return Ok(LiquidationStatus::Bankrupt {
            margin_ratio: ratio,
            deficit: equity.abs(),
        });
    }

    if ratio <= params.threshold {
        let required = size.checked_mul(params.threshold)?;
        return Ok(LiquidationStatus::Liquidatable {
            margin_ratio: ratio,
            shortfall: required.sub(equity),
        });
    }

    Ok(LiquidationStatus::Safe { margin_ratio: ratio })
}

/// Price at which the margin ratio reaches the threshold.
///
/// Long:  `entry * (1 + threshold - collateral / size)`
/// Short: `entry * (1 - threshold + collateral / size)`
///
/// None when the position is empty, the long price would be non-positive, or the
/// price does not fit in a decimal.
pub fn calculate_liquidation_price(
    side: Side,
    size: Quote,
    collateral: Quote,
    entry_price: Price,
    threshold: Decimal,
) -> Option<Price> {
    if !size.is_positive() {
        return None;
    }
    let collateral_fraction = collateral.value().checked_div(size.value())?;
    let factor = match side {
        Side::Long => Decimal::ONE + threshold - collateral_fraction,
        Side::Short => (Decimal::ONE - threshold).checked_add(collateral_fraction)?,
    };
    Price::new(entry_price.value().checked_mul(factor)?)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollateralSplit {
    pub liquidator_reward: Quote,
    pub to_pool: Quote,
}

pub fn split_seized_collateral(collateral: Quote, params: &LiquidationParams) -> CollateralSplit {
    let reward = collateral.mul(params.reward_fraction).min(collateral).max(Quote::zero());
    CollateralSplit {
        liquidator_reward: reward,
        to_pool: collateral.sub(reward),
    }
}
