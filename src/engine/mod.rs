// 8.0: the market. owns every position, draws on the pool, settles in the
// collateral token. deterministic and event-driven with no external I/O.

mod config;
mod core;
mod liquidations;
mod liquidity;
mod positions;
mod pricing;
mod results;

pub use config::EngineConfig;
pub use core::{Engine, SharedEngine};
pub use results::{CloseOutcome, DecreaseResult, EngineError, LiquidationResult, PositionHealth};
