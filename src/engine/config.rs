//! Engine configuration options.

use crate::types::Address;
use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deployer. The only caller allowed to bind the pool to a market.
    pub owner: Address,
    /// Identity of the market; also where posted collateral is held.
    pub market_address: Address,
    /// Where pool liquidity is held.
    pub pool_custody: Address,
    /// Symbol of the collateral/settlement currency.
    pub collateral_symbol: String,
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Enable verbose logging.
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            owner: Address::from_low_u64(0x0a),
            market_address: Address::from_low_u64(0x1000),
            pool_custody: Address::from_low_u64(0x2000),
            collateral_symbol: "USDC".to_string(),
            max_events: 100_000,
            verbose: false,
        }
    }
}
