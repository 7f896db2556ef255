// 7.0 config.rs: all settings in one place. market params, engine wiring, relay trust.
// 7.1 MarketParams holds margin + liquidation + pool ceiling. engine reads it on every call.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::liquidation::LiquidationParams;
use crate::margin::MarginParams;
use crate::types::{Address, ChainId};

// Risk parameters for the single market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketParams {
    pub margin: MarginParams,
    pub liquidation: LiquidationParams,
    // Max reserved / total after an open or increase (0.8 = 80%)
    pub max_utilization: Decimal,
    // Oracle readings older than this are rejected. None = no check
    pub max_price_age_ms: Option<i64>,
}

impl Default for MarketParams {
    fn default() -> Self {
        Self {
            margin: MarginParams::default(),
            liquidation: LiquidationParams::default(),
            max_utilization: Decimal::new(80, 2), // 80%
            max_price_age_ms: None,
        }
    }
}

/** 7.2: source side. where intents leave from and who they go to */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    // The sender contract's own identity, as seen by the destination
    pub address: Address,
    pub source_chain: ChainId,
    pub destination_chain: ChainId,
    // Receiver contract on the destination chain
    pub receiver: Address,
}

/** 7.3: destination side. the three things the receiver trusts */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    pub address: Address,
    // Chain the receiver (and the market) lives on
    pub chain: ChainId,
    // Only this caller may invoke receive_message
    pub router: Address,
    pub trusted_source_chain: ChainId,
    pub trusted_sender: Address,
    // Drop redelivered message ids instead of executing them again
    pub deduplicate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub sender: SenderConfig,
    pub receiver: ReceiverConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let source_chain = ChainId(1);
        let destination_chain = ChainId(10);
        let sender = Address::from_low_u64(0x4000);
        let receiver = Address::from_low_u64(0x5000);

        Self {
            sender: SenderConfig {
                address: sender,
                source_chain,
                destination_chain,
                receiver,
            },
            receiver: ReceiverConfig {
                address: receiver,
                chain: destination_chain,
                router: Address::from_low_u64(0x6000),
                trusted_source_chain: source_chain,
                trusted_sender: sender,
                deduplicate: true,
            },
        }
    }
}

// The complete venue configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueConfig {
    pub engine: EngineConfig,
    pub market: MarketParams,
    pub relay: RelayConfig,
}

impl VenueConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    // Create a configuration preset for testnet
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.engine.verbose = true;
        config.relay.receiver.deduplicate = false; // see every redelivery on testnet
        config
    }

    // Conservative settings: lower leverage, more headroom for LPs, fresh prices only
    pub fn conservative() -> Self {
        let mut config = Self::default();
        config.market.margin.max_leverage = Decimal::new(5, 0); // 5x max
        config.market.liquidation.threshold = Decimal::new(8, 2); // 8%
        config.market.max_utilization = Decimal::new(60, 2); // 60%
        config.market.max_price_age_ms = Some(60_000);
        config
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let margin = &self.market.margin;
        if margin.min_leverage < Decimal::ONE || margin.min_leverage > margin.max_leverage {
            return Err(ConfigError::InvalidMargin {
                reason: "Leverage bounds must satisfy 1 <= min <= max".to_string(),
            });
        }

        // factor above 1 would let a payout exceed the reservation
        if margin.max_profit_factor <= Decimal::ZERO || margin.max_profit_factor > Decimal::ONE {
            return Err(ConfigError::InvalidMargin {
                reason: "Max profit factor must be in (0, 1]".to_string(),
            });
        }

        let liquidation = &self.market.liquidation;
        if liquidation.threshold <= Decimal::ZERO || liquidation.threshold >= Decimal::ONE {
            return Err(ConfigError::InvalidLiquidation {
                reason: "Threshold must be between 0 and 1".to_string(),
            });
        }

        // a fresh max leverage position starts at ratio 1/max
        if liquidation.threshold >= Decimal::ONE / margin.max_leverage {
            return Err(ConfigError::InvalidLiquidation {
                reason: "Threshold must sit below 1 / max leverage".to_string(),
            });
        }

        if liquidation.reward_fraction < Decimal::ZERO || liquidation.reward_fraction >= Decimal::ONE {
            return Err(ConfigError::InvalidLiquidation {
                reason: "Reward fraction must be in [0, 1)".to_string(),
            });
        }

        if self.market.max_utilization <= Decimal::ZERO || self.market.max_utilization > Decimal::ONE {
            return Err(ConfigError::InvalidUtilization {
                reason: "Max utilization must be in (0, 1]".to_string(),
            });
        }

        if matches!(self.market.max_price_age_ms, Some(age) if age <= 0) {
            return Err(ConfigError::InvalidMarket {
                reason: "Max price age must be positive".to_string(),
            });
        }

        // engine checks
        let engine = &self.engine;
        if engine.market_address == engine.pool_custody {
            return Err(ConfigError::InvalidEngine {
                reason: "Market and pool custody must be distinct".to_string(),
            });
        }
        if engine.market_address == Address::ZERO || engine.pool_custody == Address::ZERO {
            return Err(ConfigError::InvalidEngine {
                reason: "Custody addresses must be non-zero".to_string(),
            });
        }
        if engine.max_events == 0 {
            return Err(ConfigError::InvalidEngine {
                reason: "Need room for at least 1 event".to_string(),
            });
        }

        // relay checks: both ends must point at each other
        let sender = &self.relay.sender;
        let receiver = &self.relay.receiver;
        if sender.receiver != receiver.address {
            return Err(ConfigError::InvalidRelay {
                reason: "Sender targets a different receiver".to_string(),
            });
        }
        if receiver.trusted_sender != sender.address || receiver.trusted_source_chain != sender.source_chain {
            return Err(ConfigError::InvalidRelay {
                reason: "Receiver does not trust the configured sender".to_string(),
            });
        }
        if sender.destination_chain != receiver.chain {
            return Err(ConfigError::InvalidRelay {
                reason: "Sender targets a different chain".to_string(),
            });
        }
        if sender.source_chain == sender.destination_chain {
            return Err(ConfigError::InvalidRelay {
                reason: "Source and destination chain must differ".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid margin config: {reason}")]
    InvalidMargin { reason: String },

    #[error("Invalid liquidation config: {reason}")]
    InvalidLiquidation { reason: String },

    #[error("Invalid utilization config: {reason}")]
    InvalidUtilization { reason: String },

    #[error("Invalid market config: {reason}")]
    InvalidMarket { reason: String },

    #[error("Invalid engine config: {reason}")]
    InvalidEngine { reason: String },

    #[error("Invalid relay config: {reason}")]
    InvalidRelay { reason: String },

    #[error("Config parse error: {0}")]
    Parse(String),
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> VenueConfig {
        match self {
            Environment::Development => VenueConfig::default(),
            Environment::Testnet => VenueConfig::testnet(),
            Environment::Mainnet => VenueConfig::conservative(),
        }
    }
}
