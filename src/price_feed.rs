// Price Feed Integration
//
// The engine asks one oracle for one scalar price per query. It does not care
// whether that comes from Chainlink, Pyth or a test fixture; anything that
// implements PriceOracle works. Staleness is judged by the engine against its
// own clock using the update timestamp.

use crate::types::{Price, Timestamp, PRICE_DECIMALS};
use serde::{Deserialize, Serialize};

/// A single price reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub price: Price,
    pub timestamp: Timestamp,
}

impl PriceUpdate {
    pub fn new(price: Price, timestamp: Timestamp) -> Self {
        Self { price, timestamp }
    }

    pub fn age_ms(&self, now: Timestamp) -> i64 {
        now.millis_since(self.timestamp)
    }

    pub fn is_stale(&self, now: Timestamp, max_age_ms: i64) -> bool {
        self.age_ms(now) > max_age_ms
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle {0} unavailable")]
    Unavailable(String),

    #[error("Stale price: {age_ms}ms old, max {max_age_ms}ms")]
    Stale { age_ms: i64, max_age_ms: i64 },

    #[error("Invalid raw price {0}")]
    InvalidPrice(u128),
}

/// Trait for price oracles. Implement this to plug a real feed into the engine.
pub trait PriceOracle {
    /// Human readable name
    fn name(&self) -> &str;

    /// Latest reading, or why there isn't one
    fn latest_price(&self) -> Result<PriceUpdate, OracleError>;
}

/// Mock oracle for tests and the simulator
#[derive(Debug, Clone)]
pub struct MockPriceFeed {
    name: String,
    current_price: Price,
    updated_at: Timestamp,
    healthy: bool,
}

impl MockPriceFeed {
    pub fn new(name: &str, price: Price) -> Self {
        Self {
            name: name.to_string(),
            current_price: price,
            updated_at: Timestamp::from_millis(0),
            healthy: true,
        }
    }

    pub fn set_price(&mut self, price: Price) {
        self.current_price = price;
    }

    pub fn set_price_at(&mut self, price: Price, timestamp: Timestamp) {
        self.current_price = price;
        self.updated_at = timestamp;
    }

    // raw feed value with PRICE_DECIMALS, e.g. 2000e8
    pub fn set_price_scaled(&mut self, raw: u128) -> Result<(), OracleError> {
        let price = Price::from_scaled(raw, PRICE_DECIMALS).ok_or(OracleError::InvalidPrice(raw))?;
        self.current_price = price;
        Ok(())
    }

    pub fn set_updated_at(&mut self, timestamp: Timestamp) {
        self.updated_at = timestamp;
    }

    pub fn set_healthy(&mut self, healthy: bool) {
        self.healthy = healthy;
    }

    pub fn price(&self) -> Price {
        self.current_price
    }
}

impl PriceOracle for MockPriceFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn latest_price(&self) -> Result<PriceUpdate, OracleError> {
        if !self.healthy {
            return Err(OracleError::Unavailable(self.name.clone()));
        }
        Ok(PriceUpdate::new(self.current_price, self.updated_at))
    }
}
