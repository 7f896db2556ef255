//! Oracle reads.

use super::core::Engine;
use super::results::EngineError;
use crate::price_feed::{OracleError, PriceOracle};
use crate::types::Price;

impl<O: PriceOracle> Engine<O> {
    /// Current oracle price. Rejects a stale reading when a max age is configured.
    pub fn current_price(&self) -> Result<Price, EngineError> {
        let update = self.oracle.latest_price()?;

        if let Some(max_age_ms) = self.params.max_price_age_ms {
            if update.is_stale(self.current_time, max_age_ms) {
                return Err(EngineError::Oracle(OracleError::Stale {
                    age_ms: update.age_ms(self.current_time),
                    max_age_ms,
                }));
            }
        }

        Ok(update.price)
    }
}
