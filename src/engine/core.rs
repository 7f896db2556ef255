// 8.0 engine/core.rs: main engine. holds the position table, the pool, the token
// ledger and the oracle. one Engine = one market. wrap it in SharedEngine to
// serialize access from the relay.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::config::{MarketParams, VenueConfig};
use crate::custody::TokenLedger;
use crate::events::{Event, EventLog, EventPayload, IntentDispatchedEvent};
use crate::intent::IntentAction;
use crate::liquidity::LiquidityPool;
use crate::position::Position;
use crate::price_feed::{MockPriceFeed, PriceOracle};
use crate::types::{Address, ChainId, MessageId, Quote, Timestamp};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Single-writer handle. Every operation runs under the lock, so no two
/// transactions ever interleave their effects.
pub type SharedEngine<O = MockPriceFeed> = Arc<Mutex<Engine<O>>>;

/** 8.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine<O: PriceOracle = MockPriceFeed> {
    pub(super) config: EngineConfig,
    pub(super) params: MarketParams,
    pub(super) oracle: O,
    pub(super) token: TokenLedger,
    pub(super) pool: LiquidityPool,
    pub(super) positions: HashMap<Address, Position>,
    pub(super) events: EventLog,
    pub(super) current_time: Timestamp,
}

impl<O: PriceOracle> Engine<O> {
    pub fn new(config: EngineConfig, params: MarketParams, oracle: O) -> Result<Self, EngineError> {
        let mut pool = LiquidityPool::new(config.owner, config.pool_custody);
        pool.set_market(config.owner, config.market_address)?;

        Ok(Self {
            token: TokenLedger::new(&config.collateral_symbol),
            events: EventLog::new(config.max_events),
            config,
            params,
            oracle,
            pool,
            positions: HashMap::new(),
            current_time: Timestamp::from_millis(0),
        })
    }

    pub fn from_config(venue: &VenueConfig, oracle: O) -> Result<Self, EngineError> {
        venue.validate()?;
        Self::new(venue.engine.clone(), venue.market.clone(), oracle)
    }

    pub fn into_shared(self) -> SharedEngine<O> {
        Arc::new(Mutex::new(self))
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn params(&self) -> &MarketParams {
        &self.params
    }

    pub fn market_address(&self) -> Address {
        self.config.market_address
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn token(&self) -> &TokenLedger {
        &self.token
    }

    // faucet for sims and tests
    pub fn mint(&mut self, to: Address, amount: Quote) -> Result<(), EngineError> {
        self.token.mint(to, amount)?;
        Ok(())
    }

    pub fn balance_of(&self, holder: Address) -> Quote {
        self.token.balance_of(holder)
    }

    pub fn pool(&self) -> &LiquidityPool {
        &self.pool
    }

    pub fn position(&self, trader: Address) -> Option<&Position> {
        self.positions.get(&trader)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    // sum of posted collateral. market custody must always hold exactly this
    pub fn total_collateral(&self) -> Quote {
        self.positions.values().map(|p| p.collateral).sum()
    }

    pub fn total_open_size(&self) -> Quote {
        self.positions.values().map(|p| p.size).sum()
    }

    pub fn market_custody_balance(&self) -> Quote {
        self.token.balance_of(self.config.market_address)
    }

    pub fn pool_custody_balance(&self) -> Quote {
        self.token.balance_of(self.pool.custody())
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        self.events.recent(count)
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    /// Audit record for an intent the relay just executed.
    pub fn record_intent_dispatched(
        &mut self,
        message_id: MessageId,
        source_chain: ChainId,
        trader: Address,
        action: IntentAction,
    ) {
        self.emit_event(EventPayload::IntentDispatched(IntentDispatchedEvent {
            message_id,
            source_chain,
            trader,
            action,
        }));
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let verbose = self.config.verbose;
        let event = self.events.record(self.current_time, payload);

        if verbose {
            println!("[Event {}] {:?}", event.id.0, event.payload);
        }
    }
}
