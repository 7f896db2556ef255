// 13.3 relay/receiver.rs: destination side. the transport calls in here.
// checks run in a fixed order: router, source, destination, re-entrancy,
// dedup, decode. then the intent runs against the engine under its lock, on behalf of the
// trader named in the payload. any error surfaces unchanged and nothing is recorded.
// deliveries from other threads wait for the lock; only a nested call from the
// thread already inside the receiver is rejected.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

use super::transport::{InboundMessage, MessageReceiver};
use super::RelayError;
use crate::config::ReceiverConfig;
use crate::engine::{CloseOutcome, DecreaseResult, Engine, SharedEngine};
use crate::intent::{decode_intent, Intent, IntentAction};
use crate::position::Position;
use crate::price_feed::{MockPriceFeed, PriceOracle};
use crate::types::{Address, ChainId, MessageId};

/// Engine result of one executed intent.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentOutcome {
    Opened(Position),
    Increased(Position),
    CollateralAdded(Position),
    Decreased(DecreaseResult),
    Closed(CloseOutcome),
}

// marks the current thread as inside the receiver until dropped
struct InFlight<'a> {
    threads: &'a Mutex<HashSet<ThreadId>>,
    id: ThreadId,
}

impl<'a> InFlight<'a> {
    fn enter(threads: &'a Mutex<HashSet<ThreadId>>) -> Result<Self, RelayError> {
        let id = thread::current().id();
        let mut inside = threads.lock().map_err(|_| RelayError::Poisoned)?;
        if !inside.insert(id) {
            return Err(RelayError::Reentrant);
        }
        Ok(Self { threads, id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

pub struct IntentReceiver<O: PriceOracle = MockPriceFeed> {
    config: ReceiverConfig,
    engine: SharedEngine<O>,
    in_flight: Mutex<HashSet<ThreadId>>,
    delivered: Mutex<HashSet<(ChainId, MessageId)>>,
    executed: AtomicU64,
}

impl<O: PriceOracle> IntentReceiver<O> {
    pub fn new(config: ReceiverConfig, engine: SharedEngine<O>) -> Self {
        Self {
            config,
            engine,
            in_flight: Mutex::new(HashSet::new()),
            delivered: Mutex::new(HashSet::new()),
            executed: AtomicU64::new(0),
        }
    }

    pub fn engine(&self) -> &SharedEngine<O> {
        &self.engine
    }

    pub fn executed_count(&self) -> u64 {
        self.executed.load(Ordering::Acquire)
    }

    pub fn is_delivered(&self, source_chain: ChainId, message_id: MessageId) -> Result<bool, RelayError> {
        let delivered = self.delivered.lock().map_err(|_| RelayError::Poisoned)?;
        Ok(delivered.contains(&(source_chain, message_id)))
    }

    pub fn receive(&self, caller: Address, message: InboundMessage) -> Result<IntentOutcome, RelayError> {
        if caller != self.config.router {
            return Err(RelayError::UntrustedRouter(caller));
        }
        if message.source_chain != self.config.trusted_source_chain || message.sender != self.config.trusted_sender {
            return Err(RelayError::UntrustedSource {
                source_chain: message.source_chain,
                sender: message.sender,
            });
        }
        if message.receiver != self.config.address {
            return Err(RelayError::Misrouted(message.receiver));
        }

        let _guard = InFlight::enter(&self.in_flight)?;

        // held from the dedup check to the delivery record so two threads
        // cannot both execute the same message
        let mut engine = self.engine.lock().map_err(|_| RelayError::Poisoned)?;

        let key = (message.source_chain, message.message_id);
        if self.config.deduplicate && self.is_delivered(key.0, key.1)? {
            return Err(RelayError::AlreadyDelivered {
                source_chain: key.0,
                message_id: key.1,
            });
        }

        let intent = decode_intent(&message.payload)?;
        let outcome = dispatch(&mut engine, &intent)?;
        engine.record_intent_dispatched(message.message_id, message.source_chain, intent.trader, intent.action);

        if self.config.deduplicate {
            let mut delivered = self.delivered.lock().map_err(|_| RelayError::Poisoned)?;
            delivered.insert(key);
        }
        self.executed.fetch_add(1, Ordering::AcqRel);
        Ok(outcome)
    }
}

// the trader comes from the payload. the caller here is the router
fn dispatch<O: PriceOracle>(engine: &mut Engine<O>, intent: &Intent) -> Result<IntentOutcome, RelayError> {
    let trader = intent.trader;
    let outcome = match intent.action {
        IntentAction::Open => {
            IntentOutcome::Opened(engine.open_position(trader, intent.amount, intent.leverage, intent.side)?)
        }
        IntentAction::Increase => {
            IntentOutcome::Increased(engine.increase_position(trader, intent.amount, intent.leverage)?)
        }
        IntentAction::AddCollateral => IntentOutcome::CollateralAdded(engine.add_collateral(trader, intent.amount)?),
        IntentAction::Decrease => IntentOutcome::Decreased(engine.decrease_position(trader, intent.amount)?),
        IntentAction::Close => IntentOutcome::Closed(engine.close_position_on_behalf(trader)?),
    };
    Ok(outcome)
}

impl<O: PriceOracle> MessageReceiver for IntentReceiver<O> {
    type Output = IntentOutcome;
    type Error = RelayError;

    fn address(&self) -> Address {
        self.config.address
    }

    fn chain(&self) -> ChainId {
        self.config.chain
    }

    fn receive_message(&self, caller: Address, message: InboundMessage) -> Result<IntentOutcome, RelayError> {
        self.receive(caller, message)
    }
}
