// 11.0: every state change produces an event. this is the venue's audit trail:
// replaying the log reconstructs every position and pool transition.
// the EventPayload enum lists all event types. all of it serializes with serde.

use crate::intent::IntentAction;
use crate::types::{Address, ChainId, MessageId, Price, Quote, Shares, Side, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }

    // one line of JSON, for log shipping
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Pool events
    LiquidityDeposited(LiquidityDepositedEvent),
    LiquidityWithdrawn(LiquidityWithdrawnEvent),

    // Position events
    PositionOpened(PositionOpenedEvent),
    PositionIncreased(PositionIncreasedEvent),
    CollateralAdded(CollateralAddedEvent),
    PositionDecreased(PositionDecreasedEvent),
    PositionClosed(PositionClosedEvent),

    // Risk events
    PositionLiquidated(PositionLiquidatedEvent),
    LiquidatedBy(LiquidatedByEvent),

    // Relay events
    IntentDispatched(IntentDispatchedEvent),
}

impl EventPayload {
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::LiquidityDeposited(_) => "LiquidityDeposited",
            EventPayload::LiquidityWithdrawn(_) => "LiquidityWithdrawn",
            EventPayload::PositionOpened(_) => "PositionOpened",
            EventPayload::PositionIncreased(_) => "PositionIncreased",
            EventPayload::CollateralAdded(_) => "CollateralAdded",
            EventPayload::PositionDecreased(_) => "PositionDecreased",
            EventPayload::PositionClosed(_) => "PositionClosed",
            EventPayload::PositionLiquidated(_) => "PositionLiquidated",
            EventPayload::LiquidatedBy(_) => "LiquidatedBy",
            EventPayload::IntentDispatched(_) => "IntentDispatched",
        }
    }

    /// Trader the event is about, if any.
    pub fn trader(&self) -> Option<Address> {
        match self {
            EventPayload::LiquidityDeposited(_) | EventPayload::LiquidityWithdrawn(_) => None,
            EventPayload::PositionOpened(e) => Some(e.trader),
            EventPayload::PositionIncreased(e) => Some(e.trader),
            EventPayload::CollateralAdded(e) => Some(e.trader),
            EventPayload::PositionDecreased(e) => Some(e.trader),
            EventPayload::PositionClosed(e) => Some(e.trader),
            EventPayload::PositionLiquidated(e) => Some(e.trader),
            EventPayload::LiquidatedBy(e) => Some(e.trader),
            EventPayload::IntentDispatched(e) => Some(e.trader),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityDepositedEvent {
    pub provider: Address,
    pub amount: Quote,
    pub shares_minted: Shares,
    pub total_liquidity: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityWithdrawnEvent {
    pub provider: Address,
    pub shares_burned: Shares,
    pub amount: Quote,
    pub total_liquidity: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub trader: Address,
    pub side: Side,
    pub size: Quote,
    pub collateral: Quote,
    pub entry_price: Price,
    pub leverage: rust_decimal::Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionIncreasedEvent {
    pub trader: Address,
    pub added_size: Quote,
    pub added_collateral: Quote,
    pub size: Quote,
    pub collateral: Quote,
    pub entry_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralAddedEvent {
    pub trader: Address,
    pub amount: Quote,
    pub collateral: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionDecreasedEvent {
    pub trader: Address,
    pub size_delta: Quote,
    pub size: Quote,
    pub collateral: Quote,
    pub realized_pnl: Quote,
    pub exit_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub trader: Address,
    pub side: Side,
    pub size: Quote,
    pub collateral: Quote,
    pub realized_pnl: Quote,
    pub exit_price: Price,
    pub payout: Quote,
}

// liquidator is None when a close turned into a liquidation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLiquidatedEvent {
    pub trader: Address,
    pub liquidator: Option<Address>,
    pub size: Quote,
    pub collateral: Quote,
    pub pnl: Quote,
    pub liquidation_price: Price,
    pub to_pool: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidatedByEvent {
    pub liquidator: Address,
    pub trader: Address,
    pub reward: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDispatchedEvent {
    pub message_id: MessageId,
    pub source_chain: ChainId,
    pub trader: Address,
    pub action: IntentAction,
}

/// Bounded, append-only event history. Oldest entries drop first once full.
#[derive(Debug)]
pub struct EventLog {
    events: Vec<Event>,
    next_id: u64,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, timestamp: Timestamp, payload: EventPayload) -> &Event {
        let event = Event::new(EventId(self.next_id), timestamp, payload);
        self.next_id += 1;
        self.events.push(event);

        if self.events.len() > self.capacity {
            let drain_count = self.events.len() - self.capacity;
            self.events.drain(0..drain_count);
        }
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    // ids keep counting even after old events are dropped
    pub fn total_recorded(&self) -> u64 {
        self.next_id - 1
    }
}
