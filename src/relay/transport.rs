// 13.1 relay/transport.rs: MOCKED. the cross-chain messaging layer.
// a real deployment swaps InMemoryTransport for a bridge client; the sender
// and receiver only see the Transport / MessageReceiver seams.
// delivery order is whatever the caller drives. nothing here assumes send order.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::types::{Address, ChainId, MessageId};

pub const MAX_PAYLOAD_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub source_chain: ChainId,
    pub sender: Address,
    pub destination_chain: ChainId,
    pub receiver: Address,
    pub payload: Vec<u8>,
}

/// What the destination sees. `sender` is the source-side contract, never the trader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: MessageId,
    pub source_chain: ChainId,
    pub sender: Address,
    pub receiver: Address,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Empty payload")]
    EmptyPayload,

    #[error("Payload of {len} bytes exceeds {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Message {0:?} is not known to the transport")]
    UnknownMessage(MessageId),

    #[error("Message {0:?} is addressed to another receiver")]
    WrongDestination(MessageId),
}

pub trait Transport {
    /// Accept a message for later delivery and return its id.
    fn send(&mut self, message: OutboundMessage) -> Result<MessageId, TransportError>;
}

/// Destination-side endpoint the transport delivers into.
pub trait MessageReceiver {
    type Output;
    type Error;

    fn address(&self) -> Address;

    fn chain(&self) -> ChainId;

    /// `caller` is whoever invokes the endpoint; for a real delivery that's the router.
    fn receive_message(&self, caller: Address, message: InboundMessage) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone)]
struct Envelope {
    destination_chain: ChainId,
    message: InboundMessage,
}

impl Envelope {
    fn is_for<R: MessageReceiver>(&self, receiver: &R) -> bool {
        self.destination_chain == receiver.chain() && self.message.receiver == receiver.address()
    }
}

/// Router model. Queues messages, hands out increasing ids, delivers on demand.
#[derive(Debug, Clone)]
pub struct InMemoryTransport {
    router: Address,
    next_id: u64,
    pending: VecDeque<Envelope>,
    history: HashMap<MessageId, Envelope>,
}

impl InMemoryTransport {
    pub fn new(router: Address) -> Self {
        Self {
            router,
            next_id: 1,
            pending: VecDeque::new(),
            history: HashMap::new(),
        }
    }

    pub fn router(&self) -> Address {
        self.router
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_ids(&self) -> Vec<MessageId> {
        self.pending.iter().map(|e| e.message.message_id).collect()
    }

    /// Delivers the oldest pending message for `receiver`. None when nothing is queued for it.
    pub fn deliver_next<R: MessageReceiver>(
        &mut self,
        receiver: &R,
    ) -> Option<(MessageId, Result<R::Output, R::Error>)> {
        let index = self.pending.iter().position(|e| e.is_for(receiver))?;
        let envelope = self.pending.remove(index)?;
        let id = envelope.message.message_id;
        Some((id, receiver.receive_message(self.router, envelope.message)))
    }

    /// Delivers one specific pending message, skipping anything queued ahead of it.
    pub fn deliver<R: MessageReceiver>(
        &mut self,
        id: MessageId,
        receiver: &R,
    ) -> Result<Result<R::Output, R::Error>, TransportError> {
        let index = self
            .pending
            .iter()
            .position(|e| e.message.message_id == id)
            .ok_or(TransportError::UnknownMessage(id))?;
        if !self.pending[index].is_for(receiver) {
            return Err(TransportError::WrongDestination(id));
        }
        let envelope = self.pending.remove(index).ok_or(TransportError::UnknownMessage(id))?;
        Ok(receiver.receive_message(self.router, envelope.message))
    }

    pub fn deliver_all<R: MessageReceiver>(&mut self, receiver: &R) -> Vec<(MessageId, Result<R::Output, R::Error>)> {
        let mut results = Vec::new();
        while let Some(result) = self.deliver_next(receiver) {
            results.push(result);
        }
        results
    }

    /// Delivers an already-sent message again, as a flaky bridge would.
    pub fn redeliver<R: MessageReceiver>(
        &mut self,
        id: MessageId,
        receiver: &R,
    ) -> Result<Result<R::Output, R::Error>, TransportError> {
        let envelope = self.history.get(&id).ok_or(TransportError::UnknownMessage(id))?;
        if !envelope.is_for(receiver) {
            return Err(TransportError::WrongDestination(id));
        }
        Ok(receiver.receive_message(self.router, envelope.message.clone()))
    }
}

impl Transport for InMemoryTransport {
    fn send(&mut self, message: OutboundMessage) -> Result<MessageId, TransportError> {
        if message.payload.is_empty() {
            return Err(TransportError::EmptyPayload);
        }
        if message.payload.len() > MAX_PAYLOAD_LEN {
            return Err(TransportError::PayloadTooLarge {
                len: message.payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let id = MessageId(self.next_id);
        self.next_id += 1;

        let envelope = Envelope {
            destination_chain: message.destination_chain,
            message: InboundMessage {
                message_id: id,
                source_chain: message.source_chain,
                sender: message.sender,
                receiver: message.receiver,
                payload: message.payload,
            },
        };
        self.history.insert(id, envelope.clone());
        self.pending.push_back(envelope);
        Ok(id)
    }
}
