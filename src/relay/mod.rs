// 13.0: cross-chain intent relay. sender on the source chain, receiver on the
// market's chain, transport in between. the receiver is the only way a relayed
// intent reaches the engine.

mod receiver;
mod sender;
mod transport;

pub use receiver::{IntentOutcome, IntentReceiver};
pub use sender::IntentSender;
pub use transport::{
    InMemoryTransport, InboundMessage, MessageReceiver, OutboundMessage, Transport, TransportError, MAX_PAYLOAD_LEN,
};

use crate::engine::EngineError;
use crate::intent::CodecError;
use crate::types::{Address, ChainId, MessageId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RelayError {
    #[error("Untrusted router {0}")]
    UntrustedRouter(Address),

    #[error("Untrusted source {sender} on {source_chain}")]
    UntrustedSource { source_chain: ChainId, sender: Address },

    #[error("Message addressed to {0}, not this receiver")]
    Misrouted(Address),

    #[error("Re-entrant call while an intent is in flight")]
    Reentrant,

    #[error("Message {message_id:?} from {source_chain} already delivered")]
    AlreadyDelivered { source_chain: ChainId, message_id: MessageId },

    #[error("Caller {caller} cannot send an intent for {trader}")]
    TraderMismatch { caller: Address, trader: Address },

    #[error("Relay state poisoned")]
    Poisoned,

    #[error("Decode error: {0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
