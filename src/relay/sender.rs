// 13.2 relay/sender.rs: source side. encodes an authorized intent and hands it
// to the transport. no funds checks and no retries here; execution on the
// destination decides, delivery belongs to the transport.

use super::transport::{OutboundMessage, Transport};
use super::RelayError;
use crate::config::SenderConfig;
use crate::intent::Intent;
use crate::types::{Address, MessageId};

#[derive(Debug, Clone)]
pub struct IntentSender {
    config: SenderConfig,
    sent: u64,
}

impl IntentSender {
    pub fn new(config: SenderConfig) -> Self {
        Self { config, sent: 0 }
    }

    pub fn address(&self) -> Address {
        self.config.address
    }

    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    /// Only the trader named in the intent may send it.
    pub fn send_intent<T: Transport>(
        &mut self,
        caller: Address,
        intent: &Intent,
        transport: &mut T,
    ) -> Result<MessageId, RelayError> {
        if intent.trader != caller {
            return Err(RelayError::TraderMismatch {
                caller,
                trader: intent.trader,
            });
        }
        let payload = intent.encode()?;

        let id = transport.send(OutboundMessage {
            source_chain: self.config.source_chain,
            sender: self.config.address,
            destination_chain: self.config.destination_chain,
            receiver: self.config.receiver,
            payload,
        })?;
        self.sent += 1;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::intent::{decode_intent, CodecError};
    use crate::relay::InMemoryTransport;
    use crate::types::{Quote, Side};
    use rust_decimal_macros::dec;

    fn trader() -> Address {
        Address::from_low_u64(0x22)
    }

    #[test]
    fn sends_encoded_intent() {
        let config = RelayConfig::default();
        let mut sender = IntentSender::new(config.sender.clone());
        let mut transport = InMemoryTransport::new(config.receiver.router);

        let intent = Intent::open(trader(), Quote::new(dec!(100)), dec!(2), Side::Long);
        sender.send_intent(trader(), &intent, &mut transport).unwrap();

        assert_eq!(sender.sent_count(), 1);
        assert_eq!(transport.pending(), 1);
    }

    #[test]
    fn payload_decodes_back() {
        struct Capture(Option<OutboundMessage>);
        impl Transport for Capture {
            fn send(&mut self, message: OutboundMessage) -> Result<MessageId, crate::relay::TransportError> {
                self.0 = Some(message);
                Ok(MessageId(1))
            }
        }

        let config = RelayConfig::default();
        let mut sender = IntentSender::new(config.sender.clone());
        let mut capture = Capture(None);
        let intent = Intent::decrease(trader(), Quote::new(dec!(50)));
        sender.send_intent(trader(), &intent, &mut capture).unwrap();

        let message = capture.0.unwrap();
        assert_eq!(message.sender, config.sender.address);
        assert_eq!(message.receiver, config.receiver.address);
        assert_eq!(decode_intent(&message.payload).unwrap(), intent);
    }

    #[test]
    fn refuses_someone_elses_intent() {
        let config = RelayConfig::default();
        let mut sender = IntentSender::new(config.sender);
        let mut transport = InMemoryTransport::new(config.receiver.router);
        let intent = Intent::close(trader());

        let other = Address::from_low_u64(0x23);
        assert_eq!(
            sender.send_intent(other, &intent, &mut transport),
            Err(RelayError::TraderMismatch { caller: other, trader: trader() })
        );
        assert_eq!(transport.pending(), 0);
        assert_eq!(sender.sent_count(), 0);
    }

    #[test]
    fn unencodable_intent_not_sent() {
        let config = RelayConfig::default();
        let mut sender = IntentSender::new(config.sender);
        let mut transport = InMemoryTransport::new(config.receiver.router);
        let intent = Intent::open(trader(), Quote::new(dec!(-1)), dec!(2), Side::Long);

        assert!(matches!(
            sender.send_intent(trader(), &intent, &mut transport),
            Err(RelayError::Codec(CodecError::Unrepresentable { .. }))
        ));
        assert_eq!(transport.pending(), 0);
    }
}
