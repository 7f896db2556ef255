// 12.0 intent.rs: trading instruction <-> fixed 46-byte payload.
// pure and stateless. decode never hands back a defaulted intent.
//
// layout (little endian):
//   0    1  action tag    0 open, 1 close, 2 increase, 3 decrease, 4 add collateral
//   1   20  trader        raw address bytes
//   21  16  amount        u128, AMOUNT_DECIMALS
//   37   8  leverage      u64, LEVERAGE_DECIMALS
//   45   1  is_long       0 or 1
//
// amount is the collateral delta for open/increase/add collateral, the size
// delta for decrease, zero for close.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{from_fixed, to_fixed, Address, Quote, Side, AMOUNT_DECIMALS, LEVERAGE_DECIMALS};

pub const INTENT_LEN: usize = 46;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentAction {
    Open,
    Close,
    Increase,
    Decrease,
    AddCollateral,
}

impl IntentAction {
    pub const ALL: [IntentAction; 5] = [
        IntentAction::Open,
        IntentAction::Close,
        IntentAction::Increase,
        IntentAction::Decrease,
        IntentAction::AddCollateral,
    ];

    pub fn tag(&self) -> u8 {
        match self {
            IntentAction::Open => 0,
            IntentAction::Close => 1,
            IntentAction::Increase => 2,
            IntentAction::Decrease => 3,
            IntentAction::AddCollateral => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.tag() == tag)
    }
}

impl fmt::Display for IntentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntentAction::Open => "open",
            IntentAction::Close => "close",
            IntentAction::Increase => "increase",
            IntentAction::Decrease => "decrease",
            IntentAction::AddCollateral => "add_collateral",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid intent length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Unknown action tag {0}")]
    UnknownAction(u8),

    #[error("Invalid direction flag {0}")]
    InvalidFlag(u8),

    #[error("Value out of range: {0}")]
    ValueOutOfRange(&'static str),

    #[error("Cannot encode {field} = {value} as fixed point")]
    Unrepresentable { field: &'static str, value: Decimal },
}

/// One trading instruction. `leverage` is the raw requested multiplier; the engine
/// validates it, so an out-of-range value still travels and fails at execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub trader: Address,
    pub action: IntentAction,
    pub amount: Quote,
    pub leverage: Decimal,
    pub side: Side,
}

impl Intent {
    pub fn open(trader: Address, collateral: Quote, leverage: Decimal, side: Side) -> Self {
        Self {
            trader,
            action: IntentAction::Open,
            amount: collateral,
            leverage,
            side,
        }
    }

    pub fn increase(trader: Address, collateral: Quote, leverage: Decimal) -> Self {
        Self {
            trader,
            action: IntentAction::Increase,
            amount: collateral,
            leverage,
            side: Side::Long,
        }
    }

    pub fn decrease(trader: Address, size_delta: Quote) -> Self {
        Self {
            trader,
            action: IntentAction::Decrease,
            amount: size_delta,
            leverage: Decimal::ZERO,
            side: Side::Long,
        }
    }

    pub fn add_collateral(trader: Address, amount: Quote) -> Self {
        Self {
            trader,
            action: IntentAction::AddCollateral,
            amount,
            leverage: Decimal::ZERO,
            side: Side::Long,
        }
    }

    pub fn close(trader: Address) -> Self {
        Self {
            trader,
            action: IntentAction::Close,
            amount: Quote::zero(),
            leverage: Decimal::ZERO,
            side: Side::Long,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        encode_intent(self.trader, self.action, self.amount, self.leverage, self.side.is_long())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        decode_intent(bytes)
    }
}

pub fn encode_intent(
    trader: Address,
    action: IntentAction,
    amount: Quote,
    leverage: Decimal,
    is_long: bool,
) -> Result<Vec<u8>, CodecError> {
    let raw_amount = to_fixed(amount.value(), AMOUNT_DECIMALS).ok_or(CodecError::Unrepresentable {
        field: "amount",
        value: amount.value(),
    })?;
    let raw_leverage = to_fixed(leverage, LEVERAGE_DECIMALS)
        .and_then(|raw| u64::try_from(raw).ok())
        .ok_or(CodecError::Unrepresentable {
            field: "leverage",
            value: leverage,
        })?;

    let mut out = Vec::with_capacity(INTENT_LEN);
    out.push(action.tag());
    out.extend_from_slice(trader.as_bytes());
    out.extend_from_slice(&raw_amount.to_le_bytes());
    out.extend_from_slice(&raw_leverage.to_le_bytes());
    out.push(u8::from(is_long));
    Ok(out)
}

pub fn decode_intent(bytes: &[u8]) -> Result<Intent, CodecError> {
    if bytes.len() != INTENT_LEN {
        return Err(CodecError::InvalidLength {
            expected: INTENT_LEN,
            actual: bytes.len(),
        });
    }
    let truncated = CodecError::InvalidLength {
        expected: INTENT_LEN,
        actual: bytes.len(),
    };

    let mut rest = bytes;
    let tag = read_u8(&mut rest).ok_or_else(|| truncated.clone())?;
    let action = IntentAction::from_tag(tag).ok_or(CodecError::UnknownAction(tag))?;
    let trader = Address(read_array::<20>(&mut rest).ok_or_else(|| truncated.clone())?);
    let raw_amount = u128::from_le_bytes(read_array::<16>(&mut rest).ok_or_else(|| truncated.clone())?);
    let raw_leverage = u64::from_le_bytes(read_array::<8>(&mut rest).ok_or_else(|| truncated.clone())?);
    let flag = read_u8(&mut rest).ok_or(truncated)?;

    let is_long = match flag {
        0 => false,
        1 => true,
        other => return Err(CodecError::InvalidFlag(other)),
    };
    let amount = from_fixed(raw_amount, AMOUNT_DECIMALS).ok_or(CodecError::ValueOutOfRange("amount"))?;
    let leverage =
        from_fixed(u128::from(raw_leverage), LEVERAGE_DECIMALS).ok_or(CodecError::ValueOutOfRange("leverage"))?;

    Ok(Intent {
        trader,
        action,
        amount: Quote::new(amount),
        leverage,
        side: Side::from_is_long(is_long),
    })
}

fn read_u8(input: &mut &[u8]) -> Option<u8> {
    let (&val, rest) = input.split_first()?;
    *input = rest;
    Some(val)
}

fn read_array<const N: usize>(input: &mut &[u8]) -> Option<[u8; N]> {
    if input.len() < N {
        return None;
    }
    let (bytes, rest) = input.split_at(N);
    *input = rest;
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trader() -> Address {
        Address::from_low_u64(0xabcdef)
    }

    #[test]
    fn layout_is_fixed() {
        let bytes = Intent::open(trader(), Quote::new(dec!(100)), dec!(2), Side::Long)
            .encode()
            .unwrap();

        assert_eq!(bytes.len(), INTENT_LEN);
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..21], trader().as_bytes());
        assert_eq!(u128::from_le_bytes(bytes[21..37].try_into().unwrap()), 100 * 10u128.pow(18));
        assert_eq!(u64::from_le_bytes(bytes[37..45].try_into().unwrap()), 2_000_000);
        assert_eq!(bytes[45], 1);
    }

    #[test]
    fn round_trip_every_action() {
        let intents = [
            Intent::open(trader(), Quote::new(dec!(100.5)), dec!(3.25), Side::Short),
            Intent::close(trader()),
            Intent::increase(trader(), Quote::new(dec!(0.000000000000000001)), dec!(10)),
            Intent::decrease(trader(), Quote::new(dec!(42))),
            Intent::add_collateral(trader(), Quote::new(dec!(7))),
        ];
        for intent in intents {
            let decoded = Intent::decode(&intent.encode().unwrap()).unwrap();
            assert_eq!(decoded, intent);
        }
    }

    #[test]
    fn wrong_length_rejected() {
        let bytes = Intent::close(trader()).encode().unwrap();
        assert_eq!(
            decode_intent(&bytes[..45]),
            Err(CodecError::InvalidLength { expected: 46, actual: 45 })
        );
        let mut long = bytes.clone();
        long.push(0);
        assert!(matches!(decode_intent(&long), Err(CodecError::InvalidLength { .. })));
        assert!(matches!(decode_intent(&[]), Err(CodecError::InvalidLength { .. })));
    }

    #[test]
    fn unknown_tag_and_flag_rejected() {
        let mut bytes = Intent::close(trader()).encode().unwrap();
        bytes[0] = 5;
        assert_eq!(decode_intent(&bytes), Err(CodecError::UnknownAction(5)));

        let mut bytes = Intent::close(trader()).encode().unwrap();
        bytes[45] = 2;
        assert_eq!(decode_intent(&bytes), Err(CodecError::InvalidFlag(2)));
    }

    #[test]
    fn oversized_amount_rejected() {
        let mut bytes = Intent::close(trader()).encode().unwrap();
        bytes[21..37].copy_from_slice(&u128::MAX.to_le_bytes());
        assert_eq!(decode_intent(&bytes), Err(CodecError::ValueOutOfRange("amount")));
    }

    #[test]
    fn large_whole_amount_round_trips() {
        // 1e29 raw units on the wire
        let intent = Intent::add_collateral(trader(), Quote::new(dec!(100_000_000_000)));
        let bytes = intent.encode().unwrap();
        assert_eq!(u128::from_le_bytes(bytes[21..37].try_into().unwrap()), 10u128.pow(29));
        assert_eq!(decode_intent(&bytes), Ok(intent));
    }

    #[test]
    fn unrepresentable_values_rejected() {
        let negative = Intent::open(trader(), Quote::new(dec!(-1)), dec!(2), Side::Long);
        assert!(matches!(negative.encode(), Err(CodecError::Unrepresentable { field: "amount", .. })));

        let too_precise = Intent::open(trader(), Quote::new(dec!(1)), dec!(2.0000001), Side::Long);
        assert!(matches!(too_precise.encode(), Err(CodecError::Unrepresentable { field: "leverage", .. })));
    }

    #[test]
    fn out_of_range_leverage_still_encodes() {
        // the engine rejects 20x, not the codec
        let intent = Intent::open(trader(), Quote::new(dec!(100)), dec!(20), Side::Long);
        let decoded = Intent::decode(&intent.encode().unwrap()).unwrap();
        assert_eq!(decoded.leverage, dec!(20));
    }
}
