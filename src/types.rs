// 1.0: all the primitives live here. nothing in the venue works without these types.
// addresses, chain ids, prices, amounts, shares, leverage, timestamps. each is a newtype
// so the compiler catches type mixups.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

// wire scales. in memory everything is Decimal, on the wire everything is a scaled integer.
pub const AMOUNT_DECIMALS: u32 = 18;
pub const LEVERAGE_DECIMALS: u32 = 6;
pub const PRICE_DECIMALS: u32 = 8;

/// A product or quotient that does not fit a Decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Arithmetic overflow")]
pub struct ArithmeticOverflow;

// decimal places a rust_decimal value can carry
const DECIMAL_MAX_SCALE: u32 = 28;

/// `a * b / c`. Multiplies first while the product is exact; otherwise divides
/// the larger operand first, which keeps large pools in range and keeps tiny
/// products from rounding away.
pub fn mul_div(a: Decimal, b: Decimal, c: Decimal) -> Result<Decimal, ArithmeticOverflow> {
    let exact = a.normalize().scale() + b.normalize().scale() <= DECIMAL_MAX_SCALE;
    let product = if exact { a.checked_mul(b) } else { None };
    let result = match product {
        Some(product) => product.checked_div(c),
        None => {
            let (large, small) = if a.abs() >= b.abs() { (a, b) } else { (b, a) };
            large.checked_div(c).and_then(|q| q.checked_mul(small))
        }
    };
    result.ok_or(ArithmeticOverflow)
}

/// 20-byte identity. traders, LPs, custody accounts, routers, relay contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    // handy for sims and tests: 0x000...00<n>
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix("0x").unwrap_or(s);
        if hex.len() != 40 {
            return Err(AddressParseError::InvalidLength(hex.len()));
        }
        if !hex.is_ascii() {
            return Err(AddressParseError::InvalidHex(hex.to_string()));
        }
        let mut bytes = [0u8; 20];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = &hex[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|_| AddressParseError::InvalidHex(pair.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("Address must be 40 hex chars, got {0}")]
    InvalidLength(usize),

    #[error("Invalid hex byte {0:?}")]
    InvalidHex(String),
}

/// Execution context a message comes from or goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain-{}", self.0)
    }
}

/// Transport-assigned id of one cross-chain message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => dec!(1),
            Side::Short => dec!(-1),
        }
    }

    pub fn from_is_long(is_long: bool) -> Self {
        if is_long {
            Side::Long
        } else {
            Side::Short
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Side::Long)
    }
}

// 1.1: price in quote currency per unit of base. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    // raw feed value, e.g. 2000e8 with PRICE_DECIMALS
    #[must_use]
    pub fn from_scaled(raw: u128, decimals: u32) -> Option<Self> {
        from_fixed(raw, decimals).and_then(Self::new)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: collateral currency amount. collateral, notional size, pnl, pool liquidity all use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote(Decimal);

impl Quote {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn add(&self, other: Quote) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: Quote) -> Self {
        Self(self.0 - other.0)
    }

    // settles at token precision like every on-chain amount.
    // only for factors in [0, 1]; anything larger goes through checked_mul
    pub fn mul(&self, factor: Decimal) -> Self {
        Self((self.0 * factor).round_dp(AMOUNT_DECIMALS))
    }

    pub fn checked_mul(&self, factor: Decimal) -> Result<Self, ArithmeticOverflow> {
        let product = self.0.checked_mul(factor).ok_or(ArithmeticOverflow)?;
        Ok(Self(product.round_dp(AMOUNT_DECIMALS)))
    }

    /// True when the amount is representable in the token's smallest unit.
    pub fn fits_token_precision(&self) -> bool {
        self.0.normalize().scale() <= AMOUNT_DECIMALS
    }

    pub fn negate(&self) -> Self {
        Self(-self.0)
    }

    pub fn min(&self, other: Quote) -> Self {
        Self(self.0.min(other.0))
    }

    pub fn max(&self, other: Quote) -> Self {
        Self(self.0.max(other.0))
    }

    // wei-style amount with AMOUNT_DECIMALS
    #[must_use]
    pub fn from_wad(raw: u128) -> Option<Self> {
        from_fixed(raw, AMOUNT_DECIMALS).map(Self)
    }

    #[must_use]
    pub fn to_wad(&self) -> Option<u128> {
        to_fixed(self.0, AMOUNT_DECIMALS)
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Quote {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quote {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Quote {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(q))
    }
}

impl<'a> Sum<&'a Quote> for Quote {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(*q))
    }
}

// 1.3: LP ownership units. minted on deposit, burned on withdraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Shares(Decimal);

impl Shares {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Shares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.4: validated leverage multiplier. bounds come from MarketParams, this only holds >= 1x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leverage(Decimal);

impl Leverage {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ONE {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

// 1.5: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn millis_since(&self, earlier: Timestamp) -> i64 {
        self.0 - earlier.0
    }
}

// 1.6: fixed-point conversions. fail instead of truncating.

/// Scales a non-negative decimal to an integer with `decimals` implied places.
/// Returns None for negative values, more precision than `decimals`, or overflow.
pub fn to_fixed(value: Decimal, decimals: u32) -> Option<u128> {
    if value.is_sign_negative() && !value.is_zero() {
        return None;
    }
    let normalized = value.normalize();
    let scale = normalized.scale();
    if scale > decimals {
        return None;
    }
    let mantissa = u128::try_from(normalized.mantissa()).ok()?;
    let factor = 10u128.checked_pow(decimals - scale)?;
    mantissa.checked_mul(factor)
}

/// Inverse of [`to_fixed`]. None if the value does not fit a Decimal.
/// Trailing zeros are folded into the scale first, so whole amounts well past
/// 2^96 raw units still decode.
pub fn from_fixed(raw: u128, decimals: u32) -> Option<Decimal> {
    let (mut mantissa, mut scale) = (raw, decimals);
    while scale > 0 && mantissa != 0 && mantissa % 10 == 0 {
        mantissa /= 10;
        scale -= 1;
    }
    let mantissa = i128::try_from(mantissa).ok()?;
    Decimal::try_from_i128_with_scale(mantissa, scale)
        .ok()
        .map(|d| d.normalize())
}
