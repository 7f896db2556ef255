// perps-relay: pool-backed perpetual futures venue with a cross-chain intent relay.
// one market, one collateral token. LPs fund a pool that is the counterparty
// to every trader; intents sent on one chain execute against the market on another.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Address, ChainId, Side, Price, Quote, Shares, Leverage
//   2.x  custody.rs: collateral token ledger (mocked)
//   3.x  margin.rs: leverage bounds, notional, PnL, profit cap
//   4.x  position.rs: position struct, increase/reduce/add collateral
//   5.x  liquidity.rs: LP pool: shares, reservations, payouts
//   6.x  liquidation.rs: threshold check, liquidation price, reward split
//   7.x  config.rs: market params, relay trust, env presets
//   8.x  engine/: core engine: liquidity, positions, liquidations
//   9.x  price_feed.rs: oracle trait + mock feed
//   11.x events.rs: state transition events for audit
//   12.x intent.rs: fixed-width intent payload codec
//   13.x relay/: sender, receiver, in-memory transport (mocked)

// core trading modules
pub mod engine;
pub mod events;
pub mod liquidation;
pub mod margin;
pub mod position;
pub mod types;

// integration modules
pub mod config;
pub mod custody;
pub mod intent;
pub mod liquidity;
pub mod price_feed;
pub mod relay;

// re exports for convenience
pub use engine::*;
pub use events::*;
pub use liquidation::*;
pub use margin::*;
pub use position::*;
pub use types::*;
pub use config::{ConfigError, Environment, MarketParams, ReceiverConfig, RelayConfig, SenderConfig, VenueConfig};
pub use custody::{CustodyError, TokenLedger};
pub use intent::{decode_intent, encode_intent, CodecError, Intent, IntentAction, INTENT_LEN};
pub use liquidity::{LiquidityPool, PoolError};
pub use price_feed::{MockPriceFeed, OracleError, PriceOracle, PriceUpdate};
pub use relay::{
    InMemoryTransport, InboundMessage, IntentOutcome, IntentReceiver, IntentSender, MessageReceiver, OutboundMessage,
    RelayError, Transport, TransportError,
};
