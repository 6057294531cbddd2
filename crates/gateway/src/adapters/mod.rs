//! Exchange adapters
//!
//! Adapters implement [`crate::ExchangeGateway`] for a concrete venue.

pub mod paper;

pub use paper::{GatewayOp, MarketFillPolicy, PaperExchange};
