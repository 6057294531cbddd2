//! Tiller Gateway
//!
//! Boundary between the trading core and an exchange. Provides:
//! - The [`ExchangeGateway`] port the core consumes (placement, cancels,
//!   order/position/balance queries, market prices and precision)
//! - Wire message types for requests and remote reports
//! - A bounded-wait helper that turns slow calls into `Timeout`
//! - Exchange adapters (an in-memory paper exchange)
//!
//! ## Architecture
//!
//! ```text
//!  Order Manager    Position Manager
//!        │                 │
//!        └───────┬─────────┘
//!                │ ExchangeGateway (async, may fail transiently)
//!           ┌────▼────┐
//!           │ Adapter │  paper exchange / live REST client
//!           └────┬────┘
//!                │
//!            Exchange
//! ```
//!
//! Transport, authentication/signing and rate limiting live inside a live
//! adapter and never leak through the port.

pub mod adapters;
pub mod deadline;
pub mod error;
pub mod exchange;
pub mod messages;

// Re-export commonly used types
pub use adapters::paper::{GatewayOp, MarketFillPolicy, PaperExchange};
pub use deadline::with_deadline;
pub use error::{GatewayError, GatewayErrorKind};
pub use exchange::ExchangeGateway;
pub use messages::{
    account::{RemoteBalance, RemotePosition},
    market::MarketPrecision,
    order::{OrderAck, OrderRequest, RemoteOrder, RemoteOrderStatus},
};
