//! Tiller Order Manager
//!
//! Turns user intent into exchange orders and keeps the local order table
//! consistent with the exchange:
//! - **Placement**: market, limit and tiered limit orders
//! - **Risk gating**: every order passes the pre-trade check before submission
//! - **Cancellation**: single order, whole symbol, or a price range
//! - **Reconciliation**: merges the exchange's order list into the local table
//!
//! ## Architecture
//!
//! ```text
//!  user intent ──► Order (Pending) ──► RiskManager::evaluate ──► Reject ──► Rejected
//!                                              │ Approve
//!                                              ▼
//!                                  ExchangeGateway::place_order
//!                                    │ ack          │ Network      │ Timeout     │ Auth/Rejected
//!                                    ▼              ▼              ▼             ▼
//!                              Open/Filled       Pending        Unknown       Rejected
//!                                                    └──── refresh_open_orders ────┘
//! ```
//!
//! ## Order lifecycle
//!
//! ```text
//! Pending ─► Open ─► PartiallyFilled ─► Filled
//!    │        │            │
//!    │        └────────────┴─► Cancelled
//!    ├─► Rejected
//!    └─► Unknown ─► Open | PartiallyFilled | Filled | Cancelled | Rejected
//! ```
//!
//! Open and partially filled orders go `Unknown` when the exchange stops
//! listing them; the same poll then looks each one up by exchange id. Bulk
//! cancels never touch `Unknown` orders.

pub mod config;
pub mod error;
pub mod manager;
pub mod reconcile;
pub mod tiers;

pub use config::OrderManagerConfig;
pub use error::{OrderError, Result};
pub use manager::{CancelReport, OrderManager, RiskContext, TierOutcome, TierReport};
pub use reconcile::RefreshReport;
pub use tiers::{Tier, generate_tiers, split_quantity, tier_prices};
