//! Tiller Risk Manager
//!
//! Pre-trade risk checks for manually entered orders. The manager owns no
//! state: it reads an [`AccountSnapshot`](tiller_core::AccountSnapshot) and
//! the configured [`RiskLimits`] and returns a decision.
//!
//! ## Checks
//!
//! Applied in order, first failure wins:
//!
//! ```text
//!  proposed order ──► 0. range           every value below is representable
//!                     1. position limit   |current ± qty| × ref price ≤ max_position_size
//!                     2. risk per trade   qty × ref price ≤ pct% × portfolio value
//!                     3. funds            buy: quote available, sell: base available / long
//!                            │
//!                            ▼
//!                  Approve | Reject(reason + numbers)
//! ```
//!
//! The reference price is supplied by the caller (the order's own price for
//! limit orders, a fetched market price for market orders).
//!
//! ## Sizing
//!
//! [`sizing`] holds the stateless helpers used to suggest order sizes and
//! exit levels: risk-based position size, stop loss / take profit prices,
//! maximum quantity and exit triggers.

pub mod evaluate;
pub mod limits;
pub mod sizing;

// Re-export main types
pub use evaluate::{MarketContext, RejectReason, RiskDecision, RiskManager};
pub use limits::RiskLimits;
pub use sizing::{
    CloseReason, PositionRisk, check_position_risk, max_quantity, position_size, should_close,
    stop_loss_price, take_profit_price,
};
