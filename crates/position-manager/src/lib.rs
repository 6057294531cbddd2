//! Tiller Position Manager
//!
//! Owns the local view of what the account holds:
//!
//! - **Positions**: per-symbol position snapshot, replaced wholesale on refresh
//! - **Balances**: per-asset balance snapshot, replaced wholesale on refresh
//! - **Prices**: last known market price per symbol, used for marks and valuation
//!
//! ## Refresh policy
//!
//! ```text
//!  Gateway ──► refresh_positions ──► ok:  replace table, clear stale flag
//!                                ├─► ok, issued before the current table: dropped
//!                                └─► err: keep table,    set stale flag, StaleData
//! ```
//!
//! A failed poll never empties a table. Readers take a copy-on-read
//! [`AccountSnapshot`](tiller_core::AccountSnapshot) so a risk decision and the
//! submission that follows see the same numbers.
//!
//! Each table has its own lock; a balance refresh never blocks a position read.

pub mod error;
pub mod manager;
pub mod pnl;

pub use error::{StaleData, Table};
pub use manager::{PositionManager, Staleness};
pub use pnl::{PositionSummary, unrealized_pnl};
