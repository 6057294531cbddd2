//! Tiller Core Domain
//!
//! Pure domain types for the Tiller trading terminal.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod error;
pub mod snapshot;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    // Account state
    Balance,
    // Core trading entities
    Order,
    OrderId,
    OrderStatus,
    OrderType,
    Position,
    Side,
    // Tiered orders
    TierSizing,
    TieredOrderPlan,
};
pub use error::{DomainError, DomainResult};
pub use snapshot::AccountSnapshot;
pub use values::{Price, Quantity, Symbol, Timestamp};
