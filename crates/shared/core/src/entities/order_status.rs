use serde::{Deserialize, Serialize};

/// Order lifecycle status
///
/// ```text
/// Pending ──► Open ──► PartiallyFilled ──► Filled
///    │          │            │        └──► Cancelled
///    │          │            └──► Unknown
///    │          └──► Filled | Cancelled | Unknown
///    ├──► Rejected
///    └──► Unknown ──► Open | PartiallyFilled | Filled | Cancelled | Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created locally, not yet acknowledged by the exchange
    Pending,
    /// Resting on the exchange
    Open,
    /// Some quantity filled, remainder still resting
    PartiallyFilled,
    /// Completely filled
    Filled,
    /// Cancelled on the exchange
    Cancelled,
    /// Refused by risk checks, validation or the exchange
    Rejected,
    /// Outcome not known locally; resolved by the next reconciliation
    Unknown,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// Returns true if the order is resting on the exchange
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::PartiallyFilled)
    }

    /// Orders the exchange may still hold and which a cancel can target
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Open | OrderStatus::PartiallyFilled | OrderStatus::Unknown
        )
    }

    /// Whether `self -> next` is a legal step of the lifecycle.
    ///
    /// `PartiallyFilled -> PartiallyFilled` is legal (more fills arriving);
    /// every other self-transition is handled as a no-op by [`crate::Order`].
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Open | Rejected | Unknown) => true,
            (Open, PartiallyFilled | Filled | Cancelled | Unknown) => true,
            (PartiallyFilled, PartiallyFilled | Filled | Cancelled | Unknown) => true,
            (Unknown, Open | PartiallyFilled | Filled | Cancelled | Rejected) => true,
            _ => false,
        }
    }
}
