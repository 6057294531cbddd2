use thiserror::Error;

use crate::entities::OrderStatus;

/// Domain-level errors raised while building or mutating entities
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Invalid symbol '{0}': expected BASE_QUOTE")]
    InvalidSymbol(String),

    #[error("Invalid balance for {asset}: {reason}")]
    InvalidBalance { asset: String, reason: String },

    #[error("Illegal order status transition {from:?} -> {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Exchange order id already assigned: {existing} (got {incoming})")]
    ExchangeIdReassigned { existing: String, incoming: String },
}

impl DomainError {
    /// Errors that mean local state can no longer be trusted.
    ///
    /// Input validation problems are recoverable; a broken state machine or
    /// a second exchange id for the same order is not.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidTransition { .. } | DomainError::ExchangeIdReassigned { .. }
        )
    }
}

pub type DomainResult<T> = std::result::Result<T, DomainError>;
