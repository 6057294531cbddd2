//! Order Manager errors

use thiserror::Error;
use tiller_core::{DomainError, OrderId};
use tiller_gateway::GatewayError;
use tiller_risk_manager::RejectReason;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    /// Malformed input; nothing was sent to the exchange
    #[error("Invalid order: {0}")]
    Validation(String),

    /// Vetoed by the risk check; nothing was sent to the exchange
    #[error("Risk check failed: {0}")]
    RiskRejected(RejectReason),

    /// The gateway call failed. For `Network`/`Timeout` the order is left
    /// `Pending`/`Unknown` until the next reconciliation.
    #[error("Gateway call failed for order {order_id:?}: {source}")]
    Gateway {
        order_id: Option<OrderId>,
        #[source]
        source: GatewayError,
    },

    #[error("Order not found: {0}")]
    NotFound(String),

    /// Local order state is corrupt
    #[error("Order state invariant violated: {0}")]
    Invariant(DomainError),
}

impl OrderError {
    pub fn gateway(order_id: Option<OrderId>, source: GatewayError) -> Self {
        OrderError::Gateway { order_id, source }
    }
}

impl From<DomainError> for OrderError {
    fn from(e: DomainError) -> Self {
        if e.is_invariant_violation() {
            OrderError::Invariant(e)
        } else {
            OrderError::Validation(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, OrderError>;
