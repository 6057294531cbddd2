//! Errors shown to the person at the terminal

use thiserror::Error;
use tiller_gateway::GatewayErrorKind;
use tiller_order_manager::OrderError;
use tiller_risk_manager::RejectReason;

use crate::command::ParseCommandError;

/// Every failure a command can end in. All variants except `Fatal` leave the
/// session usable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UserFacingError {
    /// Malformed input; nothing reached the exchange
    #[error("{0}")]
    Validation(String),

    /// Vetoed by the risk check; nothing reached the exchange
    #[error("Order rejected: {0}")]
    RiskRejected(RejectReason),

    /// Exchange call failed; `message` is already sanitized
    #[error("{message}")]
    Gateway {
        kind: GatewayErrorKind,
        message: String,
    },

    #[error("{0}")]
    NotFound(String),

    /// Local state is corrupt; the session refuses further commands
    #[error("Session halted: {0}")]
    Fatal(String),
}

impl UserFacingError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, UserFacingError::Fatal(_))
    }
}

impl From<OrderError> for UserFacingError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Validation(msg) => UserFacingError::Validation(msg),
            OrderError::RiskRejected(reason) => UserFacingError::RiskRejected(reason),
            OrderError::Gateway { order_id, source } => {
                let message = match order_id {
                    // Outcome unknown: the order stays tracked until reconciled
                    Some(id) if source.kind().is_indeterminate() => format!(
                        "{} (order {} will be checked on the next refresh)",
                        source.sanitized(),
                        id
                    ),
                    _ => source.sanitized(),
                };
                UserFacingError::Gateway {
                    kind: source.kind(),
                    message,
                }
            }
            OrderError::NotFound(id) => UserFacingError::NotFound(format!("no order {}", id)),
            OrderError::Invariant(e) => UserFacingError::Fatal(e.to_string()),
        }
    }
}

impl From<ParseCommandError> for UserFacingError {
    fn from(e: ParseCommandError) -> Self {
        UserFacingError::Validation(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UserFacingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tiller_core::{DomainError, OrderStatus};
    use tiller_gateway::GatewayError;
    use uuid::Uuid;

    #[test]
    fn test_gateway_errors_are_sanitized() {
        let err: UserFacingError = OrderError::gateway(
            None,
            GatewayError::Auth("secret=abc123 rejected".to_string()),
        )
        .into();
        assert!(!err.to_string().contains("abc123"));
        assert!(matches!(
            err,
            UserFacingError::Gateway {
                kind: GatewayErrorKind::Auth,
                ..
            }
        ));
    }

    #[test]
    fn test_timeout_mentions_reconciliation() {
        let id = Uuid::new_v4();
        let err: UserFacingError = OrderError::gateway(
            Some(id),
            GatewayError::Timeout(std::time::Duration::from_secs(10)),
        )
        .into();
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_invariant_is_fatal() {
        let err: UserFacingError = OrderError::Invariant(DomainError::InvalidTransition {
            from: OrderStatus::Filled,
            to: OrderStatus::Open,
        })
        .into();
        assert!(err.is_fatal());
    }
}
