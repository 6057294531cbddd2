//! Error types for the gateway crate

use std::time::Duration;

use thiserror::Error;

/// Longest exchange-provided text ever shown to a user
const MAX_MESSAGE_LEN: usize = 200;

/// Failure category, used by callers to decide what the order state becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayErrorKind {
    Network,
    Auth,
    ExchangeRejected,
    Timeout,
}

impl GatewayErrorKind {
    /// Whether the outcome of the call is unknown (the exchange may or may
    /// not have acted on it)
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, GatewayErrorKind::Network | GatewayErrorKind::Timeout)
    }
}

/// Gateway-level errors (adapter operations)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Exchange rejected request: {0}")]
    ExchangeRejected(String),

    #[error("No response within {0:?}")]
    Timeout(Duration),
}

impl GatewayError {
    pub fn kind(&self) -> GatewayErrorKind {
        match self {
            GatewayError::Network(_) => GatewayErrorKind::Network,
            GatewayError::Auth(_) => GatewayErrorKind::Auth,
            GatewayError::ExchangeRejected(_) => GatewayErrorKind::ExchangeRejected,
            GatewayError::Timeout(_) => GatewayErrorKind::Timeout,
        }
    }

    /// Message safe to show a user: auth failures carry no detail (they may
    /// echo headers or key material), everything else is truncated.
    pub fn sanitized(&self) -> String {
        match self {
            GatewayError::Auth(_) => "authentication with the exchange failed".to_string(),
            GatewayError::Timeout(limit) => {
                format!("exchange did not respond within {}ms", limit.as_millis())
            }
            GatewayError::Network(msg) => format!("network error: {}", truncate(msg)),
            GatewayError::ExchangeRejected(msg) => {
                format!("exchange rejected request: {}", truncate(msg))
            }
        }
    }
}

fn truncate(msg: &str) -> String {
    if msg.chars().count() <= MAX_MESSAGE_LEN {
        return msg.to_string();
    }
    let mut out: String = msg.chars().take(MAX_MESSAGE_LEN).collect();
    out.push_str("...");
    out
}
