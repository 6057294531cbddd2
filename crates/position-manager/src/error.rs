use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tables kept by the position manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    Positions,
    Balances,
    Prices,
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Table::Positions => write!(f, "positions"),
            Table::Balances => write!(f, "balances"),
            Table::Prices => write!(f, "prices"),
        }
    }
}

/// Non-fatal warning: a refresh failed and the previous snapshot was kept
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{table} are stale: {cause}")]
pub struct StaleData {
    pub table: Table,
    /// Sanitized reason, safe to show to the user
    pub cause: String,
}

impl StaleData {
    pub fn new(table: Table, cause: impl Into<String>) -> Self {
        Self {
            table,
            cause: cause.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StaleData>;
