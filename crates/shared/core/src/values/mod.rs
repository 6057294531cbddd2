use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Price value - uses Decimal for precision
pub type Price = Decimal;

/// Quantity value - uses Decimal for precision
pub type Quantity = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Tradable pair identifier in `BASE_QUOTE` form (e.g. `SOL_USDC`)
///
/// Immutable once created; orders and positions hold their own copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        let normalized = raw.trim().to_ascii_uppercase();
        match normalized.split_once('_') {
            Some((base, quote))
                if !base.is_empty()
                    && !quote.is_empty()
                    && !quote.contains('_')
                    && normalized.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
            {
                Ok(Self(normalized))
            }
            _ => Err(DomainError::InvalidSymbol(raw)),
        }
    }

    /// Build from explicit base and quote assets
    pub fn from_assets(base: &str, quote: &str) -> Result<Self, DomainError> {
        Self::new(format!("{}_{}", base, quote))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Asset being bought or sold
    pub fn base(&self) -> &str {
        self.0.split_once('_').map(|(b, _)| b).unwrap_or(&self.0)
    }

    /// Asset the pair is priced in
    pub fn quote(&self) -> &str {
        self.0.split_once('_').map(|(_, q)| q).unwrap_or("")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}
