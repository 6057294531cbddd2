//! Risk limits supplied by configuration

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Read-only limits consulted by every pre-trade check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Maximum absolute position notional per symbol, in quote currency
    pub max_position_size: Decimal,
    /// Maximum single-order notional as a percentage (0-100] of portfolio value
    pub risk_percentage_per_trade: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size: dec!(1000),
            risk_percentage_per_trade: dec!(50),
        }
    }
}

impl RiskLimits {
    pub fn new(max_position_size: Decimal, risk_percentage_per_trade: Decimal) -> Self {
        Self {
            max_position_size,
            risk_percentage_per_trade,
        }
    }

    /// Per-trade budget in quote currency for a given portfolio value.
    /// Saturates instead of overflowing on extreme valuations.
    pub fn risk_budget(&self, portfolio_value: Decimal) -> Decimal {
        portfolio_value.saturating_mul(self.risk_percentage_per_trade / Decimal::ONE_HUNDRED)
    }
}
