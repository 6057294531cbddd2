use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;
use crate::error::{DomainError, DomainResult};
use crate::values::{Price, Symbol};

/// How the total size of a tiered plan is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierSizing {
    /// Total base-asset quantity, split evenly across tiers
    Quantity(Decimal),
    /// Total quote-currency value, split evenly and converted at each tier price
    Notional(Decimal),
}

impl TierSizing {
    pub fn amount(&self) -> Decimal {
        match self {
            TierSizing::Quantity(q) => *q,
            TierSizing::Notional(v) => *v,
        }
    }
}

/// One trading intent split into `tier_count` limit orders across
/// `[price_low, price_high]`. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieredOrderPlan {
    pub symbol: Symbol,
    pub side: Side,
    pub sizing: TierSizing,
    pub price_low: Price,
    pub price_high: Price,
    pub tier_count: u32,
}

impl TieredOrderPlan {
    /// Most tiers one plan may generate
    pub const MAX_TIERS: u32 = 100;

    /// Plan sized by total base quantity
    pub fn by_quantity(
        symbol: Symbol,
        side: Side,
        total_quantity: Decimal,
        price_low: Price,
        price_high: Price,
        tier_count: u32,
    ) -> Self {
        Self {
            symbol,
            side,
            sizing: TierSizing::Quantity(total_quantity),
            price_low,
            price_high,
            tier_count,
        }
    }

    /// Plan sized by total quote value
    pub fn by_notional(
        symbol: Symbol,
        side: Side,
        total_value: Decimal,
        price_low: Price,
        price_high: Price,
        tier_count: u32,
    ) -> Self {
        Self {
            symbol,
            side,
            sizing: TierSizing::Notional(total_value),
            price_low,
            price_high,
            tier_count,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.tier_count == 0 {
            return Err(DomainError::InvalidOrder(
                "tier count must be at least 1".to_string(),
            ));
        }
        if self.tier_count > Self::MAX_TIERS {
            return Err(DomainError::InvalidOrder(format!(
                "tier count {} exceeds the maximum of {}",
                self.tier_count,
                Self::MAX_TIERS
            )));
        }
        if self.sizing.amount() <= Decimal::ZERO {
            return Err(DomainError::InvalidOrder(format!(
                "tiered total must be positive, got {}",
                self.sizing.amount()
            )));
        }
        if self.price_low <= Decimal::ZERO {
            return Err(DomainError::InvalidOrder(format!(
                "lower price must be positive, got {}",
                self.price_low
            )));
        }
        if self.price_low > self.price_high {
            return Err(DomainError::InvalidOrder(format!(
                "lower price {} is above upper price {}",
                self.price_low, self.price_high
            )));
        }
        Ok(())
    }
}
