use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Holdings of a single asset. All amounts are non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    asset: String,
    available: Decimal,
    locked: Decimal,
    staked: Decimal,
}

impl Balance {
    pub fn new(
        asset: impl Into<String>,
        available: Decimal,
        locked: Decimal,
        staked: Decimal,
    ) -> DomainResult<Self> {
        let asset = asset.into();
        for (name, value) in [("available", available), ("locked", locked), ("staked", staked)] {
            if value < Decimal::ZERO {
                return Err(DomainError::InvalidBalance {
                    asset,
                    reason: format!("{} is negative ({})", name, value),
                });
            }
        }
        Ok(Self {
            asset,
            available,
            locked,
            staked,
        })
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn available(&self) -> Decimal {
        self.available
    }

    pub fn locked(&self) -> Decimal {
        self.locked
    }

    pub fn staked(&self) -> Decimal {
        self.staked
    }

    /// Saturates at `Decimal::MAX`
    pub fn total(&self) -> Decimal {
        self.available
            .saturating_add(self.locked)
            .saturating_add(self.staked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_total() {
        let b = Balance::new("USDC", dec!(50), dec!(25), dec!(5)).unwrap();
        assert_eq!(b.total(), dec!(80));
        assert_eq!(b.asset(), "USDC");
    }

    #[test]
    fn test_negative_rejected() {
        let err = Balance::new("SOL", dec!(1), dec!(-0.1), dec!(0)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidBalance { .. }));
    }
}
