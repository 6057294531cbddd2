//! Position and balance reports

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tiller_core::{Balance, DomainError, Position, Price, Quantity, Symbol};

/// A position as reported by the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePosition {
    pub symbol: Symbol,
    /// Signed: positive = long, negative = short
    pub quantity: Quantity,
    pub entry_price: Price,
    /// Exchange mark price, when provided
    pub mark_price: Option<Price>,
    /// Collateral held against the position (margin markets only)
    #[serde(default)]
    pub margin: Decimal,
    #[serde(default)]
    pub liquidation_price: Option<Price>,
}

impl RemotePosition {
    /// Build the domain position, marking at `fallback_mark` when the
    /// exchange gave no mark price (and at entry when neither is known)
    pub fn into_position(self, fallback_mark: Option<Price>) -> Position {
        let mark = self
            .mark_price
            .or(fallback_mark)
            .unwrap_or(self.entry_price);
        Position::new(self.symbol, self.quantity, self.entry_price, mark)
            .with_margin(self.margin, self.liquidation_price)
    }
}

/// A balance as reported by the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBalance {
    pub asset: String,
    pub available: Decimal,
    pub locked: Decimal,
    #[serde(default)]
    pub staked: Decimal,
}

impl TryFrom<RemoteBalance> for Balance {
    type Error = DomainError;

    fn try_from(remote: RemoteBalance) -> Result<Self, Self::Error> {
        Balance::new(remote.asset, remote.available, remote.locked, remote.staked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_position_mark_fallbacks() {
        let remote = RemotePosition {
            symbol: Symbol::new("SOL_USDC").unwrap(),
            quantity: dec!(2),
            entry_price: dec!(100),
            mark_price: None,
            margin: dec!(0),
            liquidation_price: None,
        };
        let pos = remote.clone().into_position(Some(dec!(110)));
        assert_eq!(pos.mark_price, dec!(110));
        assert_eq!(pos.unrealized_pnl, dec!(20));

        let pos = remote.into_position(None);
        assert_eq!(pos.mark_price, dec!(100));
        assert_eq!(pos.unrealized_pnl, dec!(0));
    }

    #[test]
    fn test_margin_fields_default_when_absent() {
        let remote: RemotePosition = serde_json::from_str(
            r#"{"symbol": "SOL_USDC", "quantity": "-2", "entry_price": "100", "mark_price": "95"}"#,
        )
        .unwrap();
        assert_eq!(remote.margin, dec!(0));
        assert!(remote.liquidation_price.is_none());

        let remote = RemotePosition {
            margin: dec!(50),
            liquidation_price: Some(dec!(140)),
            ..remote
        };
        let pos = remote.into_position(None);
        assert_eq!(pos.margin, dec!(50));
        assert_eq!(pos.liquidation_price, Some(dec!(140)));
    }

    #[test]
    fn test_negative_balance_refused() {
        let remote = RemoteBalance {
            asset: "USDC".to_string(),
            available: dec!(-1),
            locked: dec!(0),
            staked: dec!(0),
        };
        assert!(Balance::try_from(remote).is_err());
    }
}
