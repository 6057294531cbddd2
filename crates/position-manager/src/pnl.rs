//! Profit and loss

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tiller_core::{Position, Price};

/// Unrealized PnL of `position` if it were marked at `mark_price`.
///
/// `quantity * (mark - entry)`; the sign of the quantity handles shorts.
pub fn unrealized_pnl(position: &Position, mark_price: Price) -> Decimal {
    Position::pnl_at(position.quantity, position.entry_price, mark_price)
}

/// Aggregate view over the position table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub total_positions: usize,
    pub long_positions: usize,
    pub short_positions: usize,
    pub winning_positions: usize,
    pub losing_positions: usize,
    pub total_unrealized_pnl: Decimal,
    /// Sum of absolute notionals at mark
    pub total_notional: Decimal,
    /// Margin the exchange holds against open positions
    #[serde(default)]
    pub total_margin: Decimal,
}

impl PositionSummary {
    /// Summarize non-flat positions
    pub fn from_positions<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Self {
        positions
            .into_iter()
            .filter(|p| !p.is_flat())
            .fold(Self::default(), |mut s, p| {
                s.total_positions += 1;
                if p.is_long() {
                    s.long_positions += 1;
                } else {
                    s.short_positions += 1;
                }
                if p.unrealized_pnl > Decimal::ZERO {
                    s.winning_positions += 1;
                } else if p.unrealized_pnl < Decimal::ZERO {
                    s.losing_positions += 1;
                }
                s.total_unrealized_pnl = s.total_unrealized_pnl.saturating_add(p.unrealized_pnl);
                s.total_notional = s.total_notional.saturating_add(p.notional());
                s.total_margin = s.total_margin.saturating_add(p.margin);
                s
            })
    }
}
