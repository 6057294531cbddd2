use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderStatus, OrderType, Side};
use crate::error::{DomainError, DomainResult};
use crate::values::{Price, Quantity, Symbol, Timestamp};

/// Unique local identifier for an order
pub type OrderId = Uuid;

/// Full order details
///
/// The lifecycle fields (`id`, `status`, `filled_quantity`, exchange ids and
/// timestamps) are private: they only move through [`Order::transition`],
/// [`Order::acknowledge`] and [`Order::record_fill`] so the state machine
/// cannot be bypassed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    /// Present iff `order_type == Limit`
    pub price: Option<Price>,
    pub created_at: Timestamp,
    status: OrderStatus,
    filled_quantity: Quantity,
    exchange_order_id: Option<String>,
    updated_at: Timestamp,
    /// Exchange-reported time of the last applied remote update
    exchange_updated_at: Option<Timestamp>,
    reject_reason: Option<String>,
}

impl Order {
    /// Create a pending market order
    pub fn market(
        symbol: Symbol,
        side: Side,
        quantity: Quantity,
        timestamp: Timestamp,
    ) -> DomainResult<Self> {
        Self::validate_quantity(quantity)?;
        Ok(Self::new_unchecked(
            symbol,
            side,
            OrderType::Market,
            quantity,
            None,
            timestamp,
        ))
    }

    /// Create a pending limit order; the price is kept exactly as given
    pub fn limit(
        symbol: Symbol,
        side: Side,
        quantity: Quantity,
        price: Price,
        timestamp: Timestamp,
    ) -> DomainResult<Self> {
        Self::validate_quantity(quantity)?;
        if price <= Decimal::ZERO {
            return Err(DomainError::InvalidOrder(format!(
                "limit price must be positive, got {}",
                price
            )));
        }
        if quantity.checked_mul(price).is_none() {
            return Err(DomainError::InvalidOrder(format!(
                "order value {} x {} is out of range",
                quantity, price
            )));
        }
        Ok(Self::new_unchecked(
            symbol,
            side,
            OrderType::Limit,
            quantity,
            Some(price),
            timestamp,
        ))
    }

    fn validate_quantity(quantity: Quantity) -> DomainResult<()> {
        if quantity <= Decimal::ZERO {
            return Err(DomainError::InvalidOrder(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }
        Ok(())
    }

    fn new_unchecked(
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        quantity: Quantity,
        price: Option<Price>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol,
            side,
            order_type,
            quantity,
            price,
            created_at: timestamp,
            status: OrderStatus::Pending,
            filled_quantity: Decimal::ZERO,
            exchange_order_id: None,
            updated_at: timestamp,
            exchange_updated_at: None,
            reject_reason: None,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn filled_quantity(&self) -> Quantity {
        self.filled_quantity
    }

    pub fn exchange_order_id(&self) -> Option<&str> {
        self.exchange_order_id.as_deref()
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn exchange_updated_at(&self) -> Option<Timestamp> {
        self.exchange_updated_at
    }

    pub fn reject_reason(&self) -> Option<&str> {
        self.reject_reason.as_deref()
    }

    /// Returns remaining quantity to be filled
    pub fn remaining_quantity(&self) -> Quantity {
        (self.quantity - self.filled_quantity).max(Decimal::ZERO)
    }

    /// Filled share of the order in percent
    pub fn fill_percentage(&self) -> Decimal {
        if self.quantity.is_zero() {
            return Decimal::ZERO;
        }
        self.filled_quantity / self.quantity * Decimal::ONE_HUNDRED
    }

    /// Quote-currency value at the order's own price, if it has one
    pub fn notional(&self) -> Option<Decimal> {
        self.price.map(|p| p * self.quantity)
    }

    /// Move to `next`, enforcing the lifecycle.
    ///
    /// Returns `Ok(false)` when `next` equals the current status (nothing
    /// changed), except for `PartiallyFilled` which always counts as progress.
    pub fn transition(&mut self, next: OrderStatus, at: Timestamp) -> DomainResult<bool> {
        if self.status == next && next != OrderStatus::PartiallyFilled {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = at;
        Ok(true)
    }

    /// Record the exchange acknowledgment. The exchange id is assigned once;
    /// a repeat acknowledgment with the same id is a no-op.
    pub fn acknowledge(&mut self, exchange_order_id: &str, at: Timestamp) -> DomainResult<()> {
        match &self.exchange_order_id {
            Some(existing) if existing == exchange_order_id => Ok(()),
            Some(existing) => Err(DomainError::ExchangeIdReassigned {
                existing: existing.clone(),
                incoming: exchange_order_id.to_string(),
            }),
            None => {
                if matches!(self.status, OrderStatus::Pending | OrderStatus::Unknown) {
                    self.transition(OrderStatus::Open, at)?;
                }
                self.exchange_order_id = Some(exchange_order_id.to_string());
                self.updated_at = at;
                Ok(())
            }
        }
    }

    /// Apply a cumulative filled quantity reported by the exchange.
    ///
    /// Fill progress never goes backwards; a smaller report is ignored.
    /// Returns true if the order changed.
    pub fn record_fill(&mut self, cumulative_filled: Quantity, at: Timestamp) -> DomainResult<bool> {
        if cumulative_filled <= self.filled_quantity {
            return Ok(false);
        }
        let filled = cumulative_filled.min(self.quantity);
        let next = if filled >= self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.transition(next, at)?;
        self.filled_quantity = filled;
        Ok(true)
    }

    /// Mark rejected with a reason (risk veto, validation or exchange refusal)
    pub fn reject(&mut self, reason: impl Into<String>, at: Timestamp) -> DomainResult<()> {
        self.transition(OrderStatus::Rejected, at)?;
        self.reject_reason = Some(reason.into());
        Ok(())
    }

    pub fn set_exchange_updated_at(&mut self, at: Timestamp) {
        self.exchange_updated_at = Some(at);
    }

    /// Returns true if the order is completely filled
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}
