//! Order message types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tiller_core::{Order, OrderStatus, OrderType, Price, Quantity, Side, Symbol, Timestamp};

/// Order submission request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Local order id, echoed back in remote reports for correlation
    pub client_order_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    /// Required for limit orders
    pub price: Option<Price>,
}

impl OrderRequest {
    /// Create a new limit order request
    pub fn limit(
        client_order_id: impl Into<String>,
        symbol: Symbol,
        side: Side,
        quantity: Quantity,
        price: Price,
    ) -> Self {
        Self {
            client_order_id: client_order_id.into(),
            symbol,
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
        }
    }

    /// Create a new market order request
    pub fn market(
        client_order_id: impl Into<String>,
        symbol: Symbol,
        side: Side,
        quantity: Quantity,
    ) -> Self {
        Self {
            client_order_id: client_order_id.into(),
            symbol,
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
        }
    }
}

impl From<&Order> for OrderRequest {
    fn from(order: &Order) -> Self {
        Self {
            client_order_id: order.id().to_string(),
            symbol: order.symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            quantity: order.quantity,
            price: order.price,
        }
    }
}

/// Order status as reported by the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteOrderStatus {
    /// Accepted and resting
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    /// Expired by the exchange (time in force); treated as cancelled
    Expired,
}

impl RemoteOrderStatus {
    /// Local lifecycle status this report corresponds to
    pub fn to_order_status(&self) -> OrderStatus {
        match self {
            Self::New => OrderStatus::Open,
            Self::PartiallyFilled => OrderStatus::PartiallyFilled,
            Self::Filled => OrderStatus::Filled,
            Self::Cancelled | Self::Expired => OrderStatus::Cancelled,
            Self::Rejected => OrderStatus::Rejected,
        }
    }

    /// Check if the order is terminal (no more updates expected)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Rejected | Self::Expired
        )
    }
}

/// Exchange acknowledgment of a placed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub exchange_order_id: String,
    pub status: RemoteOrderStatus,
    /// Cumulative filled quantity at acknowledgment time
    pub filled_quantity: Quantity,
    /// Average fill price (if any fills)
    pub avg_price: Option<Price>,
    pub timestamp: Option<Timestamp>,
}

impl OrderAck {
    /// Create an accepted (resting) acknowledgment
    pub fn accepted(exchange_order_id: impl Into<String>, timestamp: Option<Timestamp>) -> Self {
        Self {
            exchange_order_id: exchange_order_id.into(),
            status: RemoteOrderStatus::New,
            filled_quantity: Decimal::ZERO,
            avg_price: None,
            timestamp,
        }
    }
}

/// An order as listed by the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteOrder {
    pub exchange_order_id: String,
    /// Echo of `OrderRequest::client_order_id`, when the order came from us
    pub client_order_id: Option<String>,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    pub price: Option<Price>,
    pub status: RemoteOrderStatus,
    /// Exchange time of the last change, if the exchange reports one
    pub updated_at: Option<Timestamp>,
}
