mod balance;
mod order;
mod order_status;
mod order_type;
mod position;
mod side;
mod tiered;

pub use balance::Balance;
pub use order::{Order, OrderId};
pub use order_status::OrderStatus;
pub use order_type::OrderType;
pub use position::Position;
pub use side::Side;
pub use tiered::{TierSizing, TieredOrderPlan};
