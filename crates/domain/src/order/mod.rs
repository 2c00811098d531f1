//! Order aggregate and related types.

mod aggregate;
mod line;
mod service;
mod state;

pub use aggregate::Order;
pub use line::OrderLine;
pub use service::CartService;
pub use state::{OrderStatus, UnknownOrderStatus};

use common::{OrderId, ProductId};
use thiserror::Error;

/// Errors raised by the order rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Order is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderStatus,
        action: &'static str,
    },

    /// The order has no line for the product.
    #[error("Line not found: product {product_id} in order {order_id}")]
    LineNotFound {
        order_id: OrderId,
        product_id: ProductId,
    },

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Checkout of an order with no lines.
    #[error("Order {order_id} has no lines")]
    EmptyOrder { order_id: OrderId },

    /// The order total no longer fits in a money amount.
    #[error("Order {order_id} total is too large")]
    TotalOverflow { order_id: OrderId },
}
