//! Order state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Cart ──checkout──► Completed
///   │
///   └──cancel / last line removed──► (deleted)
/// ```
///
/// There is no transition out of `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Open cart, lines can be added/changed/removed.
    #[default]
    Cart,

    /// Checked out (terminal state). Lines and totals are frozen.
    Completed,
}

impl OrderStatus {
    /// Returns true if lines can be modified in this state.
    pub fn can_modify_lines(&self) -> bool {
        matches!(self, OrderStatus::Cart)
    }

    /// Returns true if the order can be checked out in this state.
    pub fn can_checkout(&self) -> bool {
        matches!(self, OrderStatus::Cart)
    }

    /// Returns true if the order can be cancelled (deleted) in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Cart)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed)
    }

    /// Returns the status name as stored and displayed.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Cart => "CART",
            OrderStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a stored status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

impl std::str::FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CART" => Ok(OrderStatus::Cart),
            "COMPLETED" => Ok(OrderStatus::Completed),
            other => Err(UnknownOrderStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_cart() {
        assert_eq!(OrderStatus::default(), OrderStatus::Cart);
    }

    #[test]
    fn test_only_cart_is_mutable() {
        assert!(OrderStatus::Cart.can_modify_lines());
        assert!(!OrderStatus::Completed.can_modify_lines());
    }

    #[test]
    fn test_only_cart_can_checkout_or_cancel() {
        assert!(OrderStatus::Cart.can_checkout());
        assert!(OrderStatus::Cart.can_cancel());
        assert!(!OrderStatus::Completed.can_checkout());
        assert!(!OrderStatus::Completed.can_cancel());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::Cart.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
    }

    #[test]
    fn test_display_and_parse() {
        for status in [OrderStatus::Cart, OrderStatus::Completed] {
            assert_eq!(status.to_string().parse::<OrderStatus>(), Ok(status));
        }
        assert_eq!(
            "SHIPPED".parse::<OrderStatus>(),
            Err(UnknownOrderStatus("SHIPPED".to_string()))
        );
    }

    #[test]
    fn test_serializes_uppercase() {
        let json = serde_json::to_string(&OrderStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
    }
}
