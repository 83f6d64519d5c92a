//! Order fulfillment state machine.

use serde::{Deserialize, Serialize};

/// The status of a customer order.
///
/// State transitions:
/// ```text
/// New ──► Submitted ──► InProcess ──┬──► Shipped
///                         ▲    │    ├──► Canceled
///                         │    ▼    │
///                       Backordered ◄┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// No cart has been submitted yet.
    #[default]
    New,

    /// Line items stored, waiting for the first wake-up.
    Submitted,

    /// A wake-up is removing stock for the line items.
    InProcess,

    /// At least one line item is short; retried on the next wake-up.
    Backordered,

    /// Every line item was fulfilled (terminal state).
    Shipped,

    /// An item was unknown to inventory (terminal state).
    Canceled,
}

impl OrderStatus {
    /// Returns true if a cart can be submitted in this state.
    pub fn can_submit(&self) -> bool {
        matches!(self, OrderStatus::New)
    }

    /// Returns true if a wake-up may start fulfilling in this state.
    ///
    /// `InProcess` is included: a wake-up that failed midway left it behind
    /// and the next one starts over.
    pub fn can_begin_fulfillment(&self) -> bool {
        matches!(
            self,
            OrderStatus::Submitted | OrderStatus::InProcess | OrderStatus::Backordered
        )
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Shipped | OrderStatus::Canceled)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "New",
            OrderStatus::Submitted => "Submitted",
            OrderStatus::InProcess => "InProcess",
            OrderStatus::Backordered => "Backordered",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Canceled => "Canceled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_new() {
        assert_eq!(OrderStatus::default(), OrderStatus::New);
    }

    #[test]
    fn test_only_new_can_submit() {
        assert!(OrderStatus::New.can_submit());
        assert!(!OrderStatus::Submitted.can_submit());
        assert!(!OrderStatus::Backordered.can_submit());
        assert!(!OrderStatus::Shipped.can_submit());
    }

    #[test]
    fn test_can_begin_fulfillment() {
        assert!(!OrderStatus::New.can_begin_fulfillment());
        assert!(OrderStatus::Submitted.can_begin_fulfillment());
        assert!(OrderStatus::InProcess.can_begin_fulfillment());
        assert!(OrderStatus::Backordered.can_begin_fulfillment());
        assert!(!OrderStatus::Shipped.can_begin_fulfillment());
        assert!(!OrderStatus::Canceled.can_begin_fulfillment());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::Submitted.is_terminal());
        assert!(!OrderStatus::InProcess.is_terminal());
        assert!(!OrderStatus::Backordered.is_terminal());
        assert!(OrderStatus::Shipped.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(OrderStatus::InProcess.to_string(), "InProcess");
        assert_eq!(OrderStatus::Backordered.to_string(), "Backordered");
        assert_eq!(OrderStatus::Canceled.to_string(), "Canceled");
    }

    #[test]
    fn test_serialization() {
        let status = OrderStatus::Backordered;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"Backordered\"");
        let deserialized: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, deserialized);
    }
}
