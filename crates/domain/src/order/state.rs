//! Order status machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Paid ──► Refunded
///           └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Placed from a cart, awaiting payment.
    #[default]
    Pending,

    /// Payment settled and stock decremented.
    Paid,

    /// Payment returned and stock restored (terminal state).
    Refunded,

    /// Abandoned before payment (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if a payment authorization can be attached in this status.
    pub fn can_attach_authorization(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be marked paid in this status.
    pub fn can_mark_paid(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be refunded in this status.
    pub fn can_refund(&self) -> bool {
        matches!(self, OrderStatus::Paid)
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Refunded | OrderStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Paid => "Paid",
            OrderStatus::Refunded => "Refunded",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Parses a status name produced by [`OrderStatus::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(OrderStatus::Pending),
            "Paid" => Some(OrderStatus::Paid),
            "Refunded" => Some(OrderStatus::Refunded),
            "Cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
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
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_pending_transitions() {
        let status = OrderStatus::Pending;
        assert!(status.can_attach_authorization());
        assert!(status.can_mark_paid());
        assert!(status.can_cancel());
        assert!(!status.can_refund());
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_paid_transitions() {
        let status = OrderStatus::Paid;
        assert!(!status.can_attach_authorization());
        assert!(!status.can_mark_paid());
        assert!(!status.can_cancel());
        assert!(status.can_refund());
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_terminal_statuses_allow_nothing() {
        for status in [OrderStatus::Refunded, OrderStatus::Cancelled] {
            assert!(status.is_terminal());
            assert!(!status.can_attach_authorization());
            assert!(!status.can_mark_paid());
            assert!(!status.can_cancel());
            assert!(!status.can_refund());
        }
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(OrderStatus::Paid.to_string(), "Paid");
        assert_eq!(OrderStatus::parse("Refunded"), Some(OrderStatus::Refunded));
        assert_eq!(OrderStatus::parse("Draft"), None);
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&OrderStatus::Cancelled).unwrap();
        assert_eq!(json, "\"Cancelled\"");
        let status: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, OrderStatus::Cancelled);
    }
}
