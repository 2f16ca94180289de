//! Cart status machine.

use serde::{Deserialize, Serialize};

/// The status of a cart in its lifecycle.
///
/// State transitions:
/// ```text
/// Active ──┬──► Settled
///          └──► Abandoned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CartStatus {
    /// The owner's working set; lines can be changed.
    #[default]
    Active,

    /// An order was paid from this cart (terminal state).
    Settled,

    /// The owner discarded the cart (terminal state).
    Abandoned,
}

impl CartStatus {
    /// Returns true if lines can be modified in this status.
    pub fn can_modify_lines(&self) -> bool {
        matches!(self, CartStatus::Active)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CartStatus::Settled | CartStatus::Abandoned)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CartStatus::Active => "Active",
            CartStatus::Settled => "Settled",
            CartStatus::Abandoned => "Abandoned",
        }
    }

    /// Parses a status name produced by [`CartStatus::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Active" => Some(CartStatus::Active),
            "Settled" => Some(CartStatus::Settled),
            "Abandoned" => Some(CartStatus::Abandoned),
            _ => None,
        }
    }
}

impl std::fmt::Display for CartStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_can_modify() {
        assert!(CartStatus::Active.can_modify_lines());
        assert!(!CartStatus::Settled.can_modify_lines());
        assert!(!CartStatus::Abandoned.can_modify_lines());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!CartStatus::Active.is_terminal());
        assert!(CartStatus::Settled.is_terminal());
        assert!(CartStatus::Abandoned.is_terminal());
    }

    #[test]
    fn test_parse_roundtrip() {
        for status in [CartStatus::Active, CartStatus::Settled, CartStatus::Abandoned] {
            assert_eq!(CartStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CartStatus::parse("Paid"), None);
    }
}
