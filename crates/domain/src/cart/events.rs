//! Cart domain events.

use chrono::{DateTime, Utc};
use common::{CartId, OrderId, OwnerId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{CartLine, ItemId};

/// Events that can occur on a cart aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    /// A new active cart was opened for an owner.
    CartOpened(CartOpenedData),

    /// A new line was added.
    LineAdded(LineAddedData),

    /// The quantity of an existing line changed.
    LineQuantityChanged(LineQuantityChangedData),

    /// A line was removed.
    LineRemoved(LineRemovedData),

    /// All lines were removed.
    CartCleared(CartClearedData),

    /// An order paid from this cart settled it.
    CartSettled(CartSettledData),

    /// The owner abandoned the cart.
    CartAbandoned(CartAbandonedData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "CartOpened",
            CartEvent::LineAdded(_) => "LineAdded",
            CartEvent::LineQuantityChanged(_) => "LineQuantityChanged",
            CartEvent::LineRemoved(_) => "LineRemoved",
            CartEvent::CartCleared(_) => "CartCleared",
            CartEvent::CartSettled(_) => "CartSettled",
            CartEvent::CartAbandoned(_) => "CartAbandoned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartOpenedData {
    pub cart_id: CartId,
    pub owner_id: OwnerId,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineAddedData {
    pub line: CartLine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineQuantityChangedData {
    pub item_id: ItemId,
    pub old_quantity: u32,
    pub new_quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRemovedData {
    pub item_id: ItemId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartClearedData {
    pub removed_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartSettledData {
    pub order_id: OrderId,
    pub settled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartAbandonedData {
    pub abandoned_at: DateTime<Utc>,
}

// Event constructors
impl CartEvent {
    pub fn cart_opened(cart_id: CartId, owner_id: OwnerId) -> Self {
        CartEvent::CartOpened(CartOpenedData {
            cart_id,
            owner_id,
            opened_at: Utc::now(),
        })
    }

    pub fn line_added(line: CartLine) -> Self {
        CartEvent::LineAdded(LineAddedData { line })
    }

    pub fn line_quantity_changed(item_id: ItemId, old_quantity: u32, new_quantity: u32) -> Self {
        CartEvent::LineQuantityChanged(LineQuantityChangedData {
            item_id,
            old_quantity,
            new_quantity,
        })
    }

    pub fn line_removed(item_id: ItemId) -> Self {
        CartEvent::LineRemoved(LineRemovedData { item_id })
    }

    pub fn cart_cleared(removed_lines: usize) -> Self {
        CartEvent::CartCleared(CartClearedData { removed_lines })
    }

    pub fn cart_settled(order_id: OrderId) -> Self {
        CartEvent::CartSettled(CartSettledData {
            order_id,
            settled_at: Utc::now(),
        })
    }

    pub fn cart_abandoned() -> Self {
        CartEvent::CartAbandoned(CartAbandonedData {
            abandoned_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::Money;

    #[test]
    fn test_event_types() {
        let line = CartLine::new("BOOK-1", 1, Money::from_cents(500));
        assert_eq!(CartEvent::line_added(line).event_type(), "LineAdded");
        assert_eq!(CartEvent::cart_cleared(2).event_type(), "CartCleared");
        assert_eq!(
            CartEvent::cart_settled(OrderId::new()).event_type(),
            "CartSettled"
        );
    }

    #[test]
    fn test_event_serialization_is_adjacently_tagged() {
        let event = CartEvent::line_removed(ItemId::new("BOOK-1"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "LineRemoved");
        assert_eq!(json["data"]["item_id"], "BOOK-1");
    }
}
