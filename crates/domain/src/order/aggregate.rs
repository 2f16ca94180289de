//! Order aggregate implementation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{CartId, OrderId, OwnerId, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::catalog::CatalogItem;
use crate::value_objects::{CartLine, ItemId, Money, OrderLine};

use super::{
    OrderError, OrderEvent, OrderNumber, OrderStatus,
    events::{
        AuthorizationAttachedData, OrderCancelledData, OrderPaidData, OrderPlacedData,
        OrderRefundedData,
    },
};

/// Order aggregate root.
///
/// An immutable snapshot of a cart's lines plus payment status. Lines and
/// total are frozen at placement; only status and payment metadata change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    id: Option<OrderId>,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    /// Human-facing unique number.
    order_number: Option<OrderNumber>,

    /// Owner who placed the order.
    owner_id: Option<OwnerId>,

    /// Cart the order was placed from.
    cart_id: Option<CartId>,

    /// Current status of the order.
    status: OrderStatus,

    /// Purchased lines.
    lines: Vec<OrderLine>,

    /// Sum of all line totals.
    total: Money,

    /// Latest payment authorization.
    authorization_id: Option<String>,

    /// Every authorization issued for the order, oldest first.
    #[serde(default)]
    authorization_ids: Vec<String>,

    /// Authorization whose payment settled the order.
    #[serde(default)]
    paid_authorization_id: Option<String>,

    /// Gateway refund identifier.
    refund_id: Option<String>,

    placed_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    refund_reason: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
}

impl Aggregate for Order {
    type Id = OrderId;
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<OrderId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::AuthorizationAttached(data) => self.apply_authorization_attached(data),
            OrderEvent::OrderPaid(data) => self.apply_order_paid(data),
            OrderEvent::OrderCancelled(data) => self.apply_order_cancelled(data),
            OrderEvent::OrderRefunded(data) => self.apply_order_refunded(data),
        }
    }
}

// Query methods
impl Order {
    /// Returns the order number.
    pub fn order_number(&self) -> Option<&OrderNumber> {
        self.order_number.as_ref()
    }

    /// Returns the owner ID.
    pub fn owner_id(&self) -> Option<OwnerId> {
        self.owner_id
    }

    /// Returns true if the order belongs to the given owner.
    pub fn is_owned_by(&self, owner_id: OwnerId) -> bool {
        self.owner_id == Some(owner_id)
    }

    /// Returns the source cart ID.
    pub fn cart_id(&self) -> Option<CartId> {
        self.cart_id
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the purchased lines.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Returns the total quantity of all lines.
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Returns the order total.
    pub fn total(&self) -> Money {
        self.total
    }

    /// Returns the latest payment authorization.
    pub fn authorization_id(&self) -> Option<&str> {
        self.authorization_id.as_deref()
    }

    /// Returns every authorization issued for the order, oldest first.
    pub fn authorization_ids(&self) -> &[String] {
        &self.authorization_ids
    }

    /// Returns true if `authorization_id` was issued for this order.
    pub fn has_authorization(&self, authorization_id: &str) -> bool {
        self.authorization_ids.iter().any(|id| id == authorization_id)
    }

    /// Returns the authorization whose payment settled the order.
    pub fn paid_authorization_id(&self) -> Option<&str> {
        self.paid_authorization_id.as_deref()
    }

    /// Returns the gateway refund identifier.
    pub fn refund_id(&self) -> Option<&str> {
        self.refund_id.as_deref()
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn refunded_at(&self) -> Option<DateTime<Utc>> {
        self.refunded_at
    }

    pub fn refund_reason(&self) -> Option<&str> {
        self.refund_reason.as_deref()
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    /// Returns true if the order is Pending.
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// Returns true if the order is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if the order lines are exactly the given cart lines.
    ///
    /// Compares item, quantity and captured unit price in order.
    pub fn matches_cart(&self, cart_lines: &[CartLine]) -> bool {
        self.lines.len() == cart_lines.len()
            && self.lines.iter().zip(cart_lines).all(|(o, c)| {
                o.item_id == c.item_id && o.quantity == c.quantity && o.unit_price == c.unit_price
            })
    }

    /// Checks that the order can be refunded.
    pub fn ensure_refundable(&self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Paid => Ok(()),
            OrderStatus::Refunded => Err(OrderError::AlreadyRefunded),
            current_status => Err(OrderError::InvalidStateTransition {
                current_status,
                action: "refund",
            }),
        }
    }

    /// Snapshots cart lines into order lines using catalog details.
    ///
    /// The unit price is the one captured in the cart.
    pub fn snapshot_lines(
        cart_lines: &[CartLine],
        catalog: &HashMap<ItemId, CatalogItem>,
    ) -> Result<Vec<OrderLine>, OrderError> {
        cart_lines
            .iter()
            .map(|line| {
                let item =
                    catalog
                        .get(&line.item_id)
                        .ok_or_else(|| OrderError::CatalogEntryMissing {
                            item_id: line.item_id.to_string(),
                        })?;
                Ok(OrderLine {
                    item_id: line.item_id.clone(),
                    title: item.title.clone(),
                    author: item.author.clone(),
                    isbn: item.isbn.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    line_total: line.line_total(),
                })
            })
            .collect()
    }
}

// Command methods (return events)
impl Order {
    /// Places a new pending order.
    pub fn place(
        &self,
        order_id: OrderId,
        order_number: OrderNumber,
        owner_id: OwnerId,
        cart_id: CartId,
        lines: Vec<OrderLine>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }

        if lines.is_empty() {
            return Err(OrderError::NoLines);
        }

        Ok(vec![OrderEvent::order_placed(
            order_id,
            order_number,
            owner_id,
            cart_id,
            lines,
        )])
    }

    /// Records a payment authorization as the latest one.
    ///
    /// Earlier authorizations stay attached so a payment made against any of
    /// them still settles the order.
    pub fn attach_authorization(
        &self,
        authorization_id: impl Into<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.status.can_attach_authorization() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action: "attach authorization",
            });
        }

        Ok(vec![OrderEvent::authorization_attached(
            authorization_id,
            self.authorization_id.clone(),
        )])
    }

    /// Marks the order paid by the payment on `authorization_id`.
    pub fn mark_paid(&self, authorization_id: &str) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.status.can_mark_paid() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action: "mark paid",
            });
        }

        if !self.has_authorization(authorization_id) {
            return Err(OrderError::UnknownAuthorization {
                authorization_id: authorization_id.to_string(),
            });
        }

        Ok(vec![OrderEvent::order_paid(Some(authorization_id.to_string()))])
    }

    /// Cancels a pending order.
    pub fn cancel(&self, reason: impl Into<String>) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.status.can_cancel() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action: "cancel",
            });
        }

        Ok(vec![OrderEvent::order_cancelled(reason)])
    }

    /// Marks a paid order refunded.
    pub fn refund(
        &self,
        refund_id: impl Into<String>,
        reason: Option<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_refundable()?;

        Ok(vec![OrderEvent::order_refunded(
            refund_id,
            reason,
            self.total,
        )])
    }
}

// Apply event helpers
impl Order {
    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.order_number = Some(data.order_number);
        self.owner_id = Some(data.owner_id);
        self.cart_id = Some(data.cart_id);
        self.status = OrderStatus::Pending;
        self.lines = data.lines;
        self.total = data.total;
        self.placed_at = Some(data.placed_at);
    }

    fn apply_authorization_attached(&mut self, data: AuthorizationAttachedData) {
        if let Some(previous) = data.previous_authorization_id {
            if !self.has_authorization(&previous) {
                self.authorization_ids.push(previous);
            }
        }
        if !self.has_authorization(&data.authorization_id) {
            self.authorization_ids.push(data.authorization_id.clone());
        }
        self.authorization_id = Some(data.authorization_id);
    }

    fn apply_order_paid(&mut self, data: OrderPaidData) {
        self.status = OrderStatus::Paid;
        self.paid_authorization_id = data.authorization_id;
        self.paid_at = Some(data.paid_at);
    }

    fn apply_order_cancelled(&mut self, data: OrderCancelledData) {
        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(data.cancelled_at);
        self.cancellation_reason = Some(data.reason);
    }

    fn apply_order_refunded(&mut self, data: OrderRefundedData) {
        self.status = OrderStatus::Refunded;
        self.refund_id = Some(data.refund_id);
        self.refund_reason = data.reason;
        self.refunded_at = Some(data.refunded_at);
    }
}
