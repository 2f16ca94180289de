//! Order domain events.

use chrono::{DateTime, Utc};
use common::{CartId, OrderId, OwnerId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{Money, OrderLine};

use super::OrderNumber;

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// A cart was snapshotted into a new pending order.
    OrderPlaced(OrderPlacedData),

    /// A payment authorization was created for the order.
    AuthorizationAttached(AuthorizationAttachedData),

    /// Payment settled.
    OrderPaid(OrderPaidData),

    /// The order was cancelled before payment.
    OrderCancelled(OrderCancelledData),

    /// Payment was refunded.
    OrderRefunded(OrderRefundedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::AuthorizationAttached(_) => "AuthorizationAttached",
            OrderEvent::OrderPaid(_) => "OrderPaid",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::OrderRefunded(_) => "OrderRefunded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub owner_id: OwnerId,
    pub cart_id: CartId,
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationAttachedData {
    pub authorization_id: String,
    pub previous_authorization_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaidData {
    pub authorization_id: Option<String>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRefundedData {
    pub refund_id: String,
    pub reason: Option<String>,
    pub amount: Money,
    pub refunded_at: DateTime<Utc>,
}

// Event constructors
impl OrderEvent {
    pub fn order_placed(
        order_id: OrderId,
        order_number: OrderNumber,
        owner_id: OwnerId,
        cart_id: CartId,
        lines: Vec<OrderLine>,
    ) -> Self {
        let total = lines.iter().map(|l| l.line_total).sum();
        OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            order_number,
            owner_id,
            cart_id,
            lines,
            total,
            placed_at: Utc::now(),
        })
    }

    pub fn authorization_attached(
        authorization_id: impl Into<String>,
        previous_authorization_id: Option<String>,
    ) -> Self {
        OrderEvent::AuthorizationAttached(AuthorizationAttachedData {
            authorization_id: authorization_id.into(),
            previous_authorization_id,
        })
    }

    pub fn order_paid(authorization_id: Option<String>) -> Self {
        OrderEvent::OrderPaid(OrderPaidData {
            authorization_id,
            paid_at: Utc::now(),
        })
    }

    pub fn order_cancelled(reason: impl Into<String>) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            reason: reason.into(),
            cancelled_at: Utc::now(),
        })
    }

    pub fn order_refunded(refund_id: impl Into<String>, reason: Option<String>, amount: Money) -> Self {
        OrderEvent::OrderRefunded(OrderRefundedData {
            refund_id: refund_id.into(),
            reason,
            amount,
            refunded_at: Utc::now(),
        })
    }
}
