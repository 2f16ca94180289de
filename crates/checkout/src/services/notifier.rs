//! Notification service trait and implementations.
//!
//! Notifications are best-effort: the coordinator spawns them after a
//! transition commits and only logs failures.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use domain::{Aggregate, Order};
use thiserror::Error;
use tokio::sync::Mutex;

/// Error returned by a notifier.
#[derive(Debug, Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    OrderConfirmation,
    RefundConfirmation,
}

/// Trait for sending order notifications to owners.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tells the owner their order is paid.
    async fn send_order_confirmation(&self, order: &Order) -> Result<(), NotifyError>;

    /// Tells the owner their order was refunded.
    async fn send_refund_confirmation(&self, order: &Order) -> Result<(), NotifyError>;
}

/// Renders a plain-text summary of an order.
pub fn render_order_summary(order: &Order) -> String {
    let mut text = String::new();
    let number = order.order_number().map_or("-", |n| n.as_str());
    let _ = writeln!(text, "Order {number} ({})", order.status());
    for line in order.lines() {
        let _ = writeln!(
            text,
            "  {} x {} @ {} = {}",
            line.quantity, line.title, line.unit_price, line.line_total
        );
    }
    let _ = write!(text, "Total: {}", order.total());
    text
}

/// Notifier that logs rendered summaries through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl LoggingNotifier {
    /// Creates a new logging notifier.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send_order_confirmation(&self, order: &Order) -> Result<(), NotifyError> {
        tracing::info!(
            order_id = ?order.id(),
            owner_id = ?order.owner_id(),
            summary = %render_order_summary(order),
            "order confirmation sent"
        );
        Ok(())
    }

    async fn send_refund_confirmation(&self, order: &Order) -> Result<(), NotifyError> {
        tracing::info!(
            order_id = ?order.id(),
            owner_id = ?order.owner_id(),
            reason = order.refund_reason().unwrap_or("-"),
            summary = %render_order_summary(order),
            "refund confirmation sent"
        );
        Ok(())
    }
}

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub order_id: Option<OrderId>,
}

#[derive(Debug, Default)]
struct RecordingState {
    sent: Vec<Notification>,
    fail: bool,
}

/// Notifier that records what it was asked to send, for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingNotifier {
    /// Creates a new recording notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail after recording the attempt.
    pub async fn set_fail(&self, fail: bool) {
        self.state.lock().await.fail = fail;
    }

    /// Returns every notification attempted so far.
    pub async fn sent(&self) -> Vec<Notification> {
        self.state.lock().await.sent.clone()
    }

    /// Returns how many notifications of a kind were attempted for an order.
    pub async fn count(&self, kind: NotificationKind, order_id: OrderId) -> usize {
        self.state
            .lock()
            .await
            .sent
            .iter()
            .filter(|n| n.kind == kind && n.order_id == Some(order_id))
            .count()
    }

    /// Waits until at least `expected` notifications were attempted.
    ///
    /// Returns false if `timeout` elapses first.
    pub async fn wait_for(&self, expected: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.state.lock().await.sent.len() >= expected {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn record(&self, kind: NotificationKind, order: &Order) -> Result<(), NotifyError> {
        let mut state = self.state.lock().await;
        state.sent.push(Notification {
            kind,
            order_id: order.id(),
        });
        if state.fail {
            return Err(NotifyError("recording notifier set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_order_confirmation(&self, order: &Order) -> Result<(), NotifyError> {
        self.record(NotificationKind::OrderConfirmation, order).await
    }

    async fn send_refund_confirmation(&self, order: &Order) -> Result<(), NotifyError> {
        self.record(NotificationKind::RefundConfirmation, order).await
    }
}
