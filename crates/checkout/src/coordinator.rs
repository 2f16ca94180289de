//! Checkout coordinator driving orders from cart to payment settlement.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use common::{CartId, OrderId, OwnerId};
use domain::{
    Aggregate, Cart, CatalogItem, CheckoutViolation, ItemId, Money, Order, OrderError,
    OrderLine, OrderNumber, OrderStatus,
};
use serde::Serialize;
use store::{CartStore, ORDER_NUMBER_CONSTRAINT, OrderStore, StoreError};

use crate::cart_service::CartService;
use crate::command::CommandHandler;
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::services::{
    AuthorizationRequest, AuthorizationStatus, Catalog, CatalogError, GatewayError, Notifier,
    PaymentGateway, RefundRequest,
};
use crate::webhook::{PaymentEvent, PaymentEventKind};

/// What the caller needs to collect payment for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub authorization_id: String,
    pub client_secret: String,
    pub total: Money,
    /// True if an existing pending order was reused.
    pub reused: bool,
}

/// Result of handling a payment notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// This notification settled the order.
    Settled { order_id: OrderId },
    /// The order was already settled; nothing changed.
    AlreadySettled { order_id: OrderId },
    /// The failed payment cancelled the order.
    Cancelled { order_id: OrderId },
    /// Acknowledged without any effect.
    Ignored { reason: &'static str },
}

/// Counts and spend over an owner's orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OrderSummary {
    pub total_orders: usize,
    /// Sum of the totals of Paid orders.
    pub total_spent: Money,
    pub pending: usize,
    pub paid: usize,
    pub refunded: usize,
    pub cancelled: usize,
}

impl OrderSummary {
    fn from_orders(orders: &[Order]) -> Self {
        let mut summary = OrderSummary {
            total_orders: orders.len(),
            ..OrderSummary::default()
        };
        for order in orders {
            match order.status() {
                OrderStatus::Pending => summary.pending += 1,
                OrderStatus::Paid => {
                    summary.paid += 1;
                    summary.total_spent += order.total();
                }
                OrderStatus::Refunded => summary.refunded += 1,
                OrderStatus::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Copy)]
enum StockMove {
    Take,
    Return,
}

impl StockMove {
    fn inverse(self) -> Self {
        match self {
            StockMove::Take => StockMove::Return,
            StockMove::Return => StockMove::Take,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            StockMove::Take => "take",
            StockMove::Return => "return",
        }
    }
}

/// What the gateway reports across every authorization of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PaymentState {
    /// A payment succeeded on this authorization.
    Succeeded(String),
    /// A payment is still being processed.
    Processing,
    /// Nothing was paid; carries the latest known status.
    Unpaid(AuthorizationStatus),
}

type OrderNumberGenerator = Arc<dyn Fn() -> OrderNumber + Send + Sync>;

fn require_id<A: Aggregate>(aggregate: &A) -> Result<A::Id> {
    aggregate.id().ok_or_else(|| {
        StoreError::Uninitialized {
            aggregate_type: A::aggregate_type(),
        }
        .into()
    })
}

/// Orchestrates checkout, payment confirmation, settlement and refunds.
///
/// Settlement is shared by caller-driven confirmation and payment webhooks:
/// stock for every line is taken, then the order is marked Paid with a
/// version-checked write. Whoever loses that write returns the stock it took,
/// so any number of success signals decrement stock once, mark the order
/// Paid once and send one confirmation.
pub struct CheckoutCoordinator<S, C, P, N>
where
    S: CartStore + OrderStore,
    C: Catalog,
    P: PaymentGateway,
    N: Notifier,
{
    carts: CartService<S, C>,
    orders: CommandHandler<S, Order>,
    gateway: P,
    notifier: Arc<N>,
    config: CheckoutConfig,
    order_numbers: OrderNumberGenerator,
}

impl<S, C, P, N> CheckoutCoordinator<S, C, P, N>
where
    S: CartStore + OrderStore + Clone,
    C: Catalog,
    P: PaymentGateway,
    N: Notifier + 'static,
{
    /// Creates a new checkout coordinator.
    pub fn new(store: S, catalog: C, gateway: P, notifier: N, config: CheckoutConfig) -> Self {
        Self {
            carts: CartService::new(store.clone(), catalog, config.clone()),
            orders: CommandHandler::new(store),
            gateway,
            notifier: Arc::new(notifier),
            config,
            order_numbers: Arc::new(OrderNumber::generate),
        }
    }

    /// Replaces the order number generator.
    pub fn with_order_number_generator(
        mut self,
        generator: impl Fn() -> OrderNumber + Send + Sync + 'static,
    ) -> Self {
        self.order_numbers = Arc::new(generator);
        self
    }

    /// Returns the cart service.
    pub fn carts(&self) -> &CartService<S, C> {
        &self.carts
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &C {
        self.carts.catalog()
    }

    /// Returns the payment gateway.
    pub fn gateway(&self) -> &P {
        &self.gateway
    }

    /// Returns the coordinator settings.
    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    fn store(&self) -> &S {
        self.orders.repository()
    }

    /// Turns the owner's Active cart into a Pending order awaiting payment.
    ///
    /// A Pending order already placed from the same cart with identical lines
    /// is reused with a fresh authorization; Pending orders with different
    /// lines are cancelled as superseded.
    #[tracing::instrument(skip(self))]
    pub async fn initiate_checkout(&self, owner_id: OwnerId) -> Result<CheckoutSession> {
        metrics::counter!("checkout_initiated_total").increment(1);

        let cart = self
            .carts
            .find_active(owner_id)
            .await?
            .ok_or_else(|| CheckoutError::CheckoutBlocked {
                violations: vec![CheckoutViolation::EmptyCart],
            })?;
        let cart_id = require_id(&cart)?;

        let items = self.carts.catalog_snapshot(&cart).await?;
        let violations = cart.checkout_violations(&items, self.config.price_drift_epsilon);
        if !violations.is_empty() {
            tracing::info!(count = violations.len(), "checkout blocked");
            return Err(CheckoutError::CheckoutBlocked { violations });
        }

        let mut reusable = None;
        for pending in self.store().find_pending_for_cart(cart_id).await? {
            if reusable.is_none() && pending.matches_cart(cart.lines()) {
                reusable = Some(pending);
            } else {
                self.cancel_superseded(pending).await?;
            }
        }

        let (order, reused) = match reusable {
            Some(order) => (order, true),
            None => (self.place_order(owner_id, cart_id, &cart, &items).await?, false),
        };

        self.authorize(order, reused).await
    }

    async fn cancel_superseded(&self, order: Order) -> Result<()> {
        let order_id = order.id();
        match self.orders.execute_on(order, |o| o.cancel("superseded")).await {
            Ok(_) => {
                metrics::counter!("orders_cancelled_total", "reason" => "superseded").increment(1);
                tracing::info!(?order_id, "superseded pending order cancelled");
                Ok(())
            }
            Err(e) if e.is_concurrency_conflict() => {
                tracing::warn!(?order_id, "superseded order changed concurrently, skipping");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn place_order(
        &self,
        owner_id: OwnerId,
        cart_id: CartId,
        cart: &Cart,
        items: &HashMap<ItemId, CatalogItem>,
    ) -> Result<Order> {
        let lines = Order::snapshot_lines(cart.lines(), items)?;
        let attempts = self.config.order_number_attempts;

        for attempt in 1..=attempts {
            let order_number = (self.order_numbers)();
            let lines = lines.clone();
            match self
                .orders
                .create(|order| order.place(OrderId::new(), order_number, owner_id, cart_id, lines))
                .await
            {
                Ok(result) => {
                    tracing::info!(
                        order_id = ?result.aggregate.id(),
                        total = %result.aggregate.total(),
                        "order placed"
                    );
                    return Ok(result.aggregate);
                }
                Err(CheckoutError::Store(e)) if e.is_unique_violation(ORDER_NUMBER_CONSTRAINT) => {
                    tracing::warn!(attempt, "order number collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        Err(CheckoutError::OrderNumberExhausted { attempts })
    }

    async fn authorize(&self, order: Order, reused: bool) -> Result<CheckoutSession> {
        let order_id = require_id(&order)?;
        let order_number = order
            .order_number()
            .cloned()
            .ok_or(StoreError::Uninitialized {
                aggregate_type: Order::aggregate_type(),
            })?;
        let total = order.total();

        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), order_id.to_string());
        metadata.insert("order_number".to_string(), order_number.to_string());
        if let Some(owner_id) = order.owner_id() {
            metadata.insert("owner_id".to_string(), owner_id.to_string());
        }

        let request = AuthorizationRequest {
            amount: total,
            currency: self.config.currency.clone(),
            metadata,
        };
        let authorization = self
            .call_gateway("authorize", self.gateway.create_authorization(request))
            .await?;

        let authorization_id = authorization.authorization_id.clone();
        self.orders
            .execute(order_id, |o| o.attach_authorization(authorization_id))
            .await?;

        tracing::info!(
            ?order_id,
            authorization_id = %authorization.authorization_id,
            reused,
            "payment authorization created"
        );

        Ok(CheckoutSession {
            order_id,
            order_number,
            authorization_id: authorization.authorization_id,
            client_secret: authorization.client_secret,
            total,
            reused,
        })
    }

    async fn call_gateway<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = std::result::Result<T, GatewayError>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.gateway_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!(operation, "payment gateway call timed out");
                Err(CheckoutError::GatewayTimeout { operation })
            }
        }
    }

    /// Creates a fresh payment authorization for a Pending order.
    #[tracing::instrument(skip(self))]
    pub async fn reissue_authorization(
        &self,
        owner_id: OwnerId,
        order_id: OrderId,
    ) -> Result<CheckoutSession> {
        let order = self.get_order(owner_id, order_id).await?;
        if !order.is_pending() {
            return Err(OrderError::InvalidStateTransition {
                current_status: order.status(),
                action: "reissue authorization",
            }
            .into());
        }

        self.authorize(order, true).await
    }

    /// Confirms payment for an order after the caller completed it.
    ///
    /// The gateway is asked about every authorization issued for the order;
    /// a succeeded payment on any of them settles the order. An order that is
    /// already Paid is returned unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(&self, owner_id: OwnerId, order_id: OrderId) -> Result<Order> {
        let order = self.get_order(owner_id, order_id).await?;
        match order.status() {
            OrderStatus::Paid => return Ok(order),
            OrderStatus::Pending => {}
            current_status => {
                return Err(OrderError::InvalidStateTransition {
                    current_status,
                    action: "confirm payment",
                }
                .into());
            }
        }

        if order.authorization_ids().is_empty() {
            return Err(CheckoutError::MissingAuthorization);
        }

        let authorization_id = match self.payment_state(&order).await? {
            PaymentState::Succeeded(authorization_id) => authorization_id,
            PaymentState::Processing => {
                let status = AuthorizationStatus::Processing;
                tracing::info!(?order_id, %status, "payment not completed");
                return Err(CheckoutError::PaymentNotCompleted { status });
            }
            PaymentState::Unpaid(status) => {
                tracing::info!(?order_id, %status, "payment not completed");
                return Err(CheckoutError::PaymentNotCompleted { status });
            }
        };

        let (order, _) = self.settle(order, &authorization_id).await?;
        match order.status() {
            OrderStatus::Paid => Ok(order),
            current_status => Err(OrderError::InvalidStateTransition {
                current_status,
                action: "confirm payment",
            }
            .into()),
        }
    }

    /// Asks the gateway about the order's authorizations, newest first.
    ///
    /// Authorizations the gateway does not know count as unpaid.
    async fn payment_state(&self, order: &Order) -> Result<PaymentState> {
        let mut processing = false;
        let mut latest = None;

        for authorization_id in order.authorization_ids().iter().rev() {
            let status = match self
                .call_gateway(
                    "get_authorization",
                    self.gateway.get_authorization(authorization_id),
                )
                .await
            {
                Ok(status) => status,
                Err(CheckoutError::Gateway(GatewayError::NotFound(_))) => {
                    tracing::warn!(%authorization_id, "gateway does not know authorization");
                    continue;
                }
                Err(e) => return Err(e),
            };

            match status {
                AuthorizationStatus::Succeeded => {
                    return Ok(PaymentState::Succeeded(authorization_id.clone()));
                }
                AuthorizationStatus::Processing => processing = true,
                _ => {}
            }
            latest.get_or_insert(status);
        }

        Ok(if processing {
            PaymentState::Processing
        } else {
            PaymentState::Unpaid(latest.unwrap_or(AuthorizationStatus::RequiresPayment))
        })
    }

    /// Takes stock and marks the order Paid by `authorization_id`.
    ///
    /// Returns the order and whether this call performed the transition.
    async fn settle(&self, mut order: Order, authorization_id: &str) -> Result<(Order, bool)> {
        let start = std::time::Instant::now();
        let order_id = require_id(&order)?;

        for _ in 0..self.config.settle_attempts {
            if !order.is_pending() {
                return Ok((order, false));
            }

            if let Err(e) = self.move_stock(order.lines(), StockMove::Take).await {
                let current = self.orders.load_existing(order_id).await?;
                if !current.is_pending() {
                    return Ok((current, false));
                }
                return Err(e);
            }

            match self
                .orders
                .execute_on(order.clone(), |o| o.mark_paid(authorization_id))
                .await
            {
                Ok(result) => {
                    let paid = result.aggregate;
                    metrics::counter!("orders_paid_total").increment(1);
                    metrics::histogram!("checkout_settle_duration_seconds")
                        .record(start.elapsed().as_secs_f64());
                    tracing::info!(?order_id, authorization_id, total = %paid.total(), "order paid");

                    self.settle_cart(&paid).await;
                    self.spawn_order_confirmation(paid.clone());
                    return Ok((paid, true));
                }
                Err(e) => {
                    self.undo_stock(order.lines(), StockMove::Take).await;
                    if !e.is_concurrency_conflict() {
                        return Err(e);
                    }
                    tracing::debug!(?order_id, "lost settlement race, reloading");
                    order = self.orders.load_existing(order_id).await?;
                }
            }
        }

        if !order.is_pending() {
            return Ok((order, false));
        }
        Err(CheckoutError::SettlementContention)
    }

    /// Marks the cart an order was placed from as Settled.
    ///
    /// Skipped if the cart is no longer Active. Failures are logged only.
    async fn settle_cart(&self, order: &Order) {
        let (Some(order_id), Some(cart_id)) = (order.id(), order.cart_id()) else {
            return;
        };

        for _ in 0..self.config.active_cart_attempts {
            let result = self
                .carts
                .handler()
                .execute(cart_id, |cart| {
                    if cart.is_active() {
                        cart.settle(order_id)
                    } else {
                        Ok(vec![])
                    }
                })
                .await;

            match result {
                Ok(_) => return,
                Err(e) if e.is_concurrency_conflict() => continue,
                Err(e) => {
                    tracing::warn!(?cart_id, error = %e, "failed to settle cart");
                    return;
                }
            }
        }
        tracing::warn!(?cart_id, "cart kept changing, left unsettled");
    }

    async fn apply_move(&self, line: &OrderLine, direction: StockMove) -> std::result::Result<u32, CatalogError> {
        let catalog = self.carts.catalog();
        match direction {
            StockMove::Take => catalog.decrement_stock(&line.item_id, line.quantity).await,
            StockMove::Return => catalog.increment_stock(&line.item_id, line.quantity).await,
        }
    }

    /// Moves stock for every line, undoing earlier lines if one fails.
    async fn move_stock(&self, lines: &[OrderLine], direction: StockMove) -> Result<()> {
        for (index, line) in lines.iter().enumerate() {
            if let Err(e) = self.apply_move(line, direction).await {
                tracing::warn!(
                    item_id = %line.item_id,
                    direction = direction.as_str(),
                    error = %e,
                    "stock change failed"
                );
                self.undo_stock(&lines[..index], direction).await;
                return Err(match (direction, e) {
                    (
                        StockMove::Take,
                        CatalogError::InsufficientStock { .. } | CatalogError::ItemNotFound { .. },
                    ) => CheckoutError::StockChanged {
                        item_id: line.item_id.to_string(),
                    },
                    (_, e) => e.into(),
                });
            }
        }
        Ok(())
    }

    /// Reverses a stock move, newest line first. Failures are logged only.
    async fn undo_stock(&self, lines: &[OrderLine], direction: StockMove) {
        for line in lines.iter().rev() {
            metrics::counter!("stock_compensations_total", "direction" => direction.inverse().as_str())
                .increment(1);
            if let Err(e) = self.apply_move(line, direction.inverse()).await {
                tracing::error!(
                    item_id = %line.item_id,
                    quantity = line.quantity,
                    error = %e,
                    "stock compensation failed"
                );
            }
        }
    }

    fn spawn_order_confirmation(&self, order: Order) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.send_order_confirmation(&order).await {
                tracing::warn!(order_id = ?order.id(), error = %e, "order confirmation failed");
            }
        });
    }

    fn spawn_refund_confirmation(&self, order: Order) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.send_refund_confirmation(&order).await {
                tracing::warn!(order_id = ?order.id(), error = %e, "refund confirmation failed");
            }
        });
    }

    /// Applies a verified payment notification.
    ///
    /// Unknown event types and authorizations are acknowledged and ignored.
    /// A stock conflict during settlement is returned so the gateway
    /// redelivers the notification.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.id, kind = event.kind.label()))]
    pub async fn handle_payment_event(&self, event: PaymentEvent) -> Result<WebhookOutcome> {
        metrics::counter!("webhook_events_total", "type" => event.kind.label()).increment(1);

        if let PaymentEventKind::Other(event_type) = &event.kind {
            tracing::debug!(%event_type, "ignoring payment event");
            return Ok(WebhookOutcome::Ignored {
                reason: "unhandled event type",
            });
        }

        let Some(authorization_id) = event.authorization_id.as_deref() else {
            return Ok(WebhookOutcome::Ignored {
                reason: "missing authorization id",
            });
        };

        let Some(order) = self.store().find_by_authorization(authorization_id).await? else {
            tracing::info!(authorization_id, "payment event for unknown authorization");
            return Ok(WebhookOutcome::Ignored {
                reason: "unknown authorization",
            });
        };
        let order_id = require_id(&order)?;

        match event.kind {
            PaymentEventKind::PaymentSucceeded => {
                if order.status() == OrderStatus::Paid {
                    return Ok(WebhookOutcome::AlreadySettled { order_id });
                }
                if !order.is_pending() {
                    return Ok(WebhookOutcome::Ignored {
                        reason: "order not pending",
                    });
                }

                let (order, settled_here) = self.settle(order, authorization_id).await?;
                Ok(match (settled_here, order.status()) {
                    (true, _) => WebhookOutcome::Settled { order_id },
                    (false, OrderStatus::Paid) => WebhookOutcome::AlreadySettled { order_id },
                    (false, _) => WebhookOutcome::Ignored {
                        reason: "order not pending",
                    },
                })
            }
            PaymentEventKind::PaymentFailed => {
                let result = self
                    .orders
                    .execute(order_id, |o| {
                        if o.is_pending() {
                            o.cancel("payment failed")
                        } else {
                            Ok(vec![])
                        }
                    })
                    .await?;

                if result.is_noop() {
                    return Ok(WebhookOutcome::Ignored {
                        reason: "order not pending",
                    });
                }
                metrics::counter!("orders_cancelled_total", "reason" => "payment_failed")
                    .increment(1);
                tracing::info!(?order_id, "order cancelled after failed payment");
                Ok(WebhookOutcome::Cancelled { order_id })
            }
            PaymentEventKind::Other(_) => Ok(WebhookOutcome::Ignored {
                reason: "unhandled event type",
            }),
        }
    }

    /// Refunds a Paid order and restores its stock.
    ///
    /// The gateway refund is idempotent per order, so a refund that failed
    /// after the gateway call can be retried safely.
    #[tracing::instrument(skip(self))]
    pub async fn refund(
        &self,
        owner_id: OwnerId,
        order_id: OrderId,
        reason: Option<String>,
    ) -> Result<Order> {
        let order = self.get_order(owner_id, order_id).await?;
        order.ensure_refundable()?;

        let authorization_id = order
            .paid_authorization_id()
            .or(order.authorization_id())
            .ok_or(CheckoutError::MissingAuthorization)?
            .to_string();
        let request = RefundRequest {
            authorization_id,
            amount: Some(order.total()),
            reason: reason.clone(),
            idempotency_key: format!("refund:{order_id}"),
        };
        let refund = self
            .call_gateway("refund", self.gateway.create_refund(request))
            .await?;

        self.move_stock(order.lines(), StockMove::Return).await?;

        let refund_id = refund.refund_id.clone();
        match self
            .orders
            .execute_on(order.clone(), |o| o.refund(refund_id, reason))
            .await
        {
            Ok(result) => {
                let refunded = result.aggregate;
                metrics::counter!("orders_refunded_total").increment(1);
                tracing::info!(?order_id, refund_id = %refund.refund_id, "order refunded");
                self.spawn_refund_confirmation(refunded.clone());
                Ok(refunded)
            }
            Err(e) => {
                self.undo_stock(order.lines(), StockMove::Return).await;
                if e.is_concurrency_conflict() {
                    let current = self.orders.load_existing(order_id).await?;
                    if current.status() == OrderStatus::Refunded {
                        return Err(OrderError::AlreadyRefunded.into());
                    }
                }
                Err(e)
            }
        }
    }

    /// Cancels a Pending order on the owner's request.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, owner_id: OwnerId, order_id: OrderId) -> Result<Order> {
        let order = self.get_order(owner_id, order_id).await?;
        let result = self
            .orders
            .execute_on(order, |o| o.cancel("cancelled by owner"))
            .await?;

        metrics::counter!("orders_cancelled_total", "reason" => "owner").increment(1);
        tracing::info!(?order_id, "order cancelled");
        Ok(result.aggregate)
    }

    /// Cancels Pending orders placed more than the configured TTL before `now`.
    ///
    /// The gateway is asked first: an order with a succeeded payment is
    /// settled instead, and one whose payment is still processing or cannot
    /// be checked is left for the next sweep. Returns how many orders were
    /// expired. Orders that change concurrently are also left for the next
    /// sweep.
    #[tracing::instrument(skip(self))]
    pub async fn expire_stale_orders(&self, now: DateTime<Utc>) -> Result<usize> {
        let Ok(ttl) = TimeDelta::from_std(self.config.pending_order_ttl) else {
            return Ok(0);
        };
        let Some(cutoff) = now.checked_sub_signed(ttl) else {
            return Ok(0);
        };

        let mut expired = 0;
        for order in self.store().list_pending_before(cutoff).await? {
            let order_id = order.id();
            if !order.authorization_ids().is_empty() {
                match self.payment_state(&order).await {
                    Ok(PaymentState::Unpaid(_)) => {}
                    Ok(PaymentState::Processing) => {
                        tracing::debug!(?order_id, "payment processing, not expiring");
                        continue;
                    }
                    Ok(PaymentState::Succeeded(authorization_id)) => {
                        match self.settle(order, &authorization_id).await {
                            Ok((_, true)) => {
                                tracing::info!(?order_id, "stale order was paid, settled instead")
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::warn!(?order_id, error = %e, "failed to settle paid stale order")
                            }
                        }
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(?order_id, error = %e, "payment status unknown, not expiring");
                        continue;
                    }
                }
            }

            match self.orders.execute_on(order, |o| o.cancel("expired")).await {
                Ok(_) => {
                    expired += 1;
                    metrics::counter!("orders_cancelled_total", "reason" => "expired")
                        .increment(1);
                }
                Err(e) if e.is_concurrency_conflict() => {
                    tracing::debug!(?order_id, "order changed during expiry, skipping");
                }
                Err(e) => {
                    tracing::warn!(?order_id, error = %e, "failed to expire order");
                }
            }
        }

        if expired > 0 {
            tracing::info!(expired, "expired stale pending orders");
        }
        Ok(expired)
    }

    /// Loads an order owned by `owner_id`.
    pub async fn get_order(&self, owner_id: OwnerId, order_id: OrderId) -> Result<Order> {
        let order = self.orders.load_existing(order_id).await?;
        if !order.is_owned_by(owner_id) {
            return Err(CheckoutError::PermissionDenied);
        }
        Ok(order)
    }

    /// Lists the owner's orders, newest first.
    pub async fn list_orders(&self, owner_id: OwnerId) -> Result<Vec<Order>> {
        Ok(self.store().list_orders(owner_id).await?)
    }

    /// Summarizes the owner's orders.
    pub async fn order_summary(&self, owner_id: OwnerId) -> Result<OrderSummary> {
        let orders = self.list_orders(owner_id).await?;
        Ok(OrderSummary::from_orders(&orders))
    }
}
