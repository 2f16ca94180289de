//! Checkout orchestration for the bookstore.
//!
//! This crate turns an owner's active cart into a paid order:
//! 1. Validate the cart against the live catalog
//! 2. Snapshot it into a Pending order
//! 3. Create a payment authorization
//! 4. Settle stock and mark the order Paid once payment succeeds
//!
//! Settlement is shared by caller-driven confirmation and gateway webhooks and
//! is idempotent: duplicate success signals decrement stock once, mark the
//! order Paid once and send one confirmation. Refunds restore stock.
//! Partial stock changes are compensated in reverse when a later step fails.

pub mod cart_service;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod services;
pub mod webhook;

pub use cart_service::CartService;
pub use command::{CommandHandler, CommandResult, Repository};
pub use config::CheckoutConfig;
pub use coordinator::{CheckoutCoordinator, CheckoutSession, OrderSummary, WebhookOutcome};
pub use error::{CheckoutError, Result};
pub use services::{
    Authorization, AuthorizationRequest, AuthorizationStatus, Catalog, CatalogError,
    GatewayError, InMemoryCatalog, InMemoryPaymentGateway, LoggingNotifier, Notification,
    NotificationKind, Notifier, NotifyError, PaymentGateway, RecordingNotifier, Refund,
    RefundRequest,
};
pub use webhook::{
    PaymentEvent, PaymentEventKind, SIGNATURE_HEADER, WebhookConfig, WebhookError, WebhookVerifier,
    sign,
};
