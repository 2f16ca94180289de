//! External service traits and in-memory implementations for checkout.

pub mod catalog;
pub mod notifier;
pub mod payment;

pub use catalog::{Catalog, CatalogError, InMemoryCatalog};
pub use notifier::{
    LoggingNotifier, Notification, NotificationKind, Notifier, NotifyError, RecordingNotifier,
    render_order_summary,
};
pub use payment::{
    Authorization, AuthorizationRequest, AuthorizationStatus, GatewayError,
    InMemoryPaymentGateway, PaymentGateway, Refund, RefundRequest,
};
