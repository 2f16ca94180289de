//! Shared application state.

use std::sync::Arc;

use checkout::{
    CheckoutCoordinator, InMemoryCatalog, InMemoryPaymentGateway, LoggingNotifier,
    WebhookVerifier,
};
use store::{CartStore, OrderStore};

use crate::config::Config;

/// Storage backends the server can run on.
pub trait AppStore: CartStore + OrderStore + Clone + 'static {}

impl<S> AppStore for S where S: CartStore + OrderStore + Clone + 'static {}

/// The coordinator wired with the collaborators the server uses.
pub type Coordinator<S> =
    CheckoutCoordinator<S, InMemoryCatalog, InMemoryPaymentGateway, LoggingNotifier>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: AppStore> {
    pub coordinator: Coordinator<S>,
    pub verifier: WebhookVerifier,
    /// Whether the payment simulation routes are mounted.
    pub dev_routes: bool,
}

impl<S: AppStore> AppState<S> {
    /// Builds the application state from configuration.
    pub fn from_config(store: S, catalog: InMemoryCatalog, config: &Config) -> Arc<Self> {
        Self::with_gateway(store, catalog, InMemoryPaymentGateway::new(), config)
    }

    /// Builds the application state around an existing payment gateway.
    pub fn with_gateway(
        store: S,
        catalog: InMemoryCatalog,
        gateway: InMemoryPaymentGateway,
        config: &Config,
    ) -> Arc<Self> {
        let coordinator = CheckoutCoordinator::new(
            store,
            catalog,
            gateway,
            LoggingNotifier::new(),
            config.checkout_config(),
        );

        Arc::new(Self {
            coordinator,
            verifier: WebhookVerifier::new(config.webhook_config()),
            dev_routes: !config.is_production(),
        })
    }
}
