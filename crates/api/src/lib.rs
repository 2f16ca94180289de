//! HTTP API server for the bookstore checkout service.
//!
//! Provides REST endpoints for the active cart, checkout, orders and payment
//! notifications, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod seed;
pub mod state;
pub mod sweeper;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, AppStore, Coordinator};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: AppStore>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let mut router = Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::carts::get::<S>))
        .route("/cart/summary", get(routes::carts::summary::<S>))
        .route("/cart/history", get(routes::carts::history::<S>))
        .route("/cart/validation", get(routes::carts::validation::<S>))
        .route(
            "/cart/lines",
            post(routes::carts::add_line::<S>).delete(routes::carts::clear::<S>),
        )
        .route(
            "/cart/lines/{item_id}",
            patch(routes::carts::update_line::<S>).delete(routes::carts::remove_line::<S>),
        )
        .route("/cart/abandon", post(routes::carts::abandon::<S>))
        .route("/checkout", post(routes::checkouts::initiate::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/summary", get(routes::orders::summary::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{id}/authorization",
            post(routes::orders::reissue_authorization::<S>),
        )
        .route("/orders/{id}/confirm", post(routes::orders::confirm::<S>))
        .route("/orders/{id}/refund", post(routes::orders::refund::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/webhooks/payments", post(routes::webhooks::payments::<S>));

    if state.dev_routes {
        router = router.route(
            "/dev/payments/{authorization_id}/{outcome}",
            post(routes::dev::set_payment_status::<S>),
        );
    }

    router
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
