//! HTTP API for event reservations and merchandise checkout.
//!
//! Routes delegate to the `commerce` services. Errors leave as JSON bodies
//! carrying a machine-readable `code`. Logs go through `tracing`, metrics
//! are exported for Prometheus.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use commerce::{CatalogService, CheckoutService, ReconciliationService, ReservationService};
use metrics_exporter_prometheus::PrometheusHandle;
use notify::Dispatcher;
use payments::PaymentGateways;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub reservations: ReservationService<S>,
    pub checkout: CheckoutService<S>,
    pub catalog: CatalogService<S>,
}

impl<S: Store + Clone> AppState<S> {
    /// Wires the services over one store. Notifications of every service go
    /// through `dispatcher`.
    pub fn new(store: S, gateways: PaymentGateways, dispatcher: Dispatcher) -> Self {
        let reconciler = ReconciliationService::new(store.clone(), dispatcher.clone());
        Self {
            reservations: ReservationService::new(store.clone(), dispatcher),
            checkout: CheckoutService::new(store.clone(), gateways, reconciler),
            catalog: CatalogService::new(store),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{admin, catalog, checkout, ops, reservations};

    let metrics_router = Router::new()
        .route("/metrics", get(ops::metrics))
        .with_state(metrics_handle);

    let admin_routes = Router::new()
        .route("/events", post(admin::create_event::<S>))
        .route("/events/{id}", patch(admin::update_event::<S>))
        .route(
            "/events/{id}/reservations",
            get(admin::list_reservations::<S>),
        )
        .route("/merch", post(admin::create_merch_item::<S>))
        .route("/merch/{id}", patch(admin::update_merch_item::<S>));

    Router::new()
        .route("/health", get(ops::health::<S>))
        .route("/reservations", post(reservations::create::<S>))
        .route("/events/{id}", get(catalog::get_event::<S>))
        .route("/merch/{id}", get(catalog::get_merch_item::<S>))
        .route("/orders/{id}", get(catalog::get_order::<S>))
        .route(
            "/checkout/{processor}/initialize",
            post(checkout::initialize::<S>),
        )
        .route("/checkout/{processor}/verify", post(checkout::verify::<S>))
        .nest("/admin", admin_routes)
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
