//! HTTP host for the order-processing core.
//!
//! Exposes carts, checkout, order history, the product catalog and warranty
//! records over REST, with structured logging (tracing) and Prometheus
//! metrics. The caller's identity arrives in the `X-Customer-Id` header.

pub mod config;
pub mod discount_client;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{CartService, DiscountLookup, Repository, WarrantyService};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<R: Repository>(state: Arc<AppState<R>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/products", post(routes::products::create::<R>))
        .route("/products/{id}", get(routes::products::get::<R>))
        .route("/cart", get(routes::cart::get::<R>))
        .route("/cart/lines", post(routes::cart::add_line::<R>))
        .route("/orders", get(routes::orders::list::<R>))
        .route(
            "/orders/{id}",
            get(routes::orders::get::<R>).delete(routes::orders::cancel::<R>),
        )
        .route(
            "/orders/{id}/lines/{product_id}",
            put(routes::orders::update_line::<R>).delete(routes::orders::remove_line::<R>),
        )
        .route("/orders/{id}/checkout", post(routes::orders::checkout::<R>))
        .route("/warranties", post(routes::warranties::create::<R>))
        .route("/warranties/{id}", get(routes::warranties::get::<R>))
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

/// Creates the application state over a repository and a discount source.
pub fn create_state<R: Repository>(
    repository: R,
    discounts: Arc<dyn DiscountLookup>,
) -> Arc<AppState<R>> {
    Arc::new(AppState {
        carts: CartService::new(repository.clone(), discounts),
        warranties: WarrantyService::new(repository.clone()),
        repository,
    })
}
