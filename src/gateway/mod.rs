pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use anyhow::Context;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{internal_auth_middleware, jwt_auth_middleware};
use state::AppState;

/// Build the full gateway router
pub fn build_router(state: Arc<AppState>) -> Router {
    // Token-possession endpoints: the purchase id is the credential
    let purchase_routes = Router::new()
        .route("/purchases/{id}", get(handlers::get_purchase))
        .route(
            "/purchases/{id}/confirm-transfer",
            post(handlers::confirm_transfer),
        )
        .route(
            "/purchases/{id}/open-dispute",
            post(handlers::open_dispute),
        );

    // Seller endpoints: JWT, ownership checked in the coordinator
    let seller_routes = Router::new()
        .route(
            "/purchases/{id}/initiate-transfer",
            post(handlers::initiate_transfer),
        )
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    // Admin endpoints: JWT plus the admin claim
    let admin_routes = Router::new()
        .route(
            "/purchases/{id}/resolve-dispute",
            post(handlers::resolve_dispute),
        )
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    // Internal surface: payment-capture callback and sweep triggers
    let internal_routes = Router::new()
        .route("/payment-captured", post(handlers::payment_captured))
        .route(
            "/sweeps/seller-deadline",
            post(handlers::sweep_seller_deadline),
        )
        .route(
            "/sweeps/buyer-deadline",
            post(handlers::sweep_buyer_deadline),
        )
        .layer(from_fn_with_state(state.clone(), internal_auth_middleware));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/api/v1", purchase_routes)
        .nest("/api/v1", seller_routes)
        .nest("/api/v1/admin", admin_routes)
        .nest("/internal", internal_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Bind and serve the gateway
pub async fn run_server(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "Gateway listening");
    info!("API docs: http://{addr}/docs");

    axum::serve(listener, app)
        .await
        .context("gateway server error")
}
