use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, ServerConfig};
use crate::handlers::{
    change_order_status, confirm_order, health_check, issue_qr, scan, validate_cart,
};
use crate::state::AppState;

pub fn create_routes(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/cart/validate", post(validate_cart))
        .route("/api/orders/:id/confirm", post(confirm_order))
        .route("/api/orders/:id/status", post(change_order_status))
        .route("/api/checkin/scan", post(scan))
        .route("/api/tickets/:id/qr", post(issue_qr))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(server.production))
        .layer(create_cors_layer(&server.cors_allowed_origins))
}
