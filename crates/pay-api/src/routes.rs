//! # Routes
//!
//! Axum router configuration for the relay.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - GET  /health, GET / - Health check
/// - GET  /pay - HTML pay form (`?amount=` sets the default amount)
/// - POST /api/pay - Submit an STK push
/// - POST /callback - Provider payment-result callback
pub fn create_router(state: AppState) -> Router {
    // The form and API are called from arbitrary collaborator pages
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new().route("/pay", post(handlers::api_pay));

    Router::new()
        // Health check at root
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        // Collaborator-facing form
        .route("/pay", get(handlers::pay_form))
        // API
        .nest("/api", api_routes)
        // Provider callback (raw body, never rejected)
        .route("/callback", post(handlers::callback))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        // State
        .with_state(state)
}
