//! REST API routes configuration

use crate::api::handlers::{self, ApiError, ApiState};
use crate::api::websocket::ws_handler;
use axum::{
    http::{StatusCode, Uri},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};

/// JSON 404 for anything no route matches
async fn fallback_handler(uri: Uri) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError {
            error: format!("No route for {}", uri.path()),
            kind: None,
        }),
    )
}

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // WebSocket for real-time updates
        .route("/ws", get(ws_handler))
        // Transactions
        .route("/api/transactions", post(handlers::submit_transaction))
        .route("/api/transactions/pool", get(handlers::get_pool))
        .route("/api/transactions/{id}", get(handlers::get_transaction))
        .route("/api/signatures", post(handlers::submit_signature))
        // Blocks
        .route("/api/blocks", post(handlers::produce_block))
        // Accounts
        .route("/api/accounts/{address}", get(handlers::get_account))
        .route("/api/multisig/{address}", get(handlers::get_multisig))
        // Dapps
        .route("/api/dapps", get(handlers::list_dapps))
        .route("/api/dapps/{id}", get(handlers::get_dapp))
        .fallback(fallback_handler)
        // Add state and middleware
        .with_state(state)
        .layer(cors)
}
