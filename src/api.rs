//! HTTP ingress
//!
//! A single webhook endpoint receives OHLC bars and feeds the dispatcher.
//! Deployed behind a trusted ingress; no authentication here.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::types::{AppState, Bar};

/// POST /webhook - ingest one bar
pub async fn post_webhook(
    State(state): State<Arc<AppState>>,
    Json(bar): Json<Bar>,
) -> impl IntoResponse {
    let mut dispatcher = state.dispatcher.lock().await;

    if dispatcher.strategy_count() == 0 {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "strategies not initialized"})),
        );
    }

    dispatcher.dispatch(&bar).await;
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "success"})),
    )
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(post_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
