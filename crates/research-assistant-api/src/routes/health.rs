use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::state::{AppState, CapacitySnapshot};

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    model: String,
    capacity: CapacitySnapshot,
}

pub fn health_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Research API is running",
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model: state.model().to_string(),
        capacity: state.capacity(),
    })
}
