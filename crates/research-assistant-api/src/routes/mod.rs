mod health;
mod research;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use research::{ResearchBody, ResearchResponse};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::health_router())
        .merge(research::research_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
