use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sites", get(handlers::get_sites))
        .route("/api/stations", get(handlers::get_stations))
        .route("/api/occupancy", get(handlers::get_occupancy))
        .route("/api/comparison", get(handlers::get_comparison))
        .route("/api/movements", get(handlers::get_movements))
        .route("/api/uploads", post(handlers::post_upload))
        .with_state(state)
}
