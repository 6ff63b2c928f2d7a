pub mod assembler;
pub mod dto;
pub mod handlers;
pub mod repair;
pub mod store;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/households/:household_id/plan/generate",
            post(handlers::generate_week),
        )
        .route("/households/:household_id/plan", get(handlers::get_plan))
        .route(
            "/households/:household_id/ban-ingredient",
            post(handlers::ban_ingredient),
        )
        .route("/meals/:meal_id/replace", post(handlers::replace_meal))
        .route("/meals/:meal_id/clear", post(handlers::clear_meal))
}
