use crate::handlers;
use crate::state::AppState;
use axum::{routing::{delete, get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/api/habits", get(handlers::list_habits).post(handlers::create_habit))
        .route("/api/habits/:id", delete(handlers::delete_habit))
        .route("/api/habits/:id/toggle", post(handlers::toggle_habit))
        .route("/api/habits/:id/complete", post(handlers::complete_habit))
        .route("/api/habits/:id/undo", post(handlers::undo_habit))
        .route("/api/habits/:id/history", get(handlers::habit_history))
        .with_state(state)
}
