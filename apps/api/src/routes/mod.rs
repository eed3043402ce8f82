pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::recommendation::handlers as recommendation;
use crate::sessions::handlers as sessions;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions
        .route("/api/v1/sessions", post(sessions::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(sessions::handle_get_session).delete(sessions::handle_delete_session),
        )
        // Chat assistant
        .route("/api/v1/sessions/:id/chat", post(chat::handle_submit))
        .route(
            "/api/v1/sessions/:id/chat/events",
            get(chat::handle_chat_events),
        )
        // Recommendation flow
        .route(
            "/api/v1/sessions/:id/analyze",
            post(recommendation::handle_analyze),
        )
        .route(
            "/api/v1/sessions/:id/recommendations",
            get(recommendation::handle_get_recommendations),
        )
        .with_state(state)
}
