use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::chat;
use crate::events::DomainEvent;
use crate::notify;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// POST /api/events — collaborator event intake. The tagged JSON body is
/// decoded into the closed DomainEvent enum once, here; acceptance means
/// "queued", the durable write happens on the bus loop.
async fn publish_event(
    State(state): State<AppState>,
    Json(event): Json<DomainEvent>,
) -> StatusCode {
    state.events.publish(event);
    StatusCode::ACCEPTED
}

/// GET /api/health — liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/events", post(publish_event))
        .route("/api/notifications", get(notify::list_notifications))
        .route(
            "/api/notifications/unread-count",
            get(notify::unread_count),
        )
        .route("/api/notifications/{id}/read", post(notify::mark_read))
        .route("/api/notifications/read-all", post(notify::mark_all_read))
        .route(
            "/api/chat/rooms",
            post(chat::get_or_create_room).get(chat::list_rooms),
        )
        .route(
            "/api/chat/rooms/{id}/deactivate",
            post(chat::deactivate_room),
        )
        .route("/api/chat/rooms/{id}/messages", get(chat::list_messages))
        .route(
            "/api/chat/rooms/{id}/unread-count",
            get(chat::room_unread_count),
        )
        .route("/api/chat/unread-count", get(chat::total_unread))
        .route("/api/chat/messages", post(chat::send_message))
        .route("/api/chat/messages/{id}", patch(chat::edit_message))
        .route(
            "/api/chat/messages/{id}/read",
            post(chat::mark_message_read),
        )
        .route("/ws", get(ws_handler::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
