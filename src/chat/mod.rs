//! Collaborator-facing HTTP endpoints for chat rooms and messages.
//! Trusted-internal: the caller supplies user IDs explicitly; authorization
//! against room participants happens in the services.

pub mod messages;
pub mod rooms;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::models::{ChatMessage, ChatRoom, MessageKind};
use crate::error::CoreError;
use crate::state::AppState;

/// Default page size for message history.
const DEFAULT_LIMIT: u32 = 50;
/// Maximum page size for message history.
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub order_id: String,
    pub buyer_id: String,
    pub seller_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub sender_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub reader_id: String,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub newly_read: bool,
}

/// POST /api/chat/rooms — idempotent get-or-create for an order's room.
/// A caller cannot tell whether it created the room or a concurrent caller
/// won the race, so both outcomes return 200 with the same row.
pub async fn get_or_create_room(
    State(state): State<AppState>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<Json<ChatRoom>, CoreError> {
    let room = state
        .rooms
        .get_or_create_for_order(&body.order_id, &body.buyer_id, &body.seller_id)
        .await?;
    Ok(Json(room))
}

/// GET /api/chat/rooms?user_id= — rooms ordered by last activity.
pub async fn list_rooms(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<ChatRoom>>, CoreError> {
    let rooms = state.rooms.list_for_user(&query.user_id).await?;
    Ok(Json(rooms))
}

/// POST /api/chat/rooms/{id}/deactivate — close a room to new messages.
pub async fn deactivate_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<StatusCode, CoreError> {
    state.rooms.deactivate(&room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/chat/rooms/{id}/messages?limit=&offset= — oldest-first page.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ChatMessage>>, CoreError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = query.offset.unwrap_or(0);
    let messages = state.chat.list(&room_id, limit, offset).await?;
    Ok(Json(messages))
}

/// POST /api/chat/messages — append a message (HTTP mirror of the WS
/// `new_message` frame, for collaborators without a socket).
pub async fn send_message(
    State(state): State<AppState>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), CoreError> {
    let message = state
        .chat
        .append(&body.room_id, &body.sender_id, &body.content, body.kind)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// PATCH /api/chat/messages/{id} — sender-only content edit.
pub async fn edit_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(body): Json<EditMessageRequest>,
) -> Result<Json<ChatMessage>, CoreError> {
    let message = state
        .chat
        .edit(&message_id, &body.sender_id, &body.content)
        .await?;
    Ok(Json(message))
}

/// POST /api/chat/messages/{id}/read — receiver-only read marking.
pub async fn mark_message_read(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(body): Json<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>, CoreError> {
    let newly_read = state.chat.mark_read(&message_id, &body.reader_id).await?;
    Ok(Json(MarkReadResponse { newly_read }))
}

/// GET /api/chat/rooms/{id}/unread-count?user_id=
pub async fn room_unread_count(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<UnreadCountResponse>, CoreError> {
    let unread = state
        .chat
        .unread_count_for_room(&room_id, &query.user_id)
        .await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// GET /api/chat/unread-count?user_id= — total across all the user's rooms.
pub async fn total_unread(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<UnreadCountResponse>, CoreError> {
    let unread = state.chat.total_unread_for_user(&query.user_id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}
