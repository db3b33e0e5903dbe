//! Collaborator-facing HTTP endpoints for notifications.
//! These are trusted-internal: the caller supplies the user ID explicitly.

pub mod dispatcher;
pub mod store;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::models::Notification;
use crate::error::CoreError;
use crate::state::AppState;

/// Default page size for notification listings.
const DEFAULT_LIMIT: u32 = 50;
/// Maximum page size for notification listings.
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: String,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UserBody {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    /// False when the notification was already read (repeat call, no-op).
    pub newly_read: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub marked: u64,
}

/// GET /api/notifications?user_id=&limit= — newest-first listing, used for
/// panel population and reconnect backfill.
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, CoreError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let notifications = state.notifier.list_for_user(&query.user_id, limit).await?;
    Ok(Json(notifications))
}

/// GET /api/notifications/unread-count?user_id=
pub async fn unread_count(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<UnreadCountResponse>, CoreError> {
    let unread = state.notifier.unread_count(&query.user_id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// POST /api/notifications/{id}/read — body { "user_id": ... }.
/// 404 if no such notification, 403 if it belongs to another user,
/// no-op (200) if already read.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
    Json(body): Json<UserBody>,
) -> Result<Json<MarkReadResponse>, CoreError> {
    let newly_read = state
        .notifier
        .mark_read(&notification_id, &body.user_id)
        .await?;
    Ok(Json(MarkReadResponse { newly_read }))
}

/// POST /api/notifications/read-all — body { "user_id": ... }.
pub async fn mark_all_read(
    State(state): State<AppState>,
    Json(body): Json<UserBody>,
) -> Result<(StatusCode, Json<MarkAllReadResponse>), CoreError> {
    let marked = state.notifier.mark_all_read(&body.user_id).await?;
    Ok((StatusCode::OK, Json(MarkAllReadResponse { marked })))
}
