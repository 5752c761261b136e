use crate::error::AppError;
use crate::state::AppState;
use actix_web::{delete, get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// RFC 3339 timestamp; only messages strictly newer are returned.
    pub since: Option<DateTime<Utc>>,
}

/// Room history in ascending order, decrypted. Soft-deleted rows are
/// included with their `deleted` flag set; clients render those as removed.
#[get("/rooms/{room_id}/messages")]
pub async fn room_history(
    path: web::Path<String>,
    query: web::Query<HistoryQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let room_id = path.into_inner();
    let messages = state.store.list_by_room(&room_id, query.since).await?;
    Ok(HttpResponse::Ok().json(messages))
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub reader_id: String,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}

/// Stamp every unread message addressed to the reader in this room.
/// Idempotent; repeat calls report zero updates.
#[post("/rooms/{room_id}/read")]
pub async fn mark_room_read(
    path: web::Path<String>,
    body: web::Json<MarkReadRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let room_id = path.into_inner();
    if body.reader_id.is_empty() {
        return Err(AppError::BadRequest("reader_id must not be empty".into()));
    }
    let updated = state.store.mark_read(&room_id, &body.reader_id).await?;
    Ok(HttpResponse::Ok().json(MarkReadResponse { updated }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub requester_id: String,
}

/// Sender-only soft delete. The row survives for moderation evidence.
#[delete("/messages/{id}")]
pub async fn delete_message(
    path: web::Path<Uuid>,
    query: web::Query<DeleteQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    state.store.mark_deleted(id, &query.requester_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}
