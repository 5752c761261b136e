use crate::error::AppError;
use crate::services::ConversationService;
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};

/// Operator inbox: one row per counterparty room, newest activity first.
#[get("/conversations")]
pub async fn list_conversations(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let summaries = ConversationService::list_conversations(
        state.store.as_ref(),
        state.directory.as_ref(),
        &state.config.operator_id,
    )
    .await?;
    Ok(HttpResponse::Ok().json(summaries))
}
