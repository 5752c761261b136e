use crate::error::AppError;
use crate::models::identity::IdentityKind;
use crate::state::AppState;
use actix_web::{post, web, HttpResponse};
use serde_json::json;

async fn set_ban_flag(
    state: &AppState,
    kind: &str,
    id: &str,
    banned: bool,
) -> Result<HttpResponse, AppError> {
    let kind = IdentityKind::parse(kind)
        .ok_or_else(|| AppError::BadRequest(format!("unknown identity kind: {kind}")))?;

    let found = state.directory.set_banned(kind, id, banned).await?;
    if !found {
        return Err(AppError::NotFound);
    }

    tracing::info!(kind = kind.as_str(), id, banned, "ban flag updated");
    Ok(HttpResponse::Ok().json(json!({
        "kind": kind.as_str(),
        "id": id,
        "banned": banned,
    })))
}

#[post("/moderation/{kind}/{id}/ban")]
pub async fn ban_identity(
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (kind, id) = path.into_inner();
    set_ban_flag(&state, &kind, &id, true).await
}

#[post("/moderation/{kind}/{id}/unban")]
pub async fn unban_identity(
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (kind, id) = path.into_inner();
    set_ban_flag(&state, &kind, &id, false).await
}
