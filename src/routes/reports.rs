use crate::error::AppError;
use crate::models::report::{NewReport, PartyRef, ReportCategory, ReportOutcome};
use crate::services::ReportService;
use crate::state::AppState;
use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub reporter: PartyRef,
    pub reported: PartyRef,
    pub category: ReportCategory,
    #[serde(default)]
    pub description: String,
    /// Captured once at creation; never updated afterwards.
    pub related_room_id: Option<String>,
}

#[post("/reports")]
pub async fn create_report(
    body: web::Json<CreateReportRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = body.into_inner();
    if req.description.trim().is_empty() {
        return Err(AppError::BadRequest("description must not be empty".into()));
    }
    let report = ReportService::create_report(
        state.reports.as_ref(),
        NewReport {
            reporter: req.reporter,
            reported: req.reported,
            category: req.category,
            description: req.description,
            related_room_id: req.related_room_id,
        },
    )
    .await?;
    Ok(HttpResponse::Created().json(report))
}

/// Pending reports, newest first, with both party profiles resolved.
#[get("/reports")]
pub async fn list_open_reports(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let views =
        ReportService::list_open(state.reports.as_ref(), state.directory.as_ref()).await?;
    Ok(HttpResponse::Ok().json(views))
}

/// Operator-only evidence view: the report, both profiles, and the full
/// related-room history with soft-deleted messages recovered.
#[get("/reports/{id}/evidence")]
pub async fn report_evidence(
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let evidence = ReportService::get_evidence(
        state.reports.as_ref(),
        state.store.as_ref(),
        state.directory.as_ref(),
        path.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(evidence))
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub outcome: ReportOutcome,
    pub admin_notes: Option<String>,
}

#[post("/reports/{id}/resolve")]
pub async fn resolve_report(
    path: web::Path<Uuid>,
    body: web::Json<ResolveRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = body.into_inner();
    let report = ReportService::resolve(
        state.reports.as_ref(),
        path.into_inner(),
        req.outcome,
        req.admin_notes.as_deref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(report))
}
