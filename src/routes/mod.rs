use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

pub mod conversations;
pub mod messages;
pub mod moderation;
pub mod reports;
pub mod wsroute;

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Register every HTTP and WebSocket endpoint.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(conversations::list_conversations)
        .service(messages::room_history)
        .service(messages::mark_room_read)
        .service(messages::delete_message)
        .service(reports::create_report)
        .service(reports::list_open_reports)
        .service(reports::report_evidence)
        .service(reports::resolve_report)
        .service(moderation::ban_identity)
        .service(moderation::unban_identity)
        .service(wsroute::ws_handler);
}
