use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use support_chat_service::{
    config::Config,
    db,
    error::AppError,
    logging,
    services::{EncryptionCodec, PgIdentityDirectory, PgMessageStore, PgReportStore},
    state::AppState,
    websocket::RoomRegistry,
};

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();

    let config = Arc::new(Config::from_env()?);
    tracing::info!(port = config.port, operator = %config.operator_id, "starting support chat service");

    let pool = db::init_pool(&config.database_url)?;
    db::run_migrations(&pool).await?;

    let codec = EncryptionCodec::new(&config.message_secret);
    let state = AppState {
        config: config.clone(),
        registry: RoomRegistry::new(),
        store: Arc::new(PgMessageStore::new(pool.clone(), codec)),
        reports: Arc::new(PgReportStore::new(pool.clone())),
        directory: Arc::new(PgIdentityDirectory::new(pool)),
    };

    let bind_addr = ("0.0.0.0", config.port);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(support_chat_service::routes::configure)
    })
    .bind(bind_addr)
    .map_err(|e| AppError::StartServer(format!("bind {}:{}: {e}", bind_addr.0, bind_addr.1)))?
    .run()
    .await
    .map_err(|e| AppError::StartServer(format!("server run: {e}")))
}
