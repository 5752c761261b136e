use crate::{
    config::Config,
    services::{IdentityLookup, MessageStore, ReportStore},
    websocket::RoomRegistry,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: RoomRegistry,
    /// Authoritative message log; the registry only ever holds transient
    /// copies for fan-out.
    pub store: Arc<dyn MessageStore>,
    pub reports: Arc<dyn ReportStore>,
    pub directory: Arc<dyn IdentityLookup>,
}
