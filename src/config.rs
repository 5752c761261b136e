use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Fixed operator (pseudo-)identity; the non-variable side of every room.
    pub operator_id: String,
    /// Process-wide secret the codec hashes into the at-rest key.
    pub message_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(4000);

        let operator_id = env::var("OPERATOR_ID").unwrap_or_else(|_| "admin".into());
        if operator_id.is_empty() || operator_id.contains('-') {
            // The room id format is "<operator>-<counterparty>"; a dash in the
            // operator id would make counterparty extraction ambiguous.
            return Err(crate::error::AppError::Config(
                "OPERATOR_ID must be non-empty and contain no '-'".into(),
            ));
        }

        let message_secret = env::var("MESSAGE_SECRET")
            .map_err(|_| crate::error::AppError::Config("MESSAGE_SECRET missing".into()))?;
        if message_secret.len() < 16 {
            return Err(crate::error::AppError::Config(
                "MESSAGE_SECRET must be at least 16 characters".into(),
            ));
        }

        Ok(Self {
            database_url,
            port,
            operator_id,
            message_secret,
        })
    }
}
