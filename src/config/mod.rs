use std::env;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::apply_security_headers;

use crate::utils::error::ConfigError;

/// Immutable process configuration, read once at startup. The signing
/// secrets are hard requirements: a process without them cannot issue or
/// verify anything, so it refuses to start instead of failing per request.
pub struct Config {
    pub database_url: String,
    pub qr_signing_secret: String,
    pub gateway_webhook_secret: String,
    pub checkout_base_url: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/campuspass".to_string()),
            qr_signing_secret: require("QR_SIGNING_SECRET")?,
            gateway_webhook_secret: require("GATEWAY_WEBHOOK_SECRET")?,
            checkout_base_url: env::var("CHECKOUT_BASE_URL")
                .unwrap_or_else(|_| "https://pay.campuspass.test".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}
