//! Environment configuration.

use std::env;
use thiserror::Error;

const STRIPE_PLACEHOLDER_KEY: &str = "sk_test_your_key_here";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub public_base_url: String,
    /// `None` runs checkout in demo mode: orders are marked paid immediately.
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub nats_url: Option<String>,
    pub currency: String,
    pub idempotency_window_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_max_connections", &self.database_max_connections)
            .field("jwt_ttl_hours", &self.jwt_ttl_hours)
            .field("public_base_url", &self.public_base_url)
            .field("payments", &self.stripe_secret_key.is_some())
            .field("nats", &self.nats_url.is_some())
            .field("currency", &self.currency)
            .field("idempotency_window_secs", &self.idempotency_window_secs)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |name: &str| get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        let port = parse(&optional, "PORT", 8083u16)?;
        let stripe_secret_key = optional("STRIPE_SECRET_KEY").filter(|k| k != STRIPE_PLACEHOLDER_KEY);
        let jwt_ttl_hours = parse(&optional, "JWT_TTL_HOURS", 24i64)?;
        if jwt_ttl_hours < 1 {
            return Err(ConfigError::Invalid { name: "JWT_TTL_HOURS", reason: "must be at least 1".into() });
        }

        let config = Self {
            host: optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse(&optional, "DATABASE_MAX_CONNECTIONS", 10u32)?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_ttl_hours,
            public_base_url: optional("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{port}"))
                .trim_end_matches('/')
                .to_string(),
            stripe_secret_key,
            stripe_webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
            nats_url: optional("NATS_URL"),
            currency: optional("CURRENCY").unwrap_or_else(|| "USD".to_string()).to_uppercase(),
            idempotency_window_secs: parse(&optional, "IDEMPOTENCY_WINDOW_SECS", 600u64)?.max(1),
        };
        tracing::debug!(config = ?config, "configuration loaded");
        Ok(config)
    }

    pub fn bind_addr(&self) -> String { format!("{}:{}", self.host, self.port) }
}

fn parse<T>(optional: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid { name, reason: e.to_string() }),
        None => Ok(default),
    }
}
