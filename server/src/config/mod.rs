use std::env;
use std::net::SocketAddr;

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::{create_security_headers_layer, SecurityHeaders};

const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 3001);
const DEFAULT_APP_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_CURRENCY: &str = "twd";
const DEFAULT_CHECKOUT_EXPIRY_MINUTES: i64 = 30;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    /// Public origin of the storefront; redirect URLs handed to the payment
    /// provider are built from it.
    pub app_base_url: String,
    pub stripe_api_base: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub currency: String,
    pub checkout_expiry_minutes: i64,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parsed<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let checkout_expiry_minutes =
            parsed("CHECKOUT_EXPIRY_MINUTES", DEFAULT_CHECKOUT_EXPIRY_MINUTES)?;
        if checkout_expiry_minutes <= 0 {
            return Err(ConfigError::Invalid {
                name: "CHECKOUT_EXPIRY_MINUTES",
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            max_connections: parsed("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            bind_addr: parsed("BIND_ADDR", SocketAddr::from(DEFAULT_BIND_ADDR))?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_APP_BASE_URL.to_string()),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string()),
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            currency: env::var("PAYMENT_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or_else(|_| DEFAULT_CURRENCY.to_string()),
            checkout_expiry_minutes,
        })
    }

    /// Settings for tests and local runs that never reach a real database or
    /// payment provider.
    pub fn for_local(webhook_secret: impl Into<String>) -> Self {
        Self {
            database_url: "postgres://localhost/boxoffice".to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            app_base_url: DEFAULT_APP_BASE_URL.to_string(),
            stripe_api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            stripe_secret_key: "sk_test_local".to_string(),
            stripe_webhook_secret: webhook_secret.into(),
            currency: DEFAULT_CURRENCY.to_string(),
            checkout_expiry_minutes: DEFAULT_CHECKOUT_EXPIRY_MINUTES,
        }
    }

    /// Resolves `path` against the storefront origin unless it is already an
    /// absolute http(s) URL.
    pub fn absolute_url(&self, path: &str) -> String {
        let lower = path.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.app_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
