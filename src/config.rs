//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_API_TOKEN` - Bearer token accepted on `/api/admin/*`
//!
//! ## Optional
//! - `DATABASE_URL` - `PostgreSQL` connection string (in-memory storage when unset)
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `NATS_URL` - NATS server for order events
//! - `FREE_SHIPPING_THRESHOLD` - Subtotal from which shipping is free (default: 500)
//! - `FLAT_SHIPPING_COST` - Shipping charged below the threshold (default: 50)
//! - `SUBMIT_TIMEOUT_SECS` - Order submission timeout (default: 15)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::domain::pricing::{DEFAULT_FLAT_SHIPPING_COST, DEFAULT_FREE_SHIPPING_THRESHOLD};
use crate::domain::{Money, ShippingPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub host: IpAddr,
    pub port: u16,
    pub nats_url: Option<String>,
    pub admin_token: String,
    pub shipping: ShippingPolicy,
    pub submit_timeout: Duration,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("nats_url", &self.nats_url)
            .field("admin_token", &"[REDACTED]")
            .field("shipping", &self.shipping)
            .field("submit_timeout", &self.submit_timeout)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let admin_token = lookup("ADMIN_API_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("ADMIN_API_TOKEN".to_string()))?;

        let free_shipping_threshold: Money =
            parse_or(&lookup, "FREE_SHIPPING_THRESHOLD", Money::from_major(DEFAULT_FREE_SHIPPING_THRESHOLD))?;
        let flat_rate: Money = parse_or(&lookup, "FLAT_SHIPPING_COST", Money::from_major(DEFAULT_FLAT_SHIPPING_COST))?;
        for (key, amount) in [("FREE_SHIPPING_THRESHOLD", free_shipping_threshold), ("FLAT_SHIPPING_COST", flat_rate)] {
            if amount < Money::ZERO {
                return Err(ConfigError::InvalidEnvVar(key.to_string(), "must not be negative".to_string()));
            }
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            host: parse_or(&lookup, "HOST", IpAddr::from([0, 0, 0, 0]))?,
            port: parse_or(&lookup, "PORT", 8083)?,
            nats_url: lookup("NATS_URL").filter(|v| !v.is_empty()),
            admin_token,
            shipping: ShippingPolicy::new(free_shipping_threshold, flat_rate),
            submit_timeout: Duration::from_secs(parse_or(&lookup, "SUBMIT_TIMEOUT_SECS", 15)?),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
