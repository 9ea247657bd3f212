// src/config.rs

use std::{env, net::SocketAddr};

use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:5173";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_STALE_DRAFT_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Token bucket applied to the resume endpoint, per client IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub per_second: u64,
    pub burst_size: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Without a database the service keeps drafts in process memory.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub rust_log: String,
    /// Client origin; resume links are built under it and CORS allows it.
    pub public_base_url: Url,
    pub bind_addr: SocketAddr,
    pub resume_token_ttl_hours: Option<i64>,
    pub stale_draft_hours: i64,
    pub resume_rate_limit: Option<RateLimit>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let public_base_url = parse_var("PUBLIC_BASE_URL", DEFAULT_PUBLIC_BASE_URL)?;
        let bind_addr = parse_var("BIND_ADDR", DEFAULT_BIND_ADDR)?;
        let stale_draft_hours =
            parse_var("STALE_DRAFT_HOURS", &DEFAULT_STALE_DRAFT_HOURS.to_string())?;

        let resume_token_ttl_hours = parse_optional("RESUME_TOKEN_TTL_HOURS")?;

        let resume_rate_limit = match (
            parse_optional::<u64>("RESUME_RATE_PER_SECOND")?,
            parse_optional::<u32>("RESUME_RATE_BURST")?,
        ) {
            (Some(per_second), burst) => Some(RateLimit {
                per_second,
                burst_size: burst.unwrap_or(5),
            }),
            (None, _) => None,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            public_base_url,
            bind_addr,
            resume_token_ttl_hours,
            stale_draft_hours,
            resume_rate_limit,
        })
    }

    pub fn resume_token_ttl(&self) -> Option<chrono::Duration> {
        self.resume_token_ttl_hours.map(chrono::Duration::hours)
    }

    /// Origin header value of the client, without a trailing slash.
    pub fn client_origin(&self) -> String {
        self.public_base_url.origin().ascii_serialization()
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = env::var(name).unwrap_or_else(|_| default.to_string());
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn parse_optional<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(None),
    }
}
