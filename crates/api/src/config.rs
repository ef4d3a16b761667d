//! Runtime configuration, read once from the environment.

use std::net::SocketAddr;

use chrono::TimeDelta;
use thiserror::Error;
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
/// One year.
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 366;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// `None` allows any origin.
    pub cors_allow_origin: Option<String>,
    /// Reorder level for products created without one.
    pub low_stock_default: i64,
}

impl ApiConfig {
    /// Defaults with an explicit secret (tests, embedding).
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            jwt_secret: jwt_secret.into(),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            cors_allow_origin: None,
            low_stock_default: 5,
        }
    }

    /// Lifetime of issued tokens.
    pub fn token_ttl(&self) -> TimeDelta {
        TimeDelta::try_hours(self.token_ttl_hours)
            .unwrap_or_else(|| TimeDelta::hours(DEFAULT_TOKEN_TTL_HOURS))
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Unset or blank means default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });
        let mut config = Self::new(jwt_secret);

        if let Some(v) = get("STOCKBOOK_BIND_ADDR") {
            config.bind_addr = parse("STOCKBOOK_BIND_ADDR", &v)?;
        }
        if let Some(v) = get("TOKEN_TTL_HOURS") {
            config.token_ttl_hours = parse_positive("TOKEN_TTL_HOURS", &v)?;
            if config.token_ttl_hours > MAX_TOKEN_TTL_HOURS
                || TimeDelta::try_hours(config.token_ttl_hours).is_none()
            {
                return Err(invalid(
                    "TOKEN_TTL_HOURS",
                    &v,
                    format!("must be at most {MAX_TOKEN_TTL_HOURS}"),
                ));
            }
        }
        if let Some(v) = get("LOW_STOCK_DEFAULT") {
            config.low_stock_default = parse("LOW_STOCK_DEFAULT", &v)?;
            if config.low_stock_default < 0 {
                return Err(invalid("LOW_STOCK_DEFAULT", &v, "must not be negative"));
            }
        }
        config.cors_allow_origin = get("CORS_ALLOW_ORIGIN").map(|v| v.trim().to_string());

        Ok(config)
    }
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| invalid(var, value, e.to_string()))
}

fn parse_positive(var: &'static str, value: &str) -> Result<i64, ConfigError> {
    let n: i64 = parse(var, value)?;
    if n <= 0 {
        return Err(invalid(var, value, "must be greater than zero"));
    }
    Ok(n)
}
