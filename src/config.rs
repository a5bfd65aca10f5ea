use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::models::Thresholds;

// ============================================================================
// Configuration
// ============================================================================
//
// Everything is read from the environment (a local `.env` is loaded first
// by `main`). Unset variables take their defaults; set but unparseable
// values are a startup error.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL URL; `None` runs on the in-memory store
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub http_port: u16,
    pub metrics_port: u16,
    pub thresholds: Thresholds,
    /// Attempts per order mutation; 1 disables retry
    pub tx_retry_attempts: u32,
    /// JSON file with products for the in-memory store
    pub seed_products: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let thresholds = Thresholds {
            low_stock: parse_or(&get, "LOW_STOCK_THRESHOLD", 10)?,
            out_of_stock: parse_or(&get, "OUT_OF_STOCK_THRESHOLD", 0)?,
            low_stock_alerts: parse_bool_or(&get, "LOW_STOCK_ALERTS", true)?,
            out_of_stock_alerts: parse_bool_or(&get, "OUT_OF_STOCK_ALERTS", true)?,
        };

        if thresholds.out_of_stock < 0 {
            bail!("OUT_OF_STOCK_THRESHOLD must not be negative, got {}", thresholds.out_of_stock);
        }
        if thresholds.low_stock < thresholds.out_of_stock {
            bail!(
                "LOW_STOCK_THRESHOLD ({}) must not be below OUT_OF_STOCK_THRESHOLD ({})",
                thresholds.low_stock,
                thresholds.out_of_stock
            );
        }

        let tx_retry_attempts = parse_or(&get, "TX_RETRY_ATTEMPTS", 1)?;
        if tx_retry_attempts == 0 {
            bail!("TX_RETRY_ATTEMPTS must be at least 1");
        }

        let database_max_connections = parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?;
        if database_max_connections == 0 {
            bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        Ok(Self {
            database_url: get("DATABASE_URL"),
            database_max_connections,
            http_port: parse_or(&get, "HTTP_PORT", 8080)?,
            metrics_port: parse_or(&get, "METRICS_PORT", 9090)?,
            thresholds,
            tx_retry_attempts,
            seed_products: get("SEED_PRODUCTS").map(PathBuf::from),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => bail!("invalid value for {}: {:?}", key, v),
        },
    }
}

// ============================================================================
// Settings collaborator
// ============================================================================

#[async_trait]
pub trait Settings: Send + Sync {
    async fn thresholds(&self) -> Thresholds;
}

/// Thresholds fixed at startup
pub struct StaticSettings {
    thresholds: Thresholds,
}

impl StaticSettings {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }
}

#[async_trait]
impl Settings for StaticSettings {
    async fn thresholds(&self) -> Thresholds {
        self.thresholds
    }
}
