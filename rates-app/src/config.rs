//! Configuration loading from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

/// Where query results are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// Per-process `MemoryCache`.
    Memory,
    /// `query_cache` table, shared by every instance on the same database.
    Database,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "database" | "db" => Ok(CacheBackend::Database),
            other => anyhow::bail!(
                "Unknown CACHE_BACKEND {:?}, expected memory or database",
                other
            ),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub rates_table: String,
    pub nbp_base_url: String,
    pub source_timeout: Duration,
    pub cache_backend: CacheBackend,
    pub cache_ttl: Duration,
    pub import_interval: Duration,
    pub import_surface_errors: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("PORT", "3000").parse::<u16>().context("PORT")?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let rates_table = var("RATES_TABLE", rates_types::DEFAULT_TABLE);
        let nbp_base_url = var("NBP_BASE_URL", rates_source::NBP_BASE_URL);

        let default_timeout = rates_source::DEFAULT_TIMEOUT.as_secs().to_string();
        let source_timeout = seconds(&var("SOURCE_TIMEOUT_SECS", &default_timeout))
            .context("SOURCE_TIMEOUT_SECS")?;
        let cache_backend = var("CACHE_BACKEND", "memory").parse::<CacheBackend>()?;
        let cache_ttl = seconds(&var("CACHE_TTL_SECS", "3600")).context("CACHE_TTL_SECS")?;
        let import_interval =
            seconds(&var("IMPORT_INTERVAL_SECS", "86400")).context("IMPORT_INTERVAL_SECS")?;

        let import_surface_errors = var("IMPORT_SURFACE_ERRORS", "false")
            .trim()
            .parse::<bool>()
            .context("IMPORT_SURFACE_ERRORS")?;

        Ok(Self {
            port,
            database_url,
            rates_table,
            nbp_base_url,
            source_timeout,
            cache_backend,
            cache_ttl,
            import_interval,
            import_surface_errors,
        })
    }
}

fn seconds(value: &str) -> anyhow::Result<Duration> {
    Ok(Duration::from_secs(value.trim().parse()?))
}
