//! Connection pool and schema management for the trip store.
//!
//! Sizing is not a free choice here: every request holds one connection
//! for its whole transactional scope, and writers contending for the same
//! trip queue on the per-trip advisory lock while still holding their
//! connection. Keep `max_connections` above the expected concurrent-request
//! fan-out, or lock waiters exhaust the pool and unrelated trips stall
//! behind them.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/wayfarer-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Pool sizing knobs. See the module docs for why `max_connections` must
/// track request fan-out rather than CPU count.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    /// How long a request may wait for a free connection before the store
    /// reports itself unavailable.
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 16,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// Connect to the trip store with default settings.
pub async fn connect(config: &DbConfig) -> Result<PgPool> {
    connect_with(config, PoolSettings::default()).await
}

/// Connect to the trip store with explicit settings.
pub async fn connect_with(config: &DbConfig, settings: PoolSettings) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("cannot reach trip store at {}", config.database_url))?;

    Ok(pool)
}

/// Apply pending embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("trip store schema migration failed")?;

    let schema_version = MIGRATOR.migrations.last().map(|m| m.version).unwrap_or(0);
    info!(schema_version, "trip store schema up to date");
    Ok(())
}
