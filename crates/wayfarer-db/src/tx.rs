//! Trip-scoped transactional scopes.
//!
//! Every multi-row itinerary mutation (generate, edit, replan apply,
//! rollback) runs inside a transaction that first takes a per-trip advisory
//! lock, so concurrent mutations of the same trip serialize while different
//! trips proceed in parallel. The lock is transaction-scoped and releases
//! automatically on commit or rollback.

use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Begin a transaction holding the advisory lock for `trip_id`.
///
/// Blocks until any concurrent holder for the same trip commits or rolls
/// back. Callers must `commit()` the returned transaction; dropping it
/// rolls back all effects.
pub async fn begin_trip_tx(pool: &PgPool, trip_id: Uuid) -> Result<Transaction<'static, Postgres>> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to begin trip transaction")?;

    // hashtextextended folds the UUID into the bigint advisory-lock keyspace.
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(trip_id.to_string())
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to take advisory lock for trip {trip_id}"))?;

    Ok(tx)
}
