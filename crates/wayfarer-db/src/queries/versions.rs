//! Database query functions for the `itinerary_versions` table.
//!
//! Versions are append-only: there are no UPDATE or DELETE statements in
//! this module, by construction.

use anyhow::{Context, Result};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{ItinerarySnapshot, ItineraryVersion};

/// Parameters for appending a new version snapshot.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub trip_id: Uuid,
    pub version: i32,
    /// Name of the operation that produced this version.
    pub change_type: String,
    pub changed_by: Option<String>,
    pub snapshot: ItinerarySnapshot,
    pub diff: Option<serde_json::Value>,
}

/// Append a version snapshot. Returns the inserted row.
///
/// The unique `(trip_id, version)` constraint rejects duplicate version
/// numbers, which keeps the sequence strictly increasing.
pub async fn insert_version<'e>(
    exec: impl PgExecutor<'e>,
    new: &NewVersion,
) -> Result<ItineraryVersion> {
    let version = sqlx::query_as::<_, ItineraryVersion>(
        "INSERT INTO itinerary_versions (trip_id, version, change_type, changed_by, snapshot, diff) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(new.trip_id)
    .bind(new.version)
    .bind(&new.change_type)
    .bind(new.changed_by.as_deref())
    .bind(Json(&new.snapshot))
    .bind(new.diff.as_ref().map(Json))
    .fetch_one(exec)
    .await
    .with_context(|| {
        format!(
            "failed to insert version {} for trip {}",
            new.version, new.trip_id
        )
    })?;

    Ok(version)
}

/// Fetch one version snapshot of a trip.
pub async fn get_version<'e>(
    exec: impl PgExecutor<'e>,
    trip_id: Uuid,
    version: i32,
) -> Result<Option<ItineraryVersion>> {
    let row = sqlx::query_as::<_, ItineraryVersion>(
        "SELECT * FROM itinerary_versions WHERE trip_id = $1 AND version = $2",
    )
    .bind(trip_id)
    .bind(version)
    .fetch_optional(exec)
    .await
    .with_context(|| format!("failed to fetch version {version} for trip {trip_id}"))?;

    Ok(row)
}

/// List all version snapshots of a trip, oldest first.
pub async fn list_versions(pool: &PgPool, trip_id: Uuid) -> Result<Vec<ItineraryVersion>> {
    let rows = sqlx::query_as::<_, ItineraryVersion>(
        "SELECT * FROM itinerary_versions WHERE trip_id = $1 ORDER BY version ASC",
    )
    .bind(trip_id)
    .fetch_all(pool)
    .await
    .context("failed to list versions")?;

    Ok(rows)
}

/// Highest snapshot version recorded for a trip, if any.
pub async fn latest_version_number<'e>(
    exec: impl PgExecutor<'e>,
    trip_id: Uuid,
) -> Result<Option<i32>> {
    let row: (Option<i32>,) =
        sqlx::query_as("SELECT MAX(version) FROM itinerary_versions WHERE trip_id = $1")
            .bind(trip_id)
            .fetch_one(exec)
            .await
            .context("failed to query latest version number")?;

    Ok(row.0)
}
