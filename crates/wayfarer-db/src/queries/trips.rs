//! Database query functions for the `trips` and `trip_preferences` tables.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    Budget, Destination, OwnerKind, Travelers, Trip, TripConstraints, TripPreferences, TripStatus,
};

/// Insert a new trip row. Returns the inserted trip with server-generated
/// defaults (id, status, timestamps).
pub async fn insert_trip(pool: &PgPool, owner_kind: OwnerKind, owner_id: Uuid) -> Result<Trip> {
    let trip = sqlx::query_as::<_, Trip>(
        "INSERT INTO trips (owner_kind, owner_id) \
         VALUES ($1, $2) \
         RETURNING *",
    )
    .bind(owner_kind)
    .bind(owner_id)
    .fetch_one(pool)
    .await
    .context("failed to insert trip")?;

    Ok(trip)
}

/// Fetch a trip by its ID.
pub async fn get_trip(pool: &PgPool, id: Uuid) -> Result<Option<Trip>> {
    let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch trip")?;

    Ok(trip)
}

/// List all trips for an owner, newest first.
pub async fn list_trips_for_owner(
    pool: &PgPool,
    owner_kind: OwnerKind,
    owner_id: Uuid,
) -> Result<Vec<Trip>> {
    let trips = sqlx::query_as::<_, Trip>(
        "SELECT * FROM trips \
         WHERE owner_kind = $1 AND owner_id = $2 \
         ORDER BY created_at DESC",
    )
    .bind(owner_kind)
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .context("failed to list trips for owner")?;

    Ok(trips)
}

/// Update the status of a trip.
pub async fn update_trip_status(pool: &PgPool, id: Uuid, status: TripStatus) -> Result<()> {
    let result = sqlx::query("UPDATE trips SET status = $1, updated_at = now() WHERE id = $2")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update trip status")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("trip {id} not found");
    }

    Ok(())
}

/// Delete a trip. All children (items, versions, bookings, events,
/// proposals) cascade.
pub async fn delete_trip(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM trips WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete trip")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("trip {id} not found");
    }

    Ok(())
}

/// Parameters for writing trip preferences.
#[derive(Debug, Clone)]
pub struct NewPreferences {
    pub trip_id: Uuid,
    pub destination: Destination,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub travelers: Travelers,
    pub budget: Option<Budget>,
    pub style: String,
    pub window_start: String,
    pub window_end: String,
    pub constraints: TripConstraints,
}

/// Insert or replace the preferences row for a trip (1:1).
pub async fn upsert_preferences(pool: &PgPool, new: &NewPreferences) -> Result<TripPreferences> {
    let prefs = sqlx::query_as::<_, TripPreferences>(
        "INSERT INTO trip_preferences \
             (trip_id, destination, start_date, end_date, travelers, budget, style, \
              window_start, window_end, constraints) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (trip_id) DO UPDATE SET \
             destination = EXCLUDED.destination, \
             start_date = EXCLUDED.start_date, \
             end_date = EXCLUDED.end_date, \
             travelers = EXCLUDED.travelers, \
             budget = EXCLUDED.budget, \
             style = EXCLUDED.style, \
             window_start = EXCLUDED.window_start, \
             window_end = EXCLUDED.window_end, \
             constraints = EXCLUDED.constraints \
         RETURNING *",
    )
    .bind(new.trip_id)
    .bind(Json(&new.destination))
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(Json(&new.travelers))
    .bind(new.budget.as_ref().map(Json))
    .bind(&new.style)
    .bind(&new.window_start)
    .bind(&new.window_end)
    .bind(Json(&new.constraints))
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to upsert preferences for trip {}", new.trip_id))?;

    Ok(prefs)
}

/// Fetch the preferences row for a trip.
pub async fn get_preferences(pool: &PgPool, trip_id: Uuid) -> Result<Option<TripPreferences>> {
    let prefs =
        sqlx::query_as::<_, TripPreferences>("SELECT * FROM trip_preferences WHERE trip_id = $1")
            .bind(trip_id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch trip preferences")?;

    Ok(prefs)
}
