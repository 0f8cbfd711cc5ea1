//! Database query functions for the `itinerary_items` and `itineraries`
//! tables.
//!
//! Item writes are executor-generic: the generator, editor, and replan
//! apply all mutate items inside a trip-scoped transaction.

use anyhow::{Context, Result};
use sqlx::types::Json;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{CostEstimate, GeoPoint, Itinerary, ItineraryItem, ItemType, RouteSegment};

/// Parameters for inserting a new itinerary item row.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub trip_id: Uuid,
    pub day: i32,
    pub item_type: ItemType,
    pub poi_id: Option<Uuid>,
    pub name: String,
    pub location: Option<GeoPoint>,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: i32,
    pub is_pinned: bool,
    pub position: i32,
    pub route_from_previous: Option<RouteSegment>,
    pub cost_estimate: Option<CostEstimate>,
    pub notes: Option<String>,
}

/// Insert a new itinerary item row. Returns the inserted row with
/// server-generated defaults (id, timestamps).
pub async fn insert_item<'e>(exec: impl PgExecutor<'e>, new: &NewItem) -> Result<ItineraryItem> {
    let item = sqlx::query_as::<_, ItineraryItem>(
        "INSERT INTO itinerary_items \
             (trip_id, day, item_type, poi_id, name, location, start_time, end_time, \
              duration_minutes, is_pinned, position, route_from_previous, cost_estimate, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         RETURNING *",
    )
    .bind(new.trip_id)
    .bind(new.day)
    .bind(new.item_type)
    .bind(new.poi_id)
    .bind(&new.name)
    .bind(new.location.as_ref().map(Json))
    .bind(&new.start_time)
    .bind(&new.end_time)
    .bind(new.duration_minutes)
    .bind(new.is_pinned)
    .bind(new.position)
    .bind(new.route_from_previous.as_ref().map(Json))
    .bind(new.cost_estimate.as_ref().map(Json))
    .bind(new.notes.as_deref())
    .fetch_one(exec)
    .await
    .with_context(|| format!("failed to insert item {:?} for trip {}", new.name, new.trip_id))?;

    Ok(item)
}

/// Re-insert an item exactly as captured in a snapshot, preserving its id.
///
/// Used by rollback, which must restore the pre-apply state byte-for-byte.
pub async fn insert_item_snapshot<'e>(
    exec: impl PgExecutor<'e>,
    item: &ItineraryItem,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO itinerary_items \
             (id, trip_id, day, item_type, poi_id, name, location, start_time, end_time, \
              duration_minutes, is_pinned, position, route_from_previous, cost_estimate, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(item.id)
    .bind(item.trip_id)
    .bind(item.day)
    .bind(item.item_type)
    .bind(item.poi_id)
    .bind(&item.name)
    .bind(item.location.as_ref())
    .bind(&item.start_time)
    .bind(&item.end_time)
    .bind(item.duration_minutes)
    .bind(item.is_pinned)
    .bind(item.position)
    .bind(item.route_from_previous.as_ref())
    .bind(item.cost_estimate.as_ref())
    .bind(item.notes.as_deref())
    .execute(exec)
    .await
    .with_context(|| format!("failed to restore item {}", item.id))?;

    Ok(())
}

/// Fetch a single item by ID.
pub async fn get_item<'e>(exec: impl PgExecutor<'e>, id: Uuid) -> Result<Option<ItineraryItem>> {
    let item = sqlx::query_as::<_, ItineraryItem>("SELECT * FROM itinerary_items WHERE id = $1")
        .bind(id)
        .fetch_optional(exec)
        .await
        .context("failed to fetch item")?;

    Ok(item)
}

/// List all items for a trip, ordered by (day ASC, position ASC).
pub async fn list_items_for_trip<'e>(
    exec: impl PgExecutor<'e>,
    trip_id: Uuid,
) -> Result<Vec<ItineraryItem>> {
    let items = sqlx::query_as::<_, ItineraryItem>(
        "SELECT * FROM itinerary_items \
         WHERE trip_id = $1 \
         ORDER BY day ASC, position ASC",
    )
    .bind(trip_id)
    .fetch_all(exec)
    .await
    .context("failed to list items for trip")?;

    Ok(items)
}

/// List the items of one day, ordered by position.
pub async fn list_items_for_day<'e>(
    exec: impl PgExecutor<'e>,
    trip_id: Uuid,
    day: i32,
) -> Result<Vec<ItineraryItem>> {
    let items = sqlx::query_as::<_, ItineraryItem>(
        "SELECT * FROM itinerary_items \
         WHERE trip_id = $1 AND day = $2 \
         ORDER BY position ASC",
    )
    .bind(trip_id)
    .bind(day)
    .fetch_all(exec)
    .await
    .with_context(|| format!("failed to list items for trip {trip_id} day {day}"))?;

    Ok(items)
}

/// Update an item's times after a re-flow.
pub async fn update_item_times<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
    start_time: &str,
    end_time: &str,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE itinerary_items \
         SET start_time = $1, end_time = $2, updated_at = now() \
         WHERE id = $3",
    )
    .bind(start_time)
    .bind(end_time)
    .bind(id)
    .execute(exec)
    .await
    .context("failed to update item times")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("item {id} not found");
    }

    Ok(())
}

/// Update an item's position within its day.
pub async fn update_item_position<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
    position: i32,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE itinerary_items SET position = $1, updated_at = now() WHERE id = $2",
    )
    .bind(position)
    .bind(id)
    .execute(exec)
    .await
    .context("failed to update item position")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("item {id} not found");
    }

    Ok(())
}

/// Set or clear the pinned flag on an item.
pub async fn update_item_pinned<'e>(exec: impl PgExecutor<'e>, id: Uuid, pinned: bool) -> Result<()> {
    let result = sqlx::query(
        "UPDATE itinerary_items SET is_pinned = $1, updated_at = now() WHERE id = $2",
    )
    .bind(pinned)
    .bind(id)
    .execute(exec)
    .await
    .context("failed to update item pinned flag")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("item {id} not found");
    }

    Ok(())
}

/// Move an item to a different day/time slot. Used by replan apply.
pub async fn update_item_schedule<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
    day: i32,
    start_time: &str,
    end_time: &str,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE itinerary_items \
         SET day = $1, start_time = $2, end_time = $3, updated_at = now() \
         WHERE id = $4",
    )
    .bind(day)
    .bind(start_time)
    .bind(end_time)
    .bind(id)
    .execute(exec)
    .await
    .context("failed to update item schedule")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("item {id} not found");
    }

    Ok(())
}

/// Delete a single item.
pub async fn delete_item<'e>(exec: impl PgExecutor<'e>, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM itinerary_items WHERE id = $1")
        .bind(id)
        .execute(exec)
        .await
        .context("failed to delete item")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("item {id} not found");
    }

    Ok(())
}

/// Delete a set of items by id. Missing ids are ignored.
pub async fn delete_items<'e>(exec: impl PgExecutor<'e>, ids: &[Uuid]) -> Result<u64> {
    let result = sqlx::query("DELETE FROM itinerary_items WHERE id = ANY($1)")
        .bind(ids)
        .execute(exec)
        .await
        .context("failed to delete items")?;

    Ok(result.rows_affected())
}

/// Delete every non-pinned item of a trip. Returns the number removed.
pub async fn delete_unpinned_items<'e>(exec: impl PgExecutor<'e>, trip_id: Uuid) -> Result<u64> {
    let result =
        sqlx::query("DELETE FROM itinerary_items WHERE trip_id = $1 AND is_pinned = FALSE")
            .bind(trip_id)
            .execute(exec)
            .await
            .context("failed to delete unpinned items")?;

    Ok(result.rows_affected())
}

/// Delete every item of a trip, pinned or not. Used by rollback before
/// restoring a snapshot.
pub async fn delete_all_items<'e>(exec: impl PgExecutor<'e>, trip_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM itinerary_items WHERE trip_id = $1")
        .bind(trip_id)
        .execute(exec)
        .await
        .context("failed to delete all items")?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Itinerary head
// ---------------------------------------------------------------------------

/// Fetch the itinerary head row (version counter) for a trip.
pub async fn get_itinerary<'e>(exec: impl PgExecutor<'e>, trip_id: Uuid) -> Result<Option<Itinerary>> {
    let itinerary = sqlx::query_as::<_, Itinerary>("SELECT * FROM itineraries WHERE trip_id = $1")
        .bind(trip_id)
        .fetch_optional(exec)
        .await
        .context("failed to fetch itinerary")?;

    Ok(itinerary)
}

/// Insert or bump the itinerary head row to `version`.
pub async fn set_itinerary_version<'e>(
    exec: impl PgExecutor<'e>,
    trip_id: Uuid,
    version: i32,
) -> Result<Itinerary> {
    let itinerary = sqlx::query_as::<_, Itinerary>(
        "INSERT INTO itineraries (trip_id, version) \
         VALUES ($1, $2) \
         ON CONFLICT (trip_id) DO UPDATE SET version = $2, generated_at = now() \
         RETURNING *",
    )
    .bind(trip_id)
    .bind(version)
    .fetch_one(exec)
    .await
    .with_context(|| format!("failed to set itinerary version for trip {trip_id}"))?;

    Ok(itinerary)
}
