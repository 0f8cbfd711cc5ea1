//! Itinerary editing operations.
//!
//! Each operation mutates items inside one trip-scoped transaction,
//! re-flows the affected day, renumbers positions gap-free, bumps the
//! itinerary version, and appends a snapshot named after the operation.

pub mod validate;

use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use wayfarer_db::models::{
    CostConfidence, CostEstimate, ItemType, ItineraryItem, ItinerarySnapshot, TripPreferences,
};
use wayfarer_db::queries::items::{self, NewItem};
use wayfarer_db::queries::{trips, versions};
use wayfarer_db::tx;

use crate::catalog::PoiCatalog;
use crate::error::{EngineError, EngineResult};
use crate::generator::PLACEMENT_BUFFER_MINUTES;
use crate::timegeo::TimeOfDay;

/// Reorder the items of one day to the given id sequence.
///
/// The ids must be exactly the day's items (a permutation). Positions are
/// assigned from the sequence and the day re-flows.
pub async fn reorder(
    pool: &PgPool,
    trip_id: Uuid,
    day: i32,
    ordered_ids: &[Uuid],
) -> EngineResult<Vec<ItineraryItem>> {
    let prefs = load_preferences(pool, trip_id).await?;
    let window_start = parse_window_start(&prefs)?;

    let mut tx = tx::begin_trip_tx(pool, trip_id).await?;

    let current = items::list_items_for_day(&mut *tx, trip_id, day).await?;
    if current.len() != ordered_ids.len() {
        return Err(EngineError::Validation(format!(
            "reorder must name all {} items of day {day}, got {}",
            current.len(),
            ordered_ids.len()
        )));
    }
    for item in &current {
        if !ordered_ids.contains(&item.id) {
            return Err(EngineError::Validation(format!(
                "reorder is missing item {} of day {day}",
                item.id
            )));
        }
    }

    for (position, id) in ordered_ids.iter().enumerate() {
        items::update_item_position(&mut *tx, *id, position as i32).await?;
    }

    reflow_day(&mut tx, trip_id, day, window_start, None).await?;
    bump_version(&mut tx, trip_id, "reorder").await?;

    let result = items::list_items_for_day(&mut *tx, trip_id, day).await?;
    tx.commit()
        .await
        .map_err(|e| EngineError::Storage(e.into()))?;

    info!(trip_id = %trip_id, day, "day reordered");
    Ok(result)
}

/// Pin or unpin an item.
pub async fn toggle_pin(
    pool: &PgPool,
    trip_id: Uuid,
    item_id: Uuid,
    pinned: bool,
) -> EngineResult<()> {
    let mut tx = tx::begin_trip_tx(pool, trip_id).await?;

    let item = require_item(&mut tx, trip_id, item_id).await?;
    items::update_item_pinned(&mut *tx, item.id, pinned).await?;
    bump_version(&mut tx, trip_id, if pinned { "pin" } else { "unpin" }).await?;

    tx.commit()
        .await
        .map_err(|e| EngineError::Storage(e.into()))?;

    info!(trip_id = %trip_id, item_id = %item_id, pinned, "item pin toggled");
    Ok(())
}

/// Move an item to a new start time; its end follows from its duration and
/// the rest of the day re-flows around it.
pub async fn set_start_time(
    pool: &PgPool,
    trip_id: Uuid,
    item_id: Uuid,
    start_time: &str,
) -> EngineResult<Vec<ItineraryItem>> {
    let prefs = load_preferences(pool, trip_id).await?;
    let window_start = parse_window_start(&prefs)?;

    let start: TimeOfDay = start_time
        .parse()
        .map_err(|e| EngineError::Validation(format!("start time: {e}")))?;

    let mut tx = tx::begin_trip_tx(pool, trip_id).await?;

    let item = require_item(&mut tx, trip_id, item_id).await?;
    let end = start
        .checked_add(i64::from(item.duration_minutes))
        .map_err(|e| EngineError::Validation(e.to_string()))?;
    items::update_item_times(&mut *tx, item.id, &start.to_string(), &end.to_string()).await?;

    // The edited item anchors this re-flow so the requested time sticks;
    // everything after it packs behind it.
    reflow_day(&mut tx, trip_id, item.day, window_start, Some(item.id)).await?;
    bump_version(&mut tx, trip_id, "set_start_time").await?;

    let result = items::list_items_for_day(&mut *tx, trip_id, item.day).await?;
    tx.commit()
        .await
        .map_err(|e| EngineError::Storage(e.into()))?;

    info!(trip_id = %trip_id, item_id = %item_id, start = %start, "item start time set");
    Ok(result)
}

/// Remove an item. Pinned items must be unpinned first.
pub async fn remove(pool: &PgPool, trip_id: Uuid, item_id: Uuid) -> EngineResult<()> {
    let prefs = load_preferences(pool, trip_id).await?;
    let window_start = parse_window_start(&prefs)?;

    let mut tx = tx::begin_trip_tx(pool, trip_id).await?;

    let item = require_item(&mut tx, trip_id, item_id).await?;
    if item.is_pinned {
        return Err(EngineError::Validation(format!(
            "item {item_id} is pinned; unpin first"
        )));
    }

    items::delete_item(&mut *tx, item.id).await?;
    reflow_day(&mut tx, trip_id, item.day, window_start, None).await?;
    bump_version(&mut tx, trip_id, "remove").await?;

    tx.commit()
        .await
        .map_err(|e| EngineError::Storage(e.into()))?;

    info!(trip_id = %trip_id, item_id = %item_id, "item removed");
    Ok(())
}

/// Append a POI to the end of a day.
///
/// Without an explicit start, the item lands after the day's last item
/// plus the placement buffer, or at the window start on an empty day.
pub async fn add(
    pool: &PgPool,
    catalog: &dyn PoiCatalog,
    trip_id: Uuid,
    day: i32,
    poi_id: Uuid,
    start_time: Option<&str>,
) -> EngineResult<ItineraryItem> {
    let prefs = load_preferences(pool, trip_id).await?;
    let window_start = parse_window_start(&prefs)?;
    if day < 1 || day > prefs.day_count() {
        return Err(EngineError::Validation(format!(
            "day {day} is outside the trip's {} days",
            prefs.day_count()
        )));
    }

    let poi = catalog
        .get(poi_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("POI {poi_id}")))?;

    let mut tx = tx::begin_trip_tx(pool, trip_id).await?;

    let current = items::list_items_for_day(&mut *tx, trip_id, day).await?;
    let start = match start_time {
        Some(s) => s
            .parse()
            .map_err(|e| EngineError::Validation(format!("start time: {e}")))?,
        None => match current.last() {
            Some(last) => {
                let last_end: TimeOfDay = last
                    .end_time
                    .parse()
                    .map_err(|e| EngineError::Validation(format!("item {}: {e}", last.id)))?;
                last_end
                    .checked_add(PLACEMENT_BUFFER_MINUTES)
                    .map_err(|e| EngineError::Validation(e.to_string()))?
            }
            None => window_start,
        },
    };
    let end = start
        .checked_add(i64::from(poi.avg_duration_minutes))
        .map_err(|e| EngineError::Validation(e.to_string()))?;

    let cost_estimate = poi.price_range.as_ref().map(|range| CostEstimate {
        amount: range.midpoint(),
        currency: range.currency.clone(),
        confidence: CostConfidence::Estimated,
    });

    let inserted = items::insert_item(
        &mut *tx,
        &NewItem {
            trip_id,
            day,
            item_type: ItemType::Poi,
            poi_id: Some(poi.id),
            name: poi.name.clone(),
            location: Some(poi.location.clone()),
            start_time: start.to_string(),
            end_time: end.to_string(),
            duration_minutes: poi.avg_duration_minutes,
            is_pinned: false,
            position: current.len() as i32,
            route_from_previous: None,
            cost_estimate,
            notes: None,
        },
    )
    .await?;

    bump_version(&mut tx, trip_id, "add").await?;

    tx.commit()
        .await
        .map_err(|e| EngineError::Storage(e.into()))?;

    info!(trip_id = %trip_id, poi = %poi.name, day, "item added");
    Ok(inserted)
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

async fn load_preferences(pool: &PgPool, trip_id: Uuid) -> EngineResult<TripPreferences> {
    trips::get_preferences(pool, trip_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("preferences for trip {trip_id}")))
}

fn parse_window_start(prefs: &TripPreferences) -> EngineResult<TimeOfDay> {
    prefs
        .window_start
        .parse()
        .map_err(|e| EngineError::Validation(format!("daily window start: {e}")))
}

/// Fetch an item and check it belongs to the trip.
async fn require_item(
    tx: &mut Transaction<'static, Postgres>,
    trip_id: Uuid,
    item_id: Uuid,
) -> EngineResult<ItineraryItem> {
    let item = items::get_item(&mut **tx, item_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("item {item_id}")))?;
    if item.trip_id != trip_id {
        return Err(EngineError::Conflict(format!(
            "item {item_id} does not belong to trip {trip_id}"
        )));
    }
    Ok(item)
}

/// Re-flow one day: pack item times forward from the window start and
/// renumber positions gap-free.
///
/// Pinned items (and the optional `anchor`) keep their times; the cursor
/// jumps past their ends. Everything else starts at the cursor and runs
/// for its duration.
pub(crate) async fn reflow_day(
    tx: &mut Transaction<'static, Postgres>,
    trip_id: Uuid,
    day: i32,
    window_start: TimeOfDay,
    anchor: Option<Uuid>,
) -> EngineResult<()> {
    let day_items = items::list_items_for_day(&mut **tx, trip_id, day).await?;

    let mut cursor = window_start;
    for (index, item) in day_items.iter().enumerate() {
        let position = index as i32;
        if item.position != position {
            items::update_item_position(&mut **tx, item.id, position).await?;
        }

        let fixed = item.is_pinned || anchor == Some(item.id);
        if fixed {
            let end: TimeOfDay = item
                .end_time
                .parse()
                .map_err(|e| EngineError::Validation(format!("item {}: {e}", item.id)))?;
            if end > cursor {
                cursor = end;
            }
            continue;
        }

        let start = cursor;
        let end = start
            .checked_add(i64::from(item.duration_minutes))
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        if item.start_time != start.to_string() || item.end_time != end.to_string() {
            items::update_item_times(&mut **tx, item.id, &start.to_string(), &end.to_string())
                .await?;
        }
        cursor = end;
    }

    Ok(())
}

/// Bump the itinerary version and append a snapshot of the post-state.
pub(crate) async fn bump_version(
    tx: &mut Transaction<'static, Postgres>,
    trip_id: Uuid,
    change_type: &str,
) -> EngineResult<i32> {
    let next = items::get_itinerary(&mut **tx, trip_id)
        .await?
        .map(|i| i.version)
        .unwrap_or(0)
        + 1;

    items::set_itinerary_version(&mut **tx, trip_id, next).await?;

    let all_items = items::list_items_for_trip(&mut **tx, trip_id).await?;
    versions::insert_version(
        &mut **tx,
        &versions::NewVersion {
            trip_id,
            version: next,
            change_type: change_type.to_string(),
            changed_by: None,
            snapshot: ItinerarySnapshot::from_items(next, &all_items),
            diff: Some(serde_json::json!({ "operation": change_type })),
        },
    )
    .await?;

    Ok(next)
}
