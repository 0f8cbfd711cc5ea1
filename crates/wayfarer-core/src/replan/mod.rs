//! Event -> replan pipeline.
//!
//! Three stages: [`ingest_event`] turns a disruption signal into a
//! persisted [`EventSignal`] (and, when severe enough, a
//! [`ReplanTrigger`]); [`propose`](propose::propose) synthesizes ranked
//! repair proposals for a trigger; [`apply`](apply::apply_proposal)
//! materializes one proposal atomically with a rollback window.

pub mod apply;
pub mod monitor;
pub mod propose;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use wayfarer_db::models::{
    EventDetails, EventSignal, EventType, GeoPoint, ItineraryItem, ReplanTrigger, Severity,
    WeatherCondition,
};
use wayfarer_db::queries::{events, items, trips};

use crate::catalog::PoiCatalog;
use crate::error::{EngineError, EngineResult};
use crate::timegeo::{haversine_km, TimeOfDay};

/// Radius within which a weather event touches an item, in km.
const WEATHER_RADIUS_KM: f64 = 5.0;
/// Radius within which a closure touches an item, in km.
const CLOSURE_RADIUS_KM: f64 = 0.5;

/// Name/tag fragments that mark an item as outdoor-looking.
const OUTDOOR_HINTS: [&str; 7] = [
    "outdoor", "park", "beach", "hiking", "walking", "tour", "market",
];

/// A disruption signal to ingest.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub trip_id: Uuid,
    pub event_type: EventType,
    pub severity: Severity,
    pub location: GeoPoint,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
    pub details: EventDetails,
}

/// Result of ingesting a signal.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub event: EventSignal,
    /// Present when the signal was severe enough to warrant replanning.
    pub trigger: Option<ReplanTrigger>,
}

/// Ingest a disruption signal: compute affected items, persist the event,
/// and emit a replan trigger when the severity rules say so.
pub async fn ingest_event(
    pool: &PgPool,
    catalog: &dyn PoiCatalog,
    request: &IngestRequest,
) -> EngineResult<IngestOutcome> {
    if !request.location.is_valid() {
        return Err(EngineError::Validation(format!(
            "event location ({}, {}) is out of range",
            request.location.lat, request.location.lng
        )));
    }
    if request.slot_start >= request.slot_end {
        return Err(EngineError::Validation(
            "event time slot start must precede its end".into(),
        ));
    }
    if !details_match_type(&request.details, request.event_type) {
        return Err(EngineError::Validation(format!(
            "event details do not match event type {}",
            request.event_type
        )));
    }

    let _trip = trips::get_trip(pool, request.trip_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("trip {}", request.trip_id)))?;
    let prefs = trips::get_preferences(pool, request.trip_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("preferences for trip {}", request.trip_id)))?;

    let current_items = items::list_items_for_trip(pool, request.trip_id).await?;

    let mut affected: Vec<Uuid> = Vec::new();
    for item in &current_items {
        let touches = match request.event_type {
            EventType::Weather => {
                item_overlaps_slot(item, &prefs.date_of_day(item.day), request)?
                    && item_within(item, &request.location, WEATHER_RADIUS_KM)
                    && looks_outdoor(catalog, item).await?
            }
            EventType::Closure => {
                item_overlaps_slot(item, &prefs.date_of_day(item.day), request)?
                    && item_within(item, &request.location, CLOSURE_RADIUS_KM)
            }
            // Other signal kinds carry their subject in the details and do
            // not use spatial matching.
            EventType::SoldOut | EventType::Delay | EventType::AvailabilityChanged => false,
        };
        if touches {
            affected.push(item.id);
        }
    }

    let event = events::insert_event(
        pool,
        &events::NewEventSignal {
            trip_id: request.trip_id,
            event_type: request.event_type,
            severity: request.severity,
            location: request.location.clone(),
            slot_start: request.slot_start,
            slot_end: request.slot_end,
            details: request.details.clone(),
            affected_items: affected,
        },
    )
    .await?;

    let should_trigger = match (&request.details, request.event_type, request.severity) {
        (
            EventDetails::Weather {
                condition: WeatherCondition::HeavyRain,
            },
            EventType::Weather,
            Severity::High,
        ) => true,
        (_, EventType::Closure, Severity::Medium | Severity::High) => true,
        _ => false,
    };

    let trigger = if should_trigger {
        let reason = match request.event_type {
            EventType::Weather => "heavy rain over scheduled outdoor items".to_string(),
            EventType::Closure => "closure affecting scheduled items".to_string(),
            other => format!("{other} signal"),
        };
        let trigger = events::insert_trigger(
            pool,
            request.trip_id,
            event.id,
            &reason,
            request.severity,
        )
        .await?;
        events::mark_event_processed(pool, event.id, true).await?;
        info!(
            trip_id = %request.trip_id,
            event_id = %event.id,
            trigger_id = %trigger.id,
            affected = event.affected_items.len(),
            "replan trigger emitted"
        );
        Some(trigger)
    } else {
        events::mark_event_processed(pool, event.id, false).await?;
        None
    };

    // Re-read so processed/replan_triggered reflect the final state.
    let event = events::get_event(pool, event.id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("event signal {}", event.id)))?;

    Ok(IngestOutcome { event, trigger })
}

/// Whether the typed details agree with the declared event type.
fn details_match_type(details: &EventDetails, event_type: EventType) -> bool {
    matches!(
        (details, event_type),
        (EventDetails::Weather { .. }, EventType::Weather)
            | (EventDetails::Closure { .. }, EventType::Closure)
            | (EventDetails::SoldOut, EventType::SoldOut)
            | (EventDetails::Delay { .. }, EventType::Delay)
            | (EventDetails::AvailabilityChanged, EventType::AvailabilityChanged)
    )
}

/// Whether an item's scheduled slot overlaps the event's slot on the
/// event's date.
fn item_overlaps_slot(
    item: &ItineraryItem,
    item_date: &chrono::NaiveDate,
    request: &IngestRequest,
) -> EngineResult<bool> {
    if *item_date != request.slot_start.date_naive() {
        return Ok(false);
    }

    let item_start: TimeOfDay = item
        .start_time
        .parse()
        .map_err(|e| EngineError::Validation(format!("item {}: {e}", item.id)))?;
    let item_end: TimeOfDay = item
        .end_time
        .parse()
        .map_err(|e| EngineError::Validation(format!("item {}: {e}", item.id)))?;

    let slot_start = time_of_day_utc(&request.slot_start);
    let slot_end = time_of_day_utc(&request.slot_end);

    Ok(item_start < slot_end && slot_start < item_end)
}

fn time_of_day_utc(ts: &DateTime<Utc>) -> TimeOfDay {
    use chrono::Timelike;
    TimeOfDay::from_minutes((ts.hour() * 60 + ts.minute()) as u16).unwrap_or(TimeOfDay::MAX)
}

/// Whether an item has a location within `radius_km` of a point.
fn item_within(item: &ItineraryItem, center: &GeoPoint, radius_km: f64) -> bool {
    match &item.location {
        Some(location) => haversine_km(&location.0, center) <= radius_km,
        None => false,
    }
}

/// Outdoor heuristic: the item name, or its POI's tags, match the outdoor
/// hint set.
async fn looks_outdoor(catalog: &dyn PoiCatalog, item: &ItineraryItem) -> EngineResult<bool> {
    let name = item.name.to_lowercase();
    if OUTDOOR_HINTS.iter().any(|hint| name.contains(hint)) {
        return Ok(true);
    }

    if let Some(poi_id) = item.poi_id {
        if let Some(poi) = catalog.get(poi_id).await? {
            return Ok(poi
                .tags
                .iter()
                .any(|tag| OUTDOOR_HINTS.contains(&tag.as_str())));
        }
    }

    Ok(false)
}
