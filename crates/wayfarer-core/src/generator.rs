//! Itinerary generation.
//!
//! Takes trip preferences plus a selected POI set and lays the POIs out
//! across the trip's days: round-robin day assignment, then a forward
//! cursor within each day that respects opening hours, the daily window,
//! travel legs, and pinned items from a prior itinerary. Re-running on
//! identical inputs is deterministic.

use std::collections::HashMap;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use wayfarer_db::models::{
    CostConfidence, CostEstimate, GeoPoint, ItemType, ItineraryItem, ItinerarySnapshot,
    RouteSegment, TravelMode, TripPreferences,
};
use wayfarer_db::queries::items::{self, NewItem};
use wayfarer_db::queries::{trips, versions};
use wayfarer_db::tx;

use crate::catalog::{HoursSpec, Poi, PoiCatalog};
use crate::error::{EngineError, EngineResult};
use crate::routing::{RoutePlanner, RouteRequest, FALLBACK_LEG_MINUTES};
use crate::timegeo::{haversine_km, weekday_key, TimeOfDay};

/// Minutes of slack inserted before every scheduled visit.
pub const PLACEMENT_BUFFER_MINUTES: i64 = 15;

/// External collaborators the generator reads through.
pub struct GeneratorDeps<'a> {
    pub pool: &'a PgPool,
    pub catalog: &'a dyn PoiCatalog,
    /// When absent, legs use straight-line distance and
    /// [`FALLBACK_LEG_MINUTES`].
    pub planner: Option<&'a dyn RoutePlanner>,
}

/// Whether this run replaces the whole plan or folds into an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenerateMode {
    Full,
    Incremental,
}

/// A generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub trip_id: Uuid,
    /// Selected POIs, in user order. Duplicates are kept; callers own
    /// de-duplication.
    pub poi_ids: Vec<Uuid>,
    /// Keep pinned items from the prior itinerary in place.
    pub preserve_pinned: bool,
    pub mode: RegenerateMode,
}

/// Summary of one generated day.
#[derive(Debug, Clone)]
pub struct GeneratedDay {
    pub day: i32,
    pub items: Vec<ItineraryItem>,
    /// Sum of item cost-estimate midpoints.
    pub total_cost: f64,
    /// Sum of route-leg durations.
    pub travel_minutes: i64,
}

/// Result of a generation run.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub version: i32,
    pub days: Vec<GeneratedDay>,
}

/// An item placed by the scheduler but not yet persisted.
struct PlannedItem {
    poi: Poi,
    start: TimeOfDay,
    end: TimeOfDay,
    route: Option<PlannedRoute>,
}

struct PlannedRoute {
    distance_km: f64,
    duration_minutes: i32,
}

/// Generate a fresh itinerary for a trip.
///
/// Within one trip-scoped transaction: deletes all non-pinned items,
/// inserts the newly placed items, bumps the itinerary version, and
/// appends a version snapshot.
pub async fn generate(
    deps: &GeneratorDeps<'_>,
    request: &GenerateRequest,
) -> EngineResult<GenerateOutcome> {
    let trip = trips::get_trip(deps.pool, request.trip_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("trip {}", request.trip_id)))?;
    let prefs = trips::get_preferences(deps.pool, trip.id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("preferences for trip {}", trip.id)))?;

    let window_start: TimeOfDay = prefs
        .window_start
        .parse()
        .map_err(|e| EngineError::Validation(format!("daily window start: {e}")))?;
    let window_end: TimeOfDay = prefs
        .window_end
        .parse()
        .map_err(|e| EngineError::Validation(format!("daily window end: {e}")))?;
    if window_start >= window_end {
        return Err(EngineError::Validation(
            "daily window start must precede its end".into(),
        ));
    }

    // Resolve the selected POIs; unresolvable ids are skipped with a
    // warning, but an entirely unresolvable selection is an error.
    let mut pois: Vec<Poi> = Vec::with_capacity(request.poi_ids.len());
    for poi_id in &request.poi_ids {
        match deps.catalog.get(*poi_id).await? {
            Some(poi) => pois.push(poi),
            None => warn!(trip_id = %trip.id, poi_id = %poi_id, "selected POI not found in catalog; skipping"),
        }
    }
    if pois.is_empty() {
        return Err(EngineError::Validation(
            "none of the selected POIs could be resolved".into(),
        ));
    }

    let day_count = prefs.day_count();

    // Pinned items from the prior itinerary, grouped per day.
    let mut pinned_by_day: HashMap<i32, Vec<ItineraryItem>> = HashMap::new();
    if request.preserve_pinned {
        for item in items::list_items_for_trip(deps.pool, trip.id).await? {
            if item.is_pinned {
                pinned_by_day.entry(item.day).or_default().push(item);
            }
        }
    }

    // Round-robin the POIs into day buckets.
    let mut buckets: Vec<Vec<Poi>> = vec![Vec::new(); day_count as usize];
    for (index, poi) in pois.into_iter().enumerate() {
        buckets[index % day_count as usize].push(poi);
    }

    // Schedule each day.
    let mut planned: Vec<(i32, Vec<PlannedItem>)> = Vec::with_capacity(day_count as usize);
    for day in 1..=day_count {
        let pinned = pinned_by_day.entry(day).or_default();
        pinned.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        let day_plan = schedule_day(
            deps,
            &prefs,
            day,
            pinned,
            &buckets[(day - 1) as usize],
            window_start,
            window_end,
        )
        .await?;
        planned.push((day, day_plan));
    }

    // Persist everything under the trip's transactional scope.
    let mut tx = tx::begin_trip_tx(deps.pool, trip.id).await?;

    let prior_version = items::get_itinerary(&mut *tx, trip.id)
        .await?
        .map(|i| i.version)
        .unwrap_or(0);
    let next_version = prior_version + 1;

    items::delete_unpinned_items(&mut *tx, trip.id).await?;

    for (day, day_plan) in &planned {
        let pinned = pinned_by_day.get(day).cloned().unwrap_or_default();
        let mut position = 0i32;
        let mut previous_id: Option<Uuid> = None;

        for item in &pinned {
            items::update_item_position(&mut *tx, item.id, position).await?;
            position += 1;
            previous_id = Some(item.id);
        }

        for p in day_plan {
            let route = p.route.as_ref().map(|r| RouteSegment {
                from_item_id: previous_id,
                mode: TravelMode::Walking,
                distance_km: r.distance_km,
                duration_minutes: r.duration_minutes,
                cost_estimate: None,
            });
            let cost_estimate = p.poi.price_range.as_ref().map(|range| CostEstimate {
                amount: range.midpoint(),
                currency: range.currency.clone(),
                confidence: CostConfidence::Estimated,
            });
            let inserted = items::insert_item(
                &mut *tx,
                &NewItem {
                    trip_id: trip.id,
                    day: *day,
                    item_type: ItemType::Poi,
                    poi_id: Some(p.poi.id),
                    name: p.poi.name.clone(),
                    location: Some(p.poi.location.clone()),
                    start_time: p.start.to_string(),
                    end_time: p.end.to_string(),
                    duration_minutes: p.poi.avg_duration_minutes,
                    is_pinned: false,
                    position,
                    route_from_previous: route,
                    cost_estimate,
                    notes: None,
                },
            )
            .await?;
            previous_id = Some(inserted.id);
            position += 1;
        }
    }

    items::set_itinerary_version(&mut *tx, trip.id, next_version).await?;

    let all_items = items::list_items_for_trip(&mut *tx, trip.id).await?;
    let change_type = match request.mode {
        RegenerateMode::Full => "generate",
        RegenerateMode::Incremental => "edit",
    };
    versions::insert_version(
        &mut *tx,
        &versions::NewVersion {
            trip_id: trip.id,
            version: next_version,
            change_type: change_type.to_string(),
            changed_by: None,
            snapshot: ItinerarySnapshot::from_items(next_version, &all_items),
            diff: None,
        },
    )
    .await?;

    tx.commit()
        .await
        .map_err(|e| EngineError::Storage(e.into()))?;

    // Build the per-day summaries from the committed state.
    let mut days: Vec<GeneratedDay> = (1..=day_count)
        .map(|day| GeneratedDay {
            day,
            items: Vec::new(),
            total_cost: 0.0,
            travel_minutes: 0,
        })
        .collect();
    for item in all_items {
        // Pinned leftovers can sit on days past the current date range.
        let Some(entry) = days.get_mut((item.day - 1) as usize) else {
            continue;
        };
        if let Some(cost) = &item.cost_estimate {
            entry.total_cost += cost.amount;
        }
        if let Some(route) = &item.route_from_previous {
            entry.travel_minutes += i64::from(route.duration_minutes);
        }
        entry.items.push(item);
    }

    info!(
        trip_id = %trip.id,
        version = next_version,
        days = day_count,
        items = days.iter().map(|d| d.items.len()).sum::<usize>(),
        "itinerary generated"
    );

    Ok(GenerateOutcome {
        version: next_version,
        days,
    })
}

/// Place one day's POIs after its pinned items.
async fn schedule_day(
    deps: &GeneratorDeps<'_>,
    prefs: &TripPreferences,
    day: i32,
    pinned: &[ItineraryItem],
    pois: &[Poi],
    window_start: TimeOfDay,
    window_end: TimeOfDay,
) -> EngineResult<Vec<PlannedItem>> {
    let weekday = weekday_key(prefs.date_of_day(day));

    let mut cursor = window_start;
    let mut previous_location: Option<GeoPoint> = None;

    // Pinned items keep their times; the cursor starts past the latest
    // pinned end.
    for item in pinned {
        let end: TimeOfDay = item
            .end_time
            .parse()
            .map_err(|e| EngineError::Validation(format!("pinned item {}: {e}", item.id)))?;
        if end > cursor {
            cursor = end;
        }
        if let Some(location) = &item.location {
            previous_location = Some(location.0.clone());
        }
    }

    let mut placed: Vec<PlannedItem> = Vec::new();
    for poi in pois {
        let hours = match poi.hours.on(weekday) {
            HoursSpec::Open(h) => Some(h),
            HoursSpec::Unknown => None,
            HoursSpec::Closed => {
                warn!(poi = %poi.name, day, weekday, "POI closed on this day; skipping");
                continue;
            }
        };

        let mut candidate_start = match hours {
            Some(h) if h.open > cursor => h.open,
            _ => cursor,
        };

        // Travel leg from the previous placed item, when it has a location.
        let route = match &previous_location {
            Some(from) => {
                let (distance_km, duration_minutes) = match deps.planner {
                    Some(planner) => {
                        let estimate = planner
                            .compute_route(&RouteRequest {
                                from: from.clone(),
                                to: poi.location.clone(),
                                mode: TravelMode::Walking,
                                departure_time: Some(candidate_start),
                            })
                            .await?;
                        (estimate.distance_km, estimate.duration_minutes)
                    }
                    None => (haversine_km(from, &poi.location), FALLBACK_LEG_MINUTES),
                };
                candidate_start = match candidate_start.checked_add(i64::from(duration_minutes)) {
                    Ok(t) => t,
                    Err(_) => {
                        warn!(poi = %poi.name, day, "travel leg pushes item past midnight; skipping");
                        continue;
                    }
                };
                Some(PlannedRoute {
                    distance_km,
                    duration_minutes,
                })
            }
            None => None,
        };

        candidate_start = match candidate_start.checked_add(PLACEMENT_BUFFER_MINUTES) {
            Ok(t) => t,
            Err(_) => {
                warn!(poi = %poi.name, day, "buffer pushes item past midnight; skipping");
                continue;
            }
        };

        let candidate_end = match candidate_start.checked_add(i64::from(poi.avg_duration_minutes)) {
            Ok(t) => t,
            Err(_) => {
                warn!(poi = %poi.name, day, "visit would cross midnight; skipping");
                continue;
            }
        };

        if let Some(h) = hours {
            if candidate_end > h.close {
                warn!(poi = %poi.name, day, close = %h.close, "visit would end after closing; skipping");
                continue;
            }
        }
        if candidate_end > window_end {
            warn!(poi = %poi.name, day, window_end = %window_end, "visit would end after the daily window; skipping");
            continue;
        }

        previous_location = Some(poi.location.clone());
        cursor = candidate_end;
        placed.push(PlannedItem {
            poi: poi.clone(),
            start: candidate_start,
            end: candidate_end,
            route,
        });
    }

    Ok(placed)
}
