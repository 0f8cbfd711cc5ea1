//! Proposal synthesis for replan triggers.
//!
//! Each event type has an ordered list of repair strategies. Every
//! strategy that yields a non-empty change set becomes one persisted
//! proposal; the best `max_proposals` by score are returned.

use std::collections::HashMap;

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use wayfarer_db::models::{
    CostConfidence, CostEstimate, EventType, ItemType, ItineraryItem, MovedItem, NewItemSpec,
    ProposalChanges, ProposalImpact, ReplacedItem, ReplanProposal, TripPreferences,
};
use wayfarer_db::queries::{events, items, replans, trips};

use crate::catalog::{Poi, PoiCatalog, PoiFilter};
use crate::error::{EngineError, EngineResult};
use crate::generator::PLACEMENT_BUFFER_MINUTES;
use crate::timegeo::{haversine_km, TimeOfDay};

/// Default cap on proposals returned per trigger.
pub const DEFAULT_MAX_PROPOSALS: usize = 3;

/// Radius for replacement POI searches, in km.
const REPLACEMENT_RADIUS_KM: f64 = 3.0;

/// Generate, persist, and rank proposals for a trigger.
pub async fn propose(
    pool: &PgPool,
    catalog: &dyn PoiCatalog,
    trigger_id: Uuid,
    max_proposals: usize,
) -> EngineResult<Vec<ReplanProposal>> {
    let trigger = events::get_trigger(pool, trigger_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("replan trigger {trigger_id}")))?;
    let event = events::get_event(pool, trigger.event_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("event signal {}", trigger.event_id)))?;
    let prefs = trips::get_preferences(pool, trigger.trip_id)
        .await?
        .ok_or_else(|| {
            EngineError::NotFound(format!("preferences for trip {}", trigger.trip_id))
        })?;

    let current = items::list_items_for_trip(pool, trigger.trip_id).await?;
    let by_id: HashMap<Uuid, &ItineraryItem> = current.iter().map(|i| (i.id, i)).collect();

    // Pinned items are immune to replanning.
    let affected: Vec<&ItineraryItem> = event
        .affected_items
        .iter()
        .filter_map(|id| by_id.get(id).copied())
        .filter(|item| !item.is_pinned)
        .collect();

    if affected.is_empty() {
        info!(trigger_id = %trigger_id, "no unpinned affected items; nothing to propose");
        return Ok(Vec::new());
    }

    let mut candidates: Vec<(String, ProposalChanges)> = Vec::new();
    match event.event_type {
        EventType::Weather => {
            if let Some(changes) = replace_strategy(catalog, &affected, &["indoor"]).await? {
                candidates.push((
                    "replace affected outdoor items with nearby indoor alternatives".into(),
                    changes,
                ));
            }
            if let Some(changes) = move_to_other_day_strategy(&prefs, &current, &affected)? {
                candidates.push(("move affected items to a day with open slots".into(), changes));
            }
            candidates.push((
                "remove the affected items".into(),
                remove_strategy(&affected),
            ));
        }
        EventType::Closure => {
            if let Some(changes) = replace_similar_strategy(catalog, &affected).await? {
                candidates.push(("replace with a similar nearby alternative".into(), changes));
            }
            if let Some(changes) = move_same_day_strategy(&prefs, &current, &affected)? {
                candidates.push((
                    "move affected items to a later slot on the same day".into(),
                    changes,
                ));
            }
        }
        _ => {}
    }

    let mut proposals: Vec<ReplanProposal> = Vec::new();
    for (explanation, changes) in candidates {
        if changes.is_empty() {
            continue;
        }
        let impact = compute_impact(&changes, &by_id);
        let score = score_proposal(&impact);
        let proposal = replans::insert_proposal(
            pool,
            &replans::NewProposal {
                trip_id: trigger.trip_id,
                trigger_id: trigger.id,
                score,
                explanation,
                changes,
                impact,
            },
        )
        .await?;
        proposals.push(proposal);
    }

    info!(
        trigger_id = %trigger_id,
        generated = proposals.len(),
        "proposals generated"
    );

    proposals.sort_by(|a, b| b.score.total_cmp(&a.score));
    proposals.truncate(max_proposals);
    Ok(proposals)
}

/// Estimated impact of a change set against the current itinerary.
fn compute_impact(
    changes: &ProposalChanges,
    by_id: &HashMap<Uuid, &ItineraryItem>,
) -> ProposalImpact {
    let mut time_change_minutes = 0i64;
    let mut cost_change = 0.0f64;
    let mut distance_change_km = 0.0f64;

    for replaced in &changes.replaced_items {
        if let Some(old) = by_id.get(&replaced.old_item_id) {
            time_change_minutes +=
                i64::from(replaced.new_item.duration_minutes) - i64::from(old.duration_minutes);
            if let Some(old_cost) = &old.cost_estimate {
                cost_change -= old_cost.amount;
            }
            if let (Some(old_location), Some(new_location)) =
                (&old.location, &replaced.new_item.location)
            {
                distance_change_km += haversine_km(&old_location.0, new_location);
            }
        }
        if let Some(new_cost) = &replaced.new_item.cost_estimate {
            cost_change += new_cost.amount;
        }
    }
    for added in &changes.added_items {
        if let Some(cost) = &added.cost_estimate {
            cost_change += cost.amount;
        }
    }
    for removed_id in &changes.removed_items {
        if let Some(old) = by_id.get(removed_id) {
            if let Some(cost) = &old.cost_estimate {
                cost_change -= cost.amount;
            }
        }
    }

    let disruption_score = (0.3 * changes.replaced_items.len() as f64
        + 0.2 * changes.moved_items.len() as f64
        + 0.4 * changes.removed_items.len() as f64
        + 0.1 * changes.added_items.len() as f64)
        .min(1.0);

    ProposalImpact {
        time_change_minutes,
        cost_change,
        distance_change_km,
        disruption_score,
    }
}

/// Score a proposal from its impact, clamped to [0, 1].
fn score_proposal(impact: &ProposalImpact) -> f64 {
    let mut score = 1.0 - 0.5 * impact.disruption_score;
    if impact.cost_change < 0.0 {
        score += 0.2;
    } else if impact.cost_change > 0.0 {
        score -= 0.1;
    }
    if impact.time_change_minutes.abs() > 60 {
        score -= 0.1;
    }
    score.clamp(0.0, 1.0)
}

/// Strategy: replace each affected item with the nearest POI carrying one
/// of `tags` within [`REPLACEMENT_RADIUS_KM`].
async fn replace_strategy(
    catalog: &dyn PoiCatalog,
    affected: &[&ItineraryItem],
    tags: &[&str],
) -> EngineResult<Option<ProposalChanges>> {
    let mut changes = ProposalChanges::default();

    for item in affected {
        let Some(location) = &item.location else {
            continue;
        };
        let hits = catalog
            .search(&PoiFilter {
                near: Some((location.0.clone(), REPLACEMENT_RADIUS_KM)),
                any_tags: tags.iter().map(|t| t.to_string()).collect(),
                limit: 3,
            })
            .await?;
        let Some(replacement) = hits.into_iter().find(|p| Some(p.id) != item.poi_id) else {
            continue;
        };
        if let Some(spec) = replacement_spec(item, &replacement)? {
            changes.replaced_items.push(ReplacedItem {
                old_item_id: item.id,
                new_item: spec,
            });
        }
    }

    Ok((!changes.is_empty()).then_some(changes))
}

/// Strategy: replace each affected item with a nearby POI sharing at least
/// one of its POI's tags.
async fn replace_similar_strategy(
    catalog: &dyn PoiCatalog,
    affected: &[&ItineraryItem],
) -> EngineResult<Option<ProposalChanges>> {
    let mut changes = ProposalChanges::default();

    for item in affected {
        let Some(poi_id) = item.poi_id else { continue };
        let Some(original) = catalog.get(poi_id).await? else {
            continue;
        };
        let Some(location) = &item.location else {
            continue;
        };
        let hits = catalog
            .search(&PoiFilter {
                near: Some((location.0.clone(), REPLACEMENT_RADIUS_KM)),
                any_tags: original.tags.clone(),
                limit: 3,
            })
            .await?;
        let Some(replacement) = hits.into_iter().find(|p| p.id != original.id) else {
            continue;
        };
        if let Some(spec) = replacement_spec(item, &replacement)? {
            changes.replaced_items.push(ReplacedItem {
                old_item_id: item.id,
                new_item: spec,
            });
        }
    }

    Ok((!changes.is_empty()).then_some(changes))
}

/// Build the replacement spec: same slot start, the replacement's own
/// duration. `None` when the replacement would run past midnight.
fn replacement_spec(item: &ItineraryItem, replacement: &Poi) -> EngineResult<Option<NewItemSpec>> {
    let start: TimeOfDay = item
        .start_time
        .parse()
        .map_err(|e| EngineError::Validation(format!("item {}: {e}", item.id)))?;
    let Ok(end) = start.checked_add(i64::from(replacement.avg_duration_minutes)) else {
        return Ok(None);
    };

    Ok(Some(NewItemSpec {
        day: item.day,
        item_type: ItemType::Poi,
        poi_id: Some(replacement.id),
        name: replacement.name.clone(),
        location: Some(replacement.location.clone()),
        start_time: start.to_string(),
        end_time: end.to_string(),
        duration_minutes: replacement.avg_duration_minutes,
        cost_estimate: replacement.price_range.as_ref().map(|range| CostEstimate {
            amount: range.midpoint(),
            currency: range.currency.clone(),
            confidence: CostConfidence::Estimated,
        }),
    }))
}

/// Strategy: move each affected item to another day with a free slot
/// inside the trip's configured daily window.
fn move_to_other_day_strategy(
    prefs: &TripPreferences,
    current: &[ItineraryItem],
    affected: &[&ItineraryItem],
) -> EngineResult<Option<ProposalChanges>> {
    let window_start: TimeOfDay = prefs
        .window_start
        .parse()
        .map_err(|e| EngineError::Validation(format!("daily window start: {e}")))?;
    let window_end: TimeOfDay = prefs
        .window_end
        .parse()
        .map_err(|e| EngineError::Validation(format!("daily window end: {e}")))?;

    let mut changes = ProposalChanges::default();
    // Track slots consumed by earlier moves in this same proposal.
    let mut extra_ends: HashMap<i32, TimeOfDay> = HashMap::new();

    for item in affected {
        for day in 1..=prefs.day_count() {
            if day == item.day {
                continue;
            }
            let slot = free_slot_on_day(
                current,
                day,
                window_start,
                window_end,
                item.duration_minutes,
                extra_ends.get(&day).copied(),
            )?;
            if let Some(start) = slot {
                let end = start
                    .checked_add(i64::from(item.duration_minutes))
                    .map_err(|e| EngineError::Validation(e.to_string()))?;
                extra_ends.insert(day, end);
                changes.moved_items.push(MovedItem {
                    item_id: item.id,
                    day,
                    start_time: start.to_string(),
                });
                break;
            }
        }
    }

    Ok((!changes.is_empty()).then_some(changes))
}

/// Strategy: move each affected item to a later slot on its own day.
fn move_same_day_strategy(
    prefs: &TripPreferences,
    current: &[ItineraryItem],
    affected: &[&ItineraryItem],
) -> EngineResult<Option<ProposalChanges>> {
    let window_start: TimeOfDay = prefs
        .window_start
        .parse()
        .map_err(|e| EngineError::Validation(format!("daily window start: {e}")))?;
    let window_end: TimeOfDay = prefs
        .window_end
        .parse()
        .map_err(|e| EngineError::Validation(format!("daily window end: {e}")))?;

    let mut changes = ProposalChanges::default();
    let mut extra_ends: HashMap<i32, TimeOfDay> = HashMap::new();

    for item in affected {
        let slot = free_slot_on_day(
            current,
            item.day,
            window_start,
            window_end,
            item.duration_minutes,
            extra_ends.get(&item.day).copied(),
        )?;
        if let Some(start) = slot {
            // A "move" to the identical slot is no repair at all.
            if start.to_string() == item.start_time {
                continue;
            }
            let end = start
                .checked_add(i64::from(item.duration_minutes))
                .map_err(|e| EngineError::Validation(e.to_string()))?;
            extra_ends.insert(item.day, end);
            changes.moved_items.push(MovedItem {
                item_id: item.id,
                day: item.day,
                start_time: start.to_string(),
            });
        }
    }

    Ok((!changes.is_empty()).then_some(changes))
}

/// Strategy: drop the affected items.
fn remove_strategy(affected: &[&ItineraryItem]) -> ProposalChanges {
    ProposalChanges {
        removed_items: affected.iter().map(|i| i.id).collect(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;

    fn impact(moved: usize, removed: usize) -> ProposalImpact {
        let changes = ProposalChanges {
            moved_items: (0..moved)
                .map(|_| MovedItem {
                    item_id: Uuid::new_v4(),
                    day: 1,
                    start_time: "10:00".into(),
                })
                .collect(),
            removed_items: (0..removed).map(|_| Uuid::new_v4()).collect(),
            ..Default::default()
        };
        compute_impact(&changes, &HashMap::new())
    }

    #[test]
    fn disruption_score_follows_the_weights() {
        assert!((impact(1, 0).disruption_score - 0.2).abs() < 1e-9);
        assert!((impact(0, 1).disruption_score - 0.4).abs() < 1e-9);
        assert!((impact(2, 1).disruption_score - 0.8).abs() < 1e-9);
        // Saturates at 1.
        assert!((impact(0, 5).disruption_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn score_rewards_savings_and_penalizes_upheaval() {
        let base = ProposalImpact {
            time_change_minutes: 0,
            cost_change: 0.0,
            distance_change_km: 0.0,
            disruption_score: 0.3,
        };
        assert!((score_proposal(&base) - 0.85).abs() < 1e-9);

        let cheaper = ProposalImpact {
            cost_change: -100.0,
            ..base.clone()
        };
        assert!((score_proposal(&cheaper) - 1.0).abs() < 1e-9, "clamped at 1");

        let pricier_and_longer = ProposalImpact {
            cost_change: 250.0,
            time_change_minutes: 90,
            ..base.clone()
        };
        assert!((score_proposal(&pricier_and_longer) - 0.65).abs() < 1e-9);

        let catastrophic = ProposalImpact {
            disruption_score: 1.0,
            cost_change: 1.0,
            time_change_minutes: 600,
            distance_change_km: 0.0,
        };
        let score = score_proposal(&catastrophic);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn replaced_cost_and_time_deltas_are_computed() {
        let old_item = wayfarer_db::models::ItineraryItem {
            id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            day: 1,
            item_type: ItemType::Poi,
            poi_id: None,
            name: "Old".into(),
            location: None,
            start_time: "10:00".into(),
            end_time: "12:00".into(),
            duration_minutes: 120,
            is_pinned: false,
            position: 0,
            route_from_previous: None,
            cost_estimate: Some(Json(CostEstimate {
                amount: 500.0,
                currency: "THB".into(),
                confidence: CostConfidence::Estimated,
            })),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let changes = ProposalChanges {
            replaced_items: vec![ReplacedItem {
                old_item_id: old_item.id,
                new_item: NewItemSpec {
                    day: 1,
                    item_type: ItemType::Poi,
                    poi_id: None,
                    name: "New".into(),
                    location: None,
                    start_time: "10:00".into(),
                    end_time: "11:30".into(),
                    duration_minutes: 90,
                    cost_estimate: Some(CostEstimate {
                        amount: 300.0,
                        currency: "THB".into(),
                        confidence: CostConfidence::Estimated,
                    }),
                },
            }],
            ..Default::default()
        };
        let mut by_id = HashMap::new();
        by_id.insert(old_item.id, &old_item);

        let impact = compute_impact(&changes, &by_id);
        assert_eq!(impact.time_change_minutes, -30);
        assert!((impact.cost_change - (-200.0)).abs() < 1e-9);
        assert!((impact.disruption_score - 0.3).abs() < 1e-9);
    }
}

/// Earliest start on `day` after every existing item (plus buffer) where
/// `duration_minutes` still fits inside the window.
fn free_slot_on_day(
    current: &[ItineraryItem],
    day: i32,
    window_start: TimeOfDay,
    window_end: TimeOfDay,
    duration_minutes: i32,
    reserved_until: Option<TimeOfDay>,
) -> EngineResult<Option<TimeOfDay>> {
    let mut cursor = window_start;
    for item in current.iter().filter(|i| i.day == day) {
        let end: TimeOfDay = item
            .end_time
            .parse()
            .map_err(|e| EngineError::Validation(format!("item {}: {e}", item.id)))?;
        if end > cursor {
            cursor = end;
        }
    }
    if let Some(reserved) = reserved_until {
        if reserved > cursor {
            cursor = reserved;
        }
    }

    if cursor > window_start {
        cursor = match cursor.checked_add(PLACEMENT_BUFFER_MINUTES) {
            Ok(t) => t,
            Err(_) => return Ok(None),
        };
    }

    let Ok(end) = cursor.checked_add(i64::from(duration_minutes)) else {
        return Ok(None);
    };
    Ok((end <= window_end).then_some(cursor))
}
