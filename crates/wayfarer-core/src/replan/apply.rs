//! Transactional proposal application and rollback.
//!
//! Apply swaps items under the trip's transactional scope and bumps the
//! itinerary version; every apply opens a 24-hour rollback window during
//! which the pre-apply snapshot can be restored exactly once.

use std::collections::{BTreeSet, HashMap};

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use wayfarer_db::models::{
    ItineraryItem, ItinerarySnapshot, ProposalChanges, ReplanApplication,
};
use wayfarer_db::queries::items::{self, NewItem};
use wayfarer_db::queries::{events, replans, versions};
use wayfarer_db::tx;

use crate::catalog::PoiCatalog;
use crate::error::{EngineError, EngineResult};
use crate::timegeo::TimeOfDay;

/// How long after an apply the pre-state stays restorable.
pub const ROLLBACK_WINDOW_HOURS: i64 = 24;

/// Result of applying a proposal.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub application: ReplanApplication,
    /// The version produced by the apply.
    pub version: i32,
    /// Post-commit validation findings. Informational only; the apply is
    /// already committed.
    pub warnings: Vec<String>,
}

/// Apply a proposal atomically.
///
/// The caller-supplied `idempotency_key` is enforced strictly: replaying a
/// key that already applied a proposal is rejected with
/// [`EngineError::IdempotencyConflict`].
pub async fn apply_proposal(
    pool: &PgPool,
    catalog: &dyn PoiCatalog,
    proposal_id: Uuid,
    idempotency_key: &str,
) -> EngineResult<ApplyOutcome> {
    if idempotency_key.is_empty() {
        return Err(EngineError::Validation(
            "apply requires an idempotency key".into(),
        ));
    }
    if replans::get_application_by_key(pool, idempotency_key)
        .await?
        .is_some()
    {
        return Err(EngineError::IdempotencyConflict(
            idempotency_key.to_string(),
        ));
    }

    let proposal = replans::get_proposal(pool, proposal_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("replan proposal {proposal_id}")))?;
    let changes: &ProposalChanges = &proposal.changes;
    if changes.is_empty() {
        return Err(EngineError::ReplanFailed(format!(
            "proposal {proposal_id} has an empty change set"
        )));
    }

    let mut tx = tx::begin_trip_tx(pool, proposal.trip_id).await?;

    // 1. Current version; applying requires an itinerary to exist.
    let head = items::get_itinerary(&mut *tx, proposal.trip_id)
        .await?
        .ok_or_else(|| {
            EngineError::Conflict(format!("trip {} has no itinerary to replan", proposal.trip_id))
        })?;
    let current_version = head.version;

    let pre_items = items::list_items_for_trip(&mut *tx, proposal.trip_id).await?;
    let by_id: HashMap<Uuid, &ItineraryItem> = pre_items.iter().map(|i| (i.id, i)).collect();

    // Pinned items are immune; a proposal that grew stale against a pin is
    // rejected wholesale.
    let touched_ids = changes
        .removed_items
        .iter()
        .copied()
        .chain(changes.replaced_items.iter().map(|r| r.old_item_id))
        .chain(changes.moved_items.iter().map(|m| m.item_id));
    for id in touched_ids {
        match by_id.get(&id) {
            None => {
                return Err(EngineError::Conflict(format!(
                    "proposal {proposal_id} references item {id} which no longer exists"
                )))
            }
            Some(item) if item.is_pinned => {
                return Err(EngineError::Conflict(format!(
                    "proposal {proposal_id} would change pinned item {id}"
                )))
            }
            Some(_) => {}
        }
    }

    // 2. Ensure the pre-state snapshot exists at the current version.
    if versions::get_version(&mut *tx, proposal.trip_id, current_version)
        .await?
        .is_none()
    {
        versions::insert_version(
            &mut *tx,
            &versions::NewVersion {
                trip_id: proposal.trip_id,
                version: current_version,
                change_type: "replan".to_string(),
                changed_by: None,
                snapshot: ItinerarySnapshot::from_items(current_version, &pre_items),
                diff: None,
            },
        )
        .await?;
    }

    // Days whose ordering is disturbed.
    let mut affected_days: BTreeSet<i32> = BTreeSet::new();

    // 3. Delete removed and replaced-out items.
    let mut to_delete: Vec<Uuid> = changes.removed_items.clone();
    to_delete.extend(changes.replaced_items.iter().map(|r| r.old_item_id));
    for id in &to_delete {
        if let Some(item) = by_id.get(id) {
            affected_days.insert(item.day);
        }
    }
    if !to_delete.is_empty() {
        items::delete_items(&mut *tx, &to_delete).await?;
    }

    // 4. Insert replacements and additions.
    let new_specs = changes
        .replaced_items
        .iter()
        .map(|r| &r.new_item)
        .chain(changes.added_items.iter());
    for spec in new_specs {
        affected_days.insert(spec.day);
        items::insert_item(
            &mut *tx,
            &NewItem {
                trip_id: proposal.trip_id,
                day: spec.day,
                item_type: spec.item_type,
                poi_id: spec.poi_id,
                name: spec.name.clone(),
                location: spec.location.clone(),
                start_time: spec.start_time.clone(),
                end_time: spec.end_time.clone(),
                duration_minutes: spec.duration_minutes,
                is_pinned: false,
                // Renumbered below once the day is complete.
                position: 0,
                route_from_previous: None,
                cost_estimate: spec.cost_estimate.clone(),
                notes: None,
            },
        )
        .await?;
    }

    // 5. Reschedule moved items; duration is preserved, end recomputed.
    for moved in &changes.moved_items {
        let item = by_id.get(&moved.item_id).expect("validated above");
        let start: TimeOfDay = moved
            .start_time
            .parse()
            .map_err(|e| EngineError::Validation(format!("moved item {}: {e}", moved.item_id)))?;
        let end = start
            .checked_add(i64::from(item.duration_minutes))
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        items::update_item_schedule(
            &mut *tx,
            moved.item_id,
            moved.day,
            &start.to_string(),
            &end.to_string(),
        )
        .await?;
        affected_days.insert(item.day);
        affected_days.insert(moved.day);
    }

    // 6. Renumber every affected day by ascending start time.
    for day in &affected_days {
        let mut day_items = items::list_items_for_day(&mut *tx, proposal.trip_id, *day).await?;
        day_items.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        for (position, item) in day_items.iter().enumerate() {
            if item.position != position as i32 {
                items::update_item_position(&mut *tx, item.id, position as i32).await?;
            }
        }
    }

    // 7. Bump the version and snapshot the post-state.
    let applied_version = current_version + 1;
    items::set_itinerary_version(&mut *tx, proposal.trip_id, applied_version).await?;

    let post_items = items::list_items_for_trip(&mut *tx, proposal.trip_id).await?;
    versions::insert_version(
        &mut *tx,
        &versions::NewVersion {
            trip_id: proposal.trip_id,
            version: applied_version,
            change_type: "replan".to_string(),
            changed_by: None,
            snapshot: ItinerarySnapshot::from_items(applied_version, &post_items),
            diff: Some(serde_json::json!({
                "proposal_id": proposal.id,
                "replaced": changes.replaced_items.len(),
                "moved": changes.moved_items.len(),
                "removed": changes.removed_items.len(),
                "added": changes.added_items.len(),
            })),
        },
    )
    .await?;

    // 8. Record the application with its rollback window.
    let application = replans::insert_application(
        &mut *tx,
        proposal.trip_id,
        proposal.id,
        idempotency_key,
        applied_version,
        Utc::now() + Duration::hours(ROLLBACK_WINDOW_HOURS),
    )
    .await?;

    // 9. Mark the source trigger processed.
    events::mark_trigger_processed(&mut *tx, proposal.trigger_id).await?;

    // 10. Commit.
    tx.commit()
        .await
        .map_err(|e| EngineError::Storage(e.into()))?;

    info!(
        trip_id = %proposal.trip_id,
        proposal_id = %proposal.id,
        version = applied_version,
        "replan applied"
    );

    // Post-commit validation: informational, never reverts.
    let warnings = validate_applied_itinerary(catalog, &post_items).await?;
    for warning in &warnings {
        warn!(trip_id = %proposal.trip_id, warning, "post-apply validation");
    }

    Ok(ApplyOutcome {
        application,
        version: applied_version,
        warnings,
    })
}

/// Post-apply checks: every POI still resolves and no intra-day overlap
/// remains. Findings are returned as warnings.
pub async fn validate_applied_itinerary(
    catalog: &dyn PoiCatalog,
    applied_items: &[ItineraryItem],
) -> EngineResult<Vec<String>> {
    let mut warnings = Vec::new();

    let mut previous: Option<&ItineraryItem> = None;
    for item in applied_items {
        if let Some(poi_id) = item.poi_id {
            if catalog.get(poi_id).await?.is_none() {
                warnings.push(format!(
                    "item {:?} references POI {poi_id} which no longer resolves",
                    item.name
                ));
            }
        }

        if let Some(prev) = previous {
            if prev.day == item.day && item.start_time < prev.end_time {
                warnings.push(format!(
                    "day {}: {:?} starts at {} before {:?} ends at {}",
                    item.day, item.name, item.start_time, prev.name, prev.end_time
                ));
            }
        }
        previous = Some(item);
    }

    Ok(warnings)
}

/// Roll an application back, restoring the pre-apply snapshot exactly.
///
/// Allowed once, and only while the window is open; both violations
/// surface as [`EngineError::RollbackExpired`].
pub async fn rollback_application(
    pool: &PgPool,
    application_id: Uuid,
) -> EngineResult<ReplanApplication> {
    let application = replans::get_application(pool, application_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("replan application {application_id}")))?;

    if application.rolled_back || Utc::now() >= application.rollback_available_until {
        return Err(EngineError::RollbackExpired);
    }

    let restore_version = application.applied_version - 1;

    let mut tx = tx::begin_trip_tx(pool, application.trip_id).await?;

    let snapshot_row = versions::get_version(&mut *tx, application.trip_id, restore_version)
        .await?
        .ok_or_else(|| {
            EngineError::ReplanFailed(format!(
                "snapshot for version {restore_version} of trip {} is missing",
                application.trip_id
            ))
        })?;

    items::delete_all_items(&mut *tx, application.trip_id).await?;
    for item in snapshot_row.snapshot.0.clone().into_items() {
        items::insert_item_snapshot(&mut *tx, &item).await?;
    }
    items::set_itinerary_version(&mut *tx, application.trip_id, restore_version).await?;

    let rows = replans::mark_application_rolled_back(&mut *tx, application.id).await?;
    if rows == 0 {
        // Lost a race with a concurrent rollback.
        return Err(EngineError::RollbackExpired);
    }

    tx.commit()
        .await
        .map_err(|e| EngineError::Storage(e.into()))?;

    info!(
        trip_id = %application.trip_id,
        application_id = %application.id,
        restored_version = restore_version,
        "replan rolled back"
    );

    let application = replans::get_application(pool, application_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("replan application {application_id}")))?;
    Ok(application)
}
