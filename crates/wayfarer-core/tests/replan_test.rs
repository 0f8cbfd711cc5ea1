//! Integration tests for the event -> replan pipeline: ingest, propose,
//! apply, rollback.

mod common;

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use wayfarer_core::catalog::InMemoryCatalog;
use wayfarer_core::replan::apply::{apply_proposal, rollback_application};
use wayfarer_core::replan::propose::{propose, DEFAULT_MAX_PROPOSALS};
use wayfarer_core::replan::{ingest_event, IngestRequest};
use wayfarer_db::models::{
    EventDetails, EventType, GeoPoint, ItineraryItem, Severity, WeatherCondition,
};
use wayfarer_db::queries::{items, replans, versions};

use wayfarer_test_utils::{create_test_db, drop_test_db};

use common::{make_poi, seed_item, seed_trip};

fn heavy_rain_request(trip_id: Uuid) -> IngestRequest {
    IngestRequest {
        trip_id,
        event_type: EventType::Weather,
        severity: Severity::High,
        location: GeoPoint::new(13.75, 100.50),
        // 2025-03-01 (trip day 1), 13:00-17:00.
        slot_start: Utc.with_ymd_and_hms(2025, 3, 1, 13, 0, 0).unwrap(),
        slot_end: Utc.with_ymd_and_hms(2025, 3, 1, 17, 0, 0).unwrap(),
        details: EventDetails::Weather {
            condition: WeatherCondition::HeavyRain,
        },
    }
}

/// Snapshot of the fields rollback must restore exactly.
fn fingerprint(items: &[ItineraryItem]) -> Vec<(Uuid, i32, String, String, i32, bool, String)> {
    items
        .iter()
        .map(|i| {
            (
                i.id,
                i.day,
                i.start_time.clone(),
                i.end_time.clone(),
                i.position,
                i.is_pinned,
                i.name.clone(),
            )
        })
        .collect()
}

#[tokio::test]
async fn heavy_rain_flags_outdoor_items_and_triggers() {
    let (pool, db_name) = create_test_db().await;
    let trip = seed_trip(&pool).await;

    let park = seed_item(
        &pool,
        trip.id,
        1,
        0,
        "Outdoor Park",
        "14:00",
        "16:00",
        120,
        false,
        Some(GeoPoint::new(13.75, 100.50)),
    )
    .await;
    // Indoor item at the same place and time is not affected.
    let museum = seed_item(
        &pool,
        trip.id,
        1,
        1,
        "Science Museum",
        "16:00",
        "17:00",
        60,
        false,
        Some(GeoPoint::new(13.75, 100.50)),
    )
    .await;

    let catalog = InMemoryCatalog::default();
    let outcome = ingest_event(&pool, &catalog, &heavy_rain_request(trip.id))
        .await
        .expect("ingest should succeed");

    assert_eq!(outcome.event.affected_items, vec![park.id]);
    assert!(!outcome.event.affected_items.contains(&museum.id));
    assert!(outcome.event.processed);
    assert!(outcome.event.replan_triggered);

    let trigger = outcome.trigger.expect("high heavy rain must trigger");
    assert_eq!(trigger.priority, Severity::High);
    assert!(!trigger.processed);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn low_severity_weather_does_not_trigger() {
    let (pool, db_name) = create_test_db().await;
    let trip = seed_trip(&pool).await;

    seed_item(
        &pool,
        trip.id,
        1,
        0,
        "Outdoor Park",
        "14:00",
        "16:00",
        120,
        false,
        Some(GeoPoint::new(13.75, 100.50)),
    )
    .await;

    let mut request = heavy_rain_request(trip.id);
    request.severity = Severity::Low;
    request.details = EventDetails::Weather {
        condition: WeatherCondition::LightRain,
    };

    let catalog = InMemoryCatalog::default();
    let outcome = ingest_event(&pool, &catalog, &request).await.unwrap();

    assert!(outcome.trigger.is_none());
    assert!(outcome.event.processed);
    assert!(!outcome.event.replan_triggered);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn medium_closure_triggers_for_nearby_items() {
    let (pool, db_name) = create_test_db().await;
    let trip = seed_trip(&pool).await;

    let shop = seed_item(
        &pool,
        trip.id,
        1,
        0,
        "Craft Workshop",
        "14:00",
        "15:00",
        60,
        false,
        Some(GeoPoint::new(13.7500, 100.5000)),
    )
    .await;
    // ~5 km away: outside the 500 m closure radius.
    seed_item(
        &pool,
        trip.id,
        1,
        1,
        "Harbor Cruise",
        "14:00",
        "15:00",
        60,
        false,
        Some(GeoPoint::new(13.7950, 100.5000)),
    )
    .await;

    let request = IngestRequest {
        trip_id: trip.id,
        event_type: EventType::Closure,
        severity: Severity::Medium,
        location: GeoPoint::new(13.7501, 100.5001),
        slot_start: Utc.with_ymd_and_hms(2025, 3, 1, 13, 0, 0).unwrap(),
        slot_end: Utc.with_ymd_and_hms(2025, 3, 1, 17, 0, 0).unwrap(),
        details: EventDetails::Closure {
            reason: Some("renovation".into()),
        },
    };

    let catalog = InMemoryCatalog::default();
    let outcome = ingest_event(&pool, &catalog, &request).await.unwrap();

    assert_eq!(outcome.event.affected_items, vec![shop.id]);
    assert!(outcome.trigger.is_some());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn proposals_are_scored_and_capped() {
    let (pool, db_name) = create_test_db().await;
    let trip = seed_trip(&pool).await;

    seed_item(
        &pool,
        trip.id,
        1,
        0,
        "Outdoor Park",
        "14:00",
        "16:00",
        120,
        false,
        Some(GeoPoint::new(13.75, 100.50)),
    )
    .await;

    // An indoor alternative 200 m away.
    let gallery = make_poi(
        "Art Gallery",
        13.7518,
        100.5000,
        120,
        "09:00",
        "20:00",
        None,
        &["indoor", "museum"],
    );
    let catalog = InMemoryCatalog::new(vec![gallery.clone()]);

    let outcome = ingest_event(&pool, &catalog, &heavy_rain_request(trip.id))
        .await
        .unwrap();
    let trigger = outcome.trigger.unwrap();

    let proposals = propose(&pool, &catalog, trigger.id, DEFAULT_MAX_PROPOSALS)
        .await
        .expect("propose should succeed");

    assert!(!proposals.is_empty());
    assert!(proposals.len() <= DEFAULT_MAX_PROPOSALS);
    // Sorted best-first.
    for pair in proposals.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    // The replacement strategy appears and carries the expected impact.
    let replacement = proposals
        .iter()
        .find(|p| !p.changes.replaced_items.is_empty())
        .expect("replace strategy should produce a proposal");
    assert_eq!(replacement.changes.replaced_items.len(), 1);
    assert_eq!(
        replacement.changes.replaced_items[0].new_item.poi_id,
        Some(gallery.id)
    );
    assert!((replacement.impact.disruption_score - 0.3).abs() < 1e-9);
    assert!(replacement.score >= 0.5);

    // The remove strategy is strictly more disruptive.
    let removal = proposals
        .iter()
        .find(|p| !p.changes.removed_items.is_empty())
        .expect("remove strategy should produce a proposal");
    assert!(removal.score < replacement.score);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn pinned_items_are_never_proposed_against() {
    let (pool, db_name) = create_test_db().await;
    let trip = seed_trip(&pool).await;

    seed_item(
        &pool,
        trip.id,
        1,
        0,
        "Outdoor Park",
        "14:00",
        "16:00",
        120,
        true, // pinned
        Some(GeoPoint::new(13.75, 100.50)),
    )
    .await;

    let catalog = InMemoryCatalog::new(vec![make_poi(
        "Art Gallery",
        13.7518,
        100.5000,
        120,
        "09:00",
        "20:00",
        None,
        &["indoor"],
    )]);

    let outcome = ingest_event(&pool, &catalog, &heavy_rain_request(trip.id))
        .await
        .unwrap();
    let trigger = outcome.trigger.expect("trigger fires on the event rules");

    let proposals = propose(&pool, &catalog, trigger.id, DEFAULT_MAX_PROPOSALS)
        .await
        .unwrap();
    assert!(
        proposals.is_empty(),
        "pinned items must yield no proposals, got {proposals:?}"
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn apply_and_rollback_round_trip() {
    let (pool, db_name) = create_test_db().await;
    let trip = seed_trip(&pool).await;

    seed_item(
        &pool,
        trip.id,
        1,
        0,
        "Outdoor Park",
        "14:00",
        "16:00",
        120,
        false,
        Some(GeoPoint::new(13.75, 100.50)),
    )
    .await;
    items::set_itinerary_version(&pool, trip.id, 1).await.unwrap();

    let gallery = make_poi(
        "Art Gallery",
        13.7518,
        100.5000,
        90,
        "09:00",
        "20:00",
        Some(300.0),
        &["indoor"],
    );
    let catalog = InMemoryCatalog::new(vec![gallery.clone()]);

    let outcome = ingest_event(&pool, &catalog, &heavy_rain_request(trip.id))
        .await
        .unwrap();
    let trigger = outcome.trigger.unwrap();
    let proposals = propose(&pool, &catalog, trigger.id, DEFAULT_MAX_PROPOSALS)
        .await
        .unwrap();
    let best = &proposals[0];

    let pre_items = items::list_items_for_trip(&pool, trip.id).await.unwrap();
    let pre_fingerprint = fingerprint(&pre_items);

    let before_apply = Utc::now();
    let applied = apply_proposal(&pool, &catalog, best.id, "apply-key-1")
        .await
        .expect("apply should succeed");

    // Version advanced, window is ~24h out.
    assert_eq!(applied.version, 2);
    assert_eq!(applied.application.applied_version, 2);
    let window = applied.application.rollback_available_until;
    assert!(window > before_apply + Duration::hours(23));
    assert!(window < before_apply + Duration::hours(25));
    assert!(applied.warnings.is_empty(), "clean apply: {:?}", applied.warnings);

    // The itinerary actually changed and the trigger is consumed.
    let post_items = items::list_items_for_trip(&pool, trip.id).await.unwrap();
    assert_ne!(fingerprint(&post_items), pre_fingerprint);
    let head = items::get_itinerary(&pool, trip.id).await.unwrap().unwrap();
    assert_eq!(head.version, 2);
    // Both the pre- and post-state snapshots exist.
    assert!(versions::get_version(&pool, trip.id, 1).await.unwrap().is_some());
    assert!(versions::get_version(&pool, trip.id, 2).await.unwrap().is_some());

    // Rollback restores the pre-apply state exactly.
    let rolled = rollback_application(&pool, applied.application.id)
        .await
        .expect("rollback inside the window should succeed");
    assert!(rolled.rolled_back);
    assert!(rolled.rolled_back_at.is_some());

    let restored = items::list_items_for_trip(&pool, trip.id).await.unwrap();
    assert_eq!(fingerprint(&restored), pre_fingerprint);
    let head = items::get_itinerary(&pool, trip.id).await.unwrap().unwrap();
    assert_eq!(head.version, 1);

    // A second rollback is rejected as consumed.
    let err = rollback_application(&pool, applied.application.id)
        .await
        .expect_err("second rollback must fail");
    assert_eq!(err.code(), "ROLLBACK_EXPIRED");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn apply_rejects_a_reused_idempotency_key() {
    let (pool, db_name) = create_test_db().await;
    let trip = seed_trip(&pool).await;

    seed_item(
        &pool,
        trip.id,
        1,
        0,
        "Outdoor Park",
        "14:00",
        "16:00",
        120,
        false,
        Some(GeoPoint::new(13.75, 100.50)),
    )
    .await;
    items::set_itinerary_version(&pool, trip.id, 1).await.unwrap();

    let catalog = InMemoryCatalog::new(vec![make_poi(
        "Art Gallery",
        13.7518,
        100.5000,
        90,
        "09:00",
        "20:00",
        None,
        &["indoor"],
    )]);

    let outcome = ingest_event(&pool, &catalog, &heavy_rain_request(trip.id))
        .await
        .unwrap();
    let trigger = outcome.trigger.unwrap();
    let proposals = propose(&pool, &catalog, trigger.id, DEFAULT_MAX_PROPOSALS)
        .await
        .unwrap();
    assert!(proposals.len() >= 2, "need two proposals for this test");

    apply_proposal(&pool, &catalog, proposals[0].id, "shared-key")
        .await
        .unwrap();

    let err = apply_proposal(&pool, &catalog, proposals[1].id, "shared-key")
        .await
        .expect_err("key reuse must be rejected");
    assert_eq!(err.code(), "IDEMPOTENCY_CONFLICT");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn apply_rejects_proposals_that_touch_pinned_items() {
    let (pool, db_name) = create_test_db().await;
    let trip = seed_trip(&pool).await;

    let park = seed_item(
        &pool,
        trip.id,
        1,
        0,
        "Outdoor Park",
        "14:00",
        "16:00",
        120,
        false,
        Some(GeoPoint::new(13.75, 100.50)),
    )
    .await;
    items::set_itinerary_version(&pool, trip.id, 1).await.unwrap();

    let catalog = InMemoryCatalog::new(vec![make_poi(
        "Art Gallery",
        13.7518,
        100.5000,
        90,
        "09:00",
        "20:00",
        None,
        &["indoor"],
    )]);

    let outcome = ingest_event(&pool, &catalog, &heavy_rain_request(trip.id))
        .await
        .unwrap();
    let proposals = propose(
        &pool,
        &catalog,
        outcome.trigger.unwrap().id,
        DEFAULT_MAX_PROPOSALS,
    )
    .await
    .unwrap();

    // Pin the item after the proposal was generated.
    items::update_item_pinned(&pool, park.id, true).await.unwrap();

    let err = apply_proposal(&pool, &catalog, proposals[0].id, "apply-key-1")
        .await
        .expect_err("stale proposal against a pin must be rejected");
    assert_eq!(err.code(), "CONFLICT");

    // Nothing changed.
    let head = items::get_itinerary(&pool, trip.id).await.unwrap().unwrap();
    assert_eq!(head.version, 1);
    assert!(replans::list_applications_for_trip(&pool, trip.id)
        .await
        .unwrap()
        .is_empty());

    pool.close().await;
    drop_test_db(&db_name).await;
}
