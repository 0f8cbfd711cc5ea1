//! Integration tests for trip, item, version, and booking persistence.

use chrono::NaiveDate;
use uuid::Uuid;

use wayfarer_db::models::{
    ContactInfo, Destination, GeoPoint, ItemType, ItinerarySnapshot, OwnerKind, TravelerDetails,
    Travelers, TripConstraints, TripStatus,
};
use wayfarer_db::queries::items::{self, NewItem};
use wayfarer_db::queries::{bookings, trips, versions};

use wayfarer_test_utils::{create_test_db, drop_test_db};

fn preferences(trip_id: Uuid) -> trips::NewPreferences {
    trips::NewPreferences {
        trip_id,
        destination: Destination {
            name: "Bangkok".into(),
            location: GeoPoint::new(13.7563, 100.5018),
        },
        start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
        travelers: Travelers {
            adults: 2,
            children: 0,
            seniors: 0,
        },
        budget: None,
        style: "balanced".into(),
        window_start: "10:00".into(),
        window_end: "20:00".into(),
        constraints: TripConstraints::default(),
    }
}

fn new_item(trip_id: Uuid, day: i32, position: i32, name: &str) -> NewItem {
    NewItem {
        trip_id,
        day,
        item_type: ItemType::Poi,
        poi_id: None,
        name: name.to_string(),
        location: None,
        start_time: "10:00".into(),
        end_time: "11:00".into(),
        duration_minutes: 60,
        is_pinned: false,
        position,
        route_from_previous: None,
        cost_estimate: None,
        notes: None,
    }
}

#[tokio::test]
async fn trip_crud_round_trip() {
    let (pool, db_name) = create_test_db().await;

    let owner = Uuid::new_v4();
    let trip = trips::insert_trip(&pool, OwnerKind::Guest, owner)
        .await
        .unwrap();
    assert_eq!(trip.status, TripStatus::Draft);
    assert_eq!(trip.owner_kind, OwnerKind::Guest);

    let fetched = trips::get_trip(&pool, trip.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, trip.id);

    trips::update_trip_status(&pool, trip.id, TripStatus::Planning)
        .await
        .unwrap();
    let fetched = trips::get_trip(&pool, trip.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, TripStatus::Planning);

    let listed = trips::list_trips_for_owner(&pool, OwnerKind::Guest, owner)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    let prefs = trips::upsert_preferences(&pool, &preferences(trip.id))
        .await
        .unwrap();
    assert_eq!(prefs.destination.name, "Bangkok");
    assert_eq!(prefs.day_count(), 2);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn deleting_a_trip_cascades_to_children() {
    let (pool, db_name) = create_test_db().await;

    let trip = trips::insert_trip(&pool, OwnerKind::User, Uuid::new_v4())
        .await
        .unwrap();
    trips::upsert_preferences(&pool, &preferences(trip.id))
        .await
        .unwrap();
    let item = items::insert_item(&pool, &new_item(trip.id, 1, 0, "temple"))
        .await
        .unwrap();
    items::set_itinerary_version(&pool, trip.id, 1).await.unwrap();

    trips::delete_trip(&pool, trip.id).await.unwrap();

    assert!(trips::get_trip(&pool, trip.id).await.unwrap().is_none());
    assert!(items::get_item(&pool, item.id).await.unwrap().is_none());
    assert!(trips::get_preferences(&pool, trip.id)
        .await
        .unwrap()
        .is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn items_are_listed_by_day_then_position() {
    let (pool, db_name) = create_test_db().await;

    let trip = trips::insert_trip(&pool, OwnerKind::User, Uuid::new_v4())
        .await
        .unwrap();

    // Insert out of order on purpose.
    items::insert_item(&pool, &new_item(trip.id, 2, 0, "day2-first"))
        .await
        .unwrap();
    items::insert_item(&pool, &new_item(trip.id, 1, 1, "day1-second"))
        .await
        .unwrap();
    items::insert_item(&pool, &new_item(trip.id, 1, 0, "day1-first"))
        .await
        .unwrap();

    let listed = items::list_items_for_trip(&pool, trip.id).await.unwrap();
    let names: Vec<&str> = listed.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["day1-first", "day1-second", "day2-first"]);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn version_numbers_are_unique_per_trip() {
    let (pool, db_name) = create_test_db().await;

    let trip = trips::insert_trip(&pool, OwnerKind::User, Uuid::new_v4())
        .await
        .unwrap();

    versions::insert_version(
        &pool,
        &versions::NewVersion {
            trip_id: trip.id,
            version: 1,
            change_type: "generate".into(),
            changed_by: None,
            snapshot: ItinerarySnapshot {
                version: 1,
                days: vec![],
            },
            diff: None,
        },
    )
    .await
    .unwrap();

    // A second snapshot with the same number must be rejected.
    let duplicate = versions::insert_version(
        &pool,
        &versions::NewVersion {
            trip_id: trip.id,
            version: 1,
            change_type: "edit".into(),
            changed_by: None,
            snapshot: ItinerarySnapshot {
                version: 1,
                days: vec![],
            },
            diff: None,
        },
    )
    .await;
    assert!(duplicate.is_err(), "duplicate version should be rejected");

    assert_eq!(
        versions::latest_version_number(&pool, trip.id).await.unwrap(),
        Some(1)
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn idempotency_key_maps_to_one_booking() {
    let (pool, db_name) = create_test_db().await;

    let trip = trips::insert_trip(&pool, OwnerKind::User, Uuid::new_v4())
        .await
        .unwrap();

    let booking = bookings::insert_booking(
        &pool,
        &bookings::NewBooking {
            trip_id: trip.id,
            item_id: None,
            provider_id: "testprov".into(),
            provider_type: "activity".into(),
            provider_item_id: "tour-1".into(),
            traveler_details: TravelerDetails {
                adults: 2,
                children: 0,
                lead_name: None,
            },
            booking_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            booking_time: None,
            contact_info: ContactInfo {
                email: "lead@example.com".into(),
                phone: None,
            },
        },
    )
    .await
    .unwrap();

    bookings::insert_idempotency_record(&pool, "K1", booking.id)
        .await
        .unwrap();

    let record = bookings::get_idempotency_record(&pool, "K1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.booking_id, booking.id);

    // Reusing the key for another booking is rejected by the primary key.
    let second = bookings::insert_idempotency_record(&pool, "K1", booking.id).await;
    assert!(second.is_err(), "duplicate idempotency key should fail");

    pool.close().await;
    drop_test_db(&db_name).await;
}
