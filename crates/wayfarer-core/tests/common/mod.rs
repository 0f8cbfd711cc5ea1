//! Shared seed helpers for wayfarer-core integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use wayfarer_core::catalog::{Poi, PriceRange, WeeklyHours};
use wayfarer_db::models::{
    Destination, GeoPoint, ItemType, OwnerKind, Travelers, Trip, TripConstraints,
};
use wayfarer_db::queries::items::{self, NewItem};
use wayfarer_db::queries::trips;

/// Create a guest trip spanning 2025-03-01..2025-03-02 with a 10:00-20:00
/// daily window.
pub async fn seed_trip(pool: &PgPool) -> Trip {
    seed_trip_with_budget(pool, None).await
}

/// Same as [`seed_trip`] with an optional total budget in THB.
pub async fn seed_trip_with_budget(pool: &PgPool, total_budget: Option<f64>) -> Trip {
    let trip = trips::insert_trip(pool, OwnerKind::Guest, Uuid::new_v4())
        .await
        .expect("failed to insert trip");

    trips::upsert_preferences(
        pool,
        &trips::NewPreferences {
            trip_id: trip.id,
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
            budget: total_budget.map(|total| wayfarer_db::models::Budget {
                total: Some(total),
                per_day: None,
                currency: "THB".into(),
            }),
            style: "balanced".into(),
            window_start: "10:00".into(),
            window_end: "20:00".into(),
            constraints: TripConstraints::default(),
        },
    )
    .await
    .expect("failed to upsert preferences");

    trip
}

/// Build a catalog POI open the same hours every day.
pub fn make_poi(
    name: &str,
    lat: f64,
    lng: f64,
    duration_minutes: i32,
    open: &str,
    close: &str,
    price_thb: Option<f64>,
    tags: &[&str],
) -> Poi {
    Poi {
        id: Uuid::new_v4(),
        place_id: format!("place-{}", name.to_lowercase().replace(' ', "-")),
        name: name.to_string(),
        location: GeoPoint::new(lat, lng),
        hours: WeeklyHours::every_day(open.parse().unwrap(), close.parse().unwrap()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        avg_duration_minutes: duration_minutes,
        price_range: price_thb.map(|price| PriceRange {
            min: price,
            max: price,
            currency: "THB".into(),
        }),
    }
}

/// Insert an itinerary item row directly, bypassing the generator.
pub async fn seed_item(
    pool: &PgPool,
    trip_id: Uuid,
    day: i32,
    position: i32,
    name: &str,
    start: &str,
    end: &str,
    duration_minutes: i32,
    is_pinned: bool,
    location: Option<GeoPoint>,
) -> wayfarer_db::models::ItineraryItem {
    items::insert_item(
        pool,
        &NewItem {
            trip_id,
            day,
            item_type: ItemType::Poi,
            poi_id: None,
            name: name.to_string(),
            location,
            start_time: start.to_string(),
            end_time: end.to_string(),
            duration_minutes,
            is_pinned,
            position,
            route_from_previous: None,
            cost_estimate: None,
            notes: None,
        },
    )
    .await
    .expect("failed to insert item")
}
