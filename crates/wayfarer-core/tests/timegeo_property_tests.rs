//! Property-based tests for time-of-day arithmetic and geodesic helpers.
//!
//! Properties:
//! - parse -> format is the identity on valid `HH:MM` strings
//! - adding 0 minutes is the identity
//! - adding then subtracting the same amount is the identity whenever the
//!   intermediate value stays inside the day
//! - numeric ordering agrees with lexicographic ordering of the formatted
//!   strings
//! - haversine distance is symmetric, non-negative, and zero at identity

use proptest::prelude::*;

use wayfarer_core::timegeo::{haversine_km, TimeOfDay};
use wayfarer_db::models::GeoPoint;

fn arb_time() -> impl Strategy<Value = TimeOfDay> {
    (0u16..24 * 60).prop_map(|m| TimeOfDay::from_minutes(m).unwrap())
}

fn arb_point() -> impl Strategy<Value = GeoPoint> {
    (-90.0f64..=90.0, -179.999f64..=180.0).prop_map(|(lat, lng)| GeoPoint::new(lat, lng))
}

proptest! {
    #[test]
    fn parse_format_round_trip(t in arb_time()) {
        let formatted = t.to_string();
        let parsed: TimeOfDay = formatted.parse().unwrap();
        prop_assert_eq!(parsed, t);
        // Always zero-padded five chars.
        prop_assert_eq!(formatted.len(), 5);
    }

    #[test]
    fn adding_zero_is_identity(t in arb_time()) {
        prop_assert_eq!(t.checked_add(0).unwrap(), t);
    }

    #[test]
    fn add_then_subtract_is_identity(t in arb_time(), delta in 0i64..24 * 60) {
        // Only when the addition stays inside the day.
        if let Ok(later) = t.checked_add(delta) {
            prop_assert_eq!(later.checked_add(-delta).unwrap(), t);
            prop_assert_eq!(t.minutes_until(later), delta);
        }
    }

    #[test]
    fn numeric_order_matches_string_order(a in arb_time(), b in arb_time()) {
        prop_assert_eq!(a.cmp(&b), a.to_string().cmp(&b.to_string()));
    }

    #[test]
    fn wrap_is_always_rejected(t in arb_time(), delta in 1i64..10_000) {
        let minutes_left = i64::from(TimeOfDay::MAX.minutes()) - i64::from(t.minutes());
        if delta > minutes_left {
            prop_assert!(t.checked_add(delta).is_err());
        } else {
            prop_assert!(t.checked_add(delta).is_ok());
        }
    }

    #[test]
    fn haversine_is_symmetric_and_nonnegative(a in arb_point(), b in arb_point()) {
        let ab = haversine_km(&a, &b);
        let ba = haversine_km(&b, &a);
        prop_assert!(ab >= 0.0);
        prop_assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn haversine_identity_is_zero(a in arb_point()) {
        prop_assert!(haversine_km(&a, &a).abs() < 1e-9);
    }
}
