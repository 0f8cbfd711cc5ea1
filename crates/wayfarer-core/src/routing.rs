//! The routing provider interface consumed by the planner.
//!
//! Actual distance/time computation lives outside the core. When no
//! planner is configured the generator falls back to straight-line
//! distance and a placeholder duration.

use anyhow::Result;
use async_trait::async_trait;

use wayfarer_db::models::{GeoPoint, Money, TravelMode};

use crate::timegeo::{haversine_km, TimeOfDay};

/// Placeholder leg duration used when no routing provider is available.
pub const FALLBACK_LEG_MINUTES: i32 = 20;

/// A request for one leg between two points.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub from: GeoPoint,
    pub to: GeoPoint,
    pub mode: TravelMode,
    pub departure_time: Option<TimeOfDay>,
}

/// A computed leg estimate.
#[derive(Debug, Clone)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub duration_minutes: i32,
    pub cost_estimate: Option<Money>,
    pub polyline: Option<String>,
}

/// Routing provider interface.
#[async_trait]
pub trait RoutePlanner: Send + Sync {
    async fn compute_route(&self, request: &RouteRequest) -> Result<RouteEstimate>;
}

/// Straight-line fallback planner: haversine distance, fixed duration.
#[derive(Debug, Default)]
pub struct StraightLinePlanner;

#[async_trait]
impl RoutePlanner for StraightLinePlanner {
    async fn compute_route(&self, request: &RouteRequest) -> Result<RouteEstimate> {
        Ok(RouteEstimate {
            distance_km: haversine_km(&request.from, &request.to),
            duration_minutes: FALLBACK_LEG_MINUTES,
            cost_estimate: None,
            polyline: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn straight_line_planner_uses_haversine() {
        let planner = StraightLinePlanner;
        let estimate = planner
            .compute_route(&RouteRequest {
                from: GeoPoint::new(13.7500, 100.4913),
                to: GeoPoint::new(13.7437, 100.4889),
                mode: TravelMode::Walking,
                departure_time: None,
            })
            .await
            .unwrap();
        assert!(estimate.distance_km > 0.5 && estimate.distance_km < 1.2);
        assert_eq!(estimate.duration_minutes, FALLBACK_LEG_MINUTES);
    }
}
