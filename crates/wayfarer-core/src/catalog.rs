//! The POI catalog interface consumed by the planner.
//!
//! The catalog itself (storage, search ranking, ingestion) is an external
//! collaborator; the core only reads through this trait. [`InMemoryCatalog`]
//! is the implementation used by tests and the CLI demo flows.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use wayfarer_db::models::GeoPoint;

use crate::timegeo::{haversine_km, TimeOfDay};

/// Opening interval for one weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenHours {
    pub open: TimeOfDay,
    pub close: TimeOfDay,
}

/// Result of looking a weekday up in a POI's hours table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoursSpec {
    Open(OpenHours),
    Closed,
    /// No entry for the weekday; the planner treats the POI as open all day.
    Unknown,
}

/// Weekly opening hours keyed by lowercase weekday name
/// (`sunday`..`saturday`). `None` for a present key means closed that day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyHours {
    pub days: HashMap<String, Option<OpenHours>>,
}

impl WeeklyHours {
    /// Hours for one weekday key.
    pub fn on(&self, weekday: &str) -> HoursSpec {
        match self.days.get(weekday) {
            Some(Some(hours)) => HoursSpec::Open(*hours),
            Some(None) => HoursSpec::Closed,
            None => HoursSpec::Unknown,
        }
    }

    /// Same interval every day of the week.
    pub fn every_day(open: TimeOfDay, close: TimeOfDay) -> Self {
        const KEYS: [&str; 7] = [
            "sunday",
            "monday",
            "tuesday",
            "wednesday",
            "thursday",
            "friday",
            "saturday",
        ];
        let days = KEYS
            .iter()
            .map(|k| (k.to_string(), Some(OpenHours { open, close })))
            .collect();
        Self { days }
    }
}

/// Price band for a POI, used for day-cost estimates via its midpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
    pub currency: String,
}

impl PriceRange {
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

/// A point of interest as served by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub id: Uuid,
    pub place_id: String,
    pub name: String,
    pub location: GeoPoint,
    pub hours: WeeklyHours,
    /// Free-form lowercase tags. The replan engine reads `indoor`,
    /// `outdoor`, and `kid_friendly`.
    pub tags: Vec<String>,
    pub avg_duration_minutes: i32,
    pub price_range: Option<PriceRange>,
}

impl Poi {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Search filter for [`PoiCatalog::search`].
#[derive(Debug, Clone, Default)]
pub struct PoiFilter {
    /// Center point and radius in km.
    pub near: Option<(GeoPoint, f64)>,
    /// Match POIs carrying at least one of these tags. Empty = no tag filter.
    pub any_tags: Vec<String>,
    /// Maximum number of results. 0 = unlimited.
    pub limit: usize,
}

/// Read-only POI catalog interface.
#[async_trait]
pub trait PoiCatalog: Send + Sync {
    /// Fetch a POI by id.
    async fn get(&self, id: Uuid) -> Result<Option<Poi>>;

    /// Search POIs by location and tags, nearest first when a center point
    /// is given.
    async fn search(&self, filter: &PoiFilter) -> Result<Vec<Poi>>;
}

/// In-memory catalog backed by a fixed POI list.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    pois: Vec<Poi>,
}

impl InMemoryCatalog {
    pub fn new(pois: Vec<Poi>) -> Self {
        Self { pois }
    }
}

#[async_trait]
impl PoiCatalog for InMemoryCatalog {
    async fn get(&self, id: Uuid) -> Result<Option<Poi>> {
        Ok(self.pois.iter().find(|p| p.id == id).cloned())
    }

    async fn search(&self, filter: &PoiFilter) -> Result<Vec<Poi>> {
        let mut hits: Vec<(f64, Poi)> = self
            .pois
            .iter()
            .filter(|p| {
                filter.any_tags.is_empty() || filter.any_tags.iter().any(|t| p.has_tag(t))
            })
            .filter_map(|p| match &filter.near {
                Some((center, radius_km)) => {
                    let d = haversine_km(center, &p.location);
                    (d <= *radius_km).then(|| (d, p.clone()))
                }
                None => Some((0.0, p.clone())),
            })
            .collect();

        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        if filter.limit > 0 {
            hits.truncate(filter.limit);
        }
        Ok(hits.into_iter().map(|(_, p)| p).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poi(name: &str, lat: f64, lng: f64, tags: &[&str]) -> Poi {
        Poi {
            id: Uuid::new_v4(),
            place_id: format!("place-{name}"),
            name: name.to_string(),
            location: GeoPoint::new(lat, lng),
            hours: WeeklyHours::every_day(
                "09:00".parse().unwrap(),
                "18:00".parse().unwrap(),
            ),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            avg_duration_minutes: 90,
            price_range: None,
        }
    }

    #[tokio::test]
    async fn search_filters_by_radius_and_sorts_by_distance() {
        let near = poi("near", 13.750, 100.500, &["outdoor"]);
        let nearer = poi("nearer", 13.7501, 100.5001, &["outdoor"]);
        let far = poi("far", 14.5, 101.5, &["outdoor"]);
        let catalog = InMemoryCatalog::new(vec![near, nearer, far]);

        let filter = PoiFilter {
            near: Some((GeoPoint::new(13.7502, 100.5002), 5.0)),
            ..Default::default()
        };
        let hits = catalog.search(&filter).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "nearer");
        assert_eq!(hits[1].name, "near");
    }

    #[tokio::test]
    async fn search_filters_by_tags() {
        let indoor = poi("museum", 13.75, 100.5, &["indoor", "museum"]);
        let outdoor = poi("park", 13.75, 100.5, &["outdoor", "park"]);
        let catalog = InMemoryCatalog::new(vec![indoor.clone(), outdoor]);

        let filter = PoiFilter {
            any_tags: vec!["indoor".into()],
            ..Default::default()
        };
        let hits = catalog.search(&filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, indoor.id);
    }

    #[test]
    fn hours_lookup() {
        let hours = WeeklyHours::every_day("09:00".parse().unwrap(), "17:00".parse().unwrap());
        match hours.on("monday") {
            HoursSpec::Open(h) => {
                assert_eq!(h.open.to_string(), "09:00");
                assert_eq!(h.close.to_string(), "17:00");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let mut closed_sunday = hours.clone();
        closed_sunday.days.insert("sunday".into(), None);
        assert_eq!(closed_sunday.on("sunday"), HoursSpec::Closed);

        let empty = WeeklyHours::default();
        assert_eq!(empty.on("friday"), HoursSpec::Unknown);
    }

    #[test]
    fn price_midpoint() {
        let range = PriceRange {
            min: 200.0,
            max: 600.0,
            currency: "THB".into(),
        };
        assert!((range.midpoint() - 400.0).abs() < f64::EPSILON);
    }
}
