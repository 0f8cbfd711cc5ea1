//! The weather forecast interface consumed by the replan monitor.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use wayfarer_db::models::{Severity, WeatherCondition};

/// Numeric forecast details; `impact` is the provider's one-line summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastDetails {
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
    pub impact: String,
}

/// A one-day forecast for a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub condition: WeatherCondition,
    pub severity: Severity,
    pub details: ForecastDetails,
}

/// Weather provider interface.
#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn get_forecast(&self, lat: f64, lng: f64, date: NaiveDate) -> Result<Forecast>;
}

/// Fixed forecast table keyed by date; sunny/low for anything unlisted.
/// Used by tests and the CLI demo flows.
#[derive(Debug, Default)]
pub struct StaticWeather {
    by_date: HashMap<NaiveDate, Forecast>,
}

impl StaticWeather {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, date: NaiveDate, forecast: Forecast) {
        self.by_date.insert(date, forecast);
    }
}

#[async_trait]
impl WeatherService for StaticWeather {
    async fn get_forecast(&self, _lat: f64, _lng: f64, date: NaiveDate) -> Result<Forecast> {
        Ok(self.by_date.get(&date).cloned().unwrap_or(Forecast {
            condition: WeatherCondition::Sunny,
            severity: Severity::Low,
            details: ForecastDetails::default(),
        }))
    }
}
