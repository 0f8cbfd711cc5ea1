//! Weather monitoring for upcoming trip days.
//!
//! Polls the forecast service for each day of a trip and feeds severe
//! forecasts into the ingest stage. Scheduling (cron, endpoint) lives
//! outside the core; this is the one-shot scan it would invoke.

use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use wayfarer_db::models::{EventDetails, EventType, Severity, WeatherCondition};
use wayfarer_db::queries::trips;

use crate::catalog::PoiCatalog;
use crate::error::{EngineError, EngineResult};
use crate::timegeo::TimeOfDay;
use crate::weather::WeatherService;

use super::{ingest_event, IngestOutcome, IngestRequest};

/// Scan every day of a trip against the forecast at its destination.
///
/// Days forecast as high-severity heavy rain are ingested as weather
/// events covering the trip's daily window; the usual ingest rules then
/// decide whether a replan trigger fires.
pub async fn scan_trip_weather(
    pool: &PgPool,
    catalog: &dyn PoiCatalog,
    weather: &dyn WeatherService,
    trip_id: Uuid,
) -> EngineResult<Vec<IngestOutcome>> {
    let prefs = trips::get_preferences(pool, trip_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("preferences for trip {trip_id}")))?;

    let destination = prefs.destination.location.clone();
    let window_start: TimeOfDay = prefs
        .window_start
        .parse()
        .map_err(|e| EngineError::Validation(format!("daily window start: {e}")))?;
    let window_end: TimeOfDay = prefs
        .window_end
        .parse()
        .map_err(|e| EngineError::Validation(format!("daily window end: {e}")))?;

    let mut outcomes = Vec::new();
    for day in 1..=prefs.day_count() {
        let date = prefs.date_of_day(day);
        let forecast = weather
            .get_forecast(destination.lat, destination.lng, date)
            .await?;

        if forecast.condition != WeatherCondition::HeavyRain || forecast.severity != Severity::High
        {
            continue;
        }

        info!(trip_id = %trip_id, day, %date, "severe weather forecast; ingesting event");
        let outcome = ingest_event(
            pool,
            catalog,
            &IngestRequest {
                trip_id,
                event_type: EventType::Weather,
                severity: forecast.severity,
                location: destination.clone(),
                slot_start: at_time(date, window_start),
                slot_end: at_time(date, window_end),
                details: EventDetails::Weather {
                    condition: forecast.condition,
                },
            },
        )
        .await?;
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

fn at_time(date: NaiveDate, time: TimeOfDay) -> chrono::DateTime<Utc> {
    let minutes = u32::from(time.minutes());
    let naive = date
        .and_hms_opt(minutes / 60, minutes % 60, 0)
        .expect("time of day is always in range");
    Utc.from_utc_datetime(&naive)
}
