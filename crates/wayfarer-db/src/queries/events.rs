//! Database query functions for the `event_signals` and `replan_triggers`
//! tables.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{EventDetails, EventSignal, EventType, GeoPoint, ReplanTrigger, Severity};

/// Parameters for inserting a new event signal row.
#[derive(Debug, Clone)]
pub struct NewEventSignal {
    pub trip_id: Uuid,
    pub event_type: EventType,
    pub severity: Severity,
    pub location: GeoPoint,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
    pub details: EventDetails,
    pub affected_items: Vec<Uuid>,
}

/// Insert a new event signal row.
pub async fn insert_event(pool: &PgPool, new: &NewEventSignal) -> Result<EventSignal> {
    let event = sqlx::query_as::<_, EventSignal>(
        "INSERT INTO event_signals \
             (trip_id, event_type, severity, location, slot_start, slot_end, details, affected_items) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING *",
    )
    .bind(new.trip_id)
    .bind(new.event_type)
    .bind(new.severity)
    .bind(Json(&new.location))
    .bind(new.slot_start)
    .bind(new.slot_end)
    .bind(Json(&new.details))
    .bind(&new.affected_items)
    .fetch_one(pool)
    .await
    .with_context(|| {
        format!(
            "failed to insert {} event for trip {}",
            new.event_type, new.trip_id
        )
    })?;

    Ok(event)
}

/// Fetch an event signal by ID.
pub async fn get_event(pool: &PgPool, id: Uuid) -> Result<Option<EventSignal>> {
    let event = sqlx::query_as::<_, EventSignal>("SELECT * FROM event_signals WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch event signal")?;

    Ok(event)
}

/// List unprocessed event signals for a trip, oldest first.
pub async fn list_unprocessed_events(pool: &PgPool, trip_id: Uuid) -> Result<Vec<EventSignal>> {
    let events = sqlx::query_as::<_, EventSignal>(
        "SELECT * FROM event_signals \
         WHERE trip_id = $1 AND processed = FALSE \
         ORDER BY created_at ASC",
    )
    .bind(trip_id)
    .fetch_all(pool)
    .await
    .context("failed to list unprocessed events")?;

    Ok(events)
}

/// Mark an event processed, recording whether it emitted a trigger.
pub async fn mark_event_processed(
    pool: &PgPool,
    id: Uuid,
    replan_triggered: bool,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE event_signals SET processed = TRUE, replan_triggered = $1 WHERE id = $2",
    )
    .bind(replan_triggered)
    .bind(id)
    .execute(pool)
    .await
    .context("failed to mark event processed")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("event signal {id} not found");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Replan triggers
// ---------------------------------------------------------------------------

/// Insert a replan trigger for an event.
pub async fn insert_trigger(
    pool: &PgPool,
    trip_id: Uuid,
    event_id: Uuid,
    reason: &str,
    priority: Severity,
) -> Result<ReplanTrigger> {
    let trigger = sqlx::query_as::<_, ReplanTrigger>(
        "INSERT INTO replan_triggers (trip_id, event_id, reason, priority) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(trip_id)
    .bind(event_id)
    .bind(reason)
    .bind(priority)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert trigger for event {event_id}"))?;

    Ok(trigger)
}

/// Fetch a trigger by ID.
pub async fn get_trigger(pool: &PgPool, id: Uuid) -> Result<Option<ReplanTrigger>> {
    let trigger = sqlx::query_as::<_, ReplanTrigger>("SELECT * FROM replan_triggers WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch replan trigger")?;

    Ok(trigger)
}

/// List unprocessed triggers for a trip, highest priority first, then oldest.
pub async fn list_unprocessed_triggers(pool: &PgPool, trip_id: Uuid) -> Result<Vec<ReplanTrigger>> {
    let triggers = sqlx::query_as::<_, ReplanTrigger>(
        "SELECT * FROM replan_triggers \
         WHERE trip_id = $1 AND processed = FALSE \
         ORDER BY CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END, \
                  created_at ASC",
    )
    .bind(trip_id)
    .fetch_all(pool)
    .await
    .context("failed to list unprocessed triggers")?;

    Ok(triggers)
}

/// Mark a trigger processed.
pub async fn mark_trigger_processed<'e>(exec: impl PgExecutor<'e>, id: Uuid) -> Result<()> {
    let result = sqlx::query("UPDATE replan_triggers SET processed = TRUE WHERE id = $1")
        .bind(id)
        .execute(exec)
        .await
        .context("failed to mark trigger processed")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("replan trigger {id} not found");
    }

    Ok(())
}
