//! Database query functions for the `bookings`, `booking_state_history`,
//! and `booking_idempotency` tables.
//!
//! State history is append-only; booking status changes go through the
//! optimistic-locked [`transition_booking_status`] so concurrent writers
//! serialize per booking row.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{
    Booking, BookingPolicies, BookingStateEntry, BookingStatus, ContactInfo, IdempotencyRecord,
    Money, TravelerDetails, Voucher,
};

/// Parameters for inserting a new booking row.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub trip_id: Uuid,
    pub item_id: Option<Uuid>,
    pub provider_id: String,
    pub provider_type: String,
    pub provider_item_id: String,
    pub traveler_details: TravelerDetails,
    pub booking_date: NaiveDate,
    pub booking_time: Option<String>,
    pub contact_info: ContactInfo,
}

/// Insert a new booking in `pending`. Price, policies, voucher, and
/// confirmation stay NULL until the provider answers.
pub async fn insert_booking<'e>(exec: impl PgExecutor<'e>, new: &NewBooking) -> Result<Booking> {
    let booking = sqlx::query_as::<_, Booking>(
        "INSERT INTO bookings \
             (trip_id, item_id, provider_id, provider_type, provider_item_id, \
              traveler_details, booking_date, booking_time, contact_info) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING *",
    )
    .bind(new.trip_id)
    .bind(new.item_id)
    .bind(&new.provider_id)
    .bind(&new.provider_type)
    .bind(&new.provider_item_id)
    .bind(Json(&new.traveler_details))
    .bind(new.booking_date)
    .bind(new.booking_time.as_deref())
    .bind(Json(&new.contact_info))
    .fetch_one(exec)
    .await
    .with_context(|| format!("failed to insert booking for trip {}", new.trip_id))?;

    Ok(booking)
}

/// Fetch a booking by ID.
pub async fn get_booking(pool: &PgPool, id: Uuid) -> Result<Option<Booking>> {
    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch booking")?;

    Ok(booking)
}

/// Locate a booking by the provider's external booking id.
pub async fn get_booking_by_external_id(
    pool: &PgPool,
    provider_id: &str,
    external_booking_id: &str,
) -> Result<Option<Booking>> {
    let booking = sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings WHERE provider_id = $1 AND external_booking_id = $2",
    )
    .bind(provider_id)
    .bind(external_booking_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch booking by external id")?;

    Ok(booking)
}

/// List all bookings of a trip, oldest first.
pub async fn list_bookings_for_trip(pool: &PgPool, trip_id: Uuid) -> Result<Vec<Booking>> {
    let bookings = sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings WHERE trip_id = $1 ORDER BY created_at ASC",
    )
    .bind(trip_id)
    .fetch_all(pool)
    .await
    .context("failed to list bookings for trip")?;

    Ok(bookings)
}

/// Optimistically transition a booking's status.
///
/// The UPDATE only matches when the current status equals `from`; the
/// caller inspects the returned row count to distinguish success (1) from
/// not-found-or-stale (0).
pub async fn transition_booking_status<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
    from: BookingStatus,
    to: BookingStatus,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE bookings SET status = $1, updated_at = now() \
         WHERE id = $2 AND status = $3",
    )
    .bind(to)
    .bind(id)
    .bind(from)
    .execute(exec)
    .await
    .context("failed to transition booking status")?;

    Ok(result.rows_affected())
}

/// Record the provider's confirmation payload on a booking.
#[allow(clippy::too_many_arguments)]
pub async fn update_booking_confirmation<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
    external_booking_id: &str,
    price: &Money,
    policies: &BookingPolicies,
    voucher: Option<&Voucher>,
    confirmation_number: Option<&str>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE bookings \
         SET external_booking_id = $1, price = $2, policies = $3, voucher = $4, \
             confirmation_number = $5, updated_at = now() \
         WHERE id = $6",
    )
    .bind(external_booking_id)
    .bind(Json(price))
    .bind(Json(policies))
    .bind(voucher.map(Json))
    .bind(confirmation_number)
    .bind(id)
    .execute(exec)
    .await
    .context("failed to record booking confirmation")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("booking {id} not found");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// State history (append-only)
// ---------------------------------------------------------------------------

/// Append one state-transition row.
pub async fn insert_state_history<'e>(
    exec: impl PgExecutor<'e>,
    booking_id: Uuid,
    from_status: Option<BookingStatus>,
    to_status: BookingStatus,
    reason: Option<&str>,
    changed_by: Option<&str>,
) -> Result<BookingStateEntry> {
    let entry = sqlx::query_as::<_, BookingStateEntry>(
        "INSERT INTO booking_state_history (booking_id, from_status, to_status, reason, changed_by) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(booking_id)
    .bind(from_status)
    .bind(to_status)
    .bind(reason)
    .bind(changed_by)
    .fetch_one(exec)
    .await
    .with_context(|| format!("failed to append state history for booking {booking_id}"))?;

    Ok(entry)
}

/// All transitions of a booking in the order they happened.
pub async fn list_state_history(pool: &PgPool, booking_id: Uuid) -> Result<Vec<BookingStateEntry>> {
    let entries = sqlx::query_as::<_, BookingStateEntry>(
        "SELECT * FROM booking_state_history \
         WHERE booking_id = $1 \
         ORDER BY recorded_at ASC, id ASC",
    )
    .bind(booking_id)
    .fetch_all(pool)
    .await
    .context("failed to list booking state history")?;

    Ok(entries)
}

// ---------------------------------------------------------------------------
// Idempotency records
// ---------------------------------------------------------------------------

/// Write the idempotency record pointing a key at its booking.
///
/// The primary-key constraint makes a second insert with the same key fail;
/// callers look the key up first inside the same transaction.
pub async fn insert_idempotency_record<'e>(
    exec: impl PgExecutor<'e>,
    key: &str,
    booking_id: Uuid,
) -> Result<()> {
    sqlx::query("INSERT INTO booking_idempotency (key, booking_id) VALUES ($1, $2)")
        .bind(key)
        .bind(booking_id)
        .execute(exec)
        .await
        .with_context(|| format!("failed to insert idempotency record for key {key:?}"))?;

    Ok(())
}

/// Look up the booking previously created under an idempotency key.
pub async fn get_idempotency_record(pool: &PgPool, key: &str) -> Result<Option<IdempotencyRecord>> {
    let record = sqlx::query_as::<_, IdempotencyRecord>(
        "SELECT * FROM booking_idempotency WHERE key = $1",
    )
    .bind(key)
    .fetch_optional(pool)
    .await
    .context("failed to fetch idempotency record")?;

    Ok(record)
}
