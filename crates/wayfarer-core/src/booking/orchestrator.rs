//! Booking orchestration: provider dispatch with idempotency, retry,
//! cancellation, webhook reconciliation, and alternatives search.
//!
//! Provider calls always happen outside any database transaction and
//! under a timeout; their outcomes are encoded as state transitions with
//! the reason recorded in the booking's history.

use std::time::Duration;

use chrono::NaiveDate;
use sqlx::PgPool;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use wayfarer_db::models::{Booking, BookingStatus, ContactInfo, TravelerDetails};
use wayfarer_db::queries::bookings as db;
use wayfarer_db::queries::items;

use crate::error::{EngineError, EngineResult};
use crate::provider::{
    CreateBookingRequest, CreateBookingResponse, Provider, ProviderBookingStatus,
    ProviderEventType, ProviderRegistry, SearchOptions, SearchResult,
};

use super::BookingStateMachine;

/// Default wall-clock budget for one provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Parameters for creating a booking.
#[derive(Debug, Clone)]
pub struct CreateBookingParams {
    pub trip_id: Uuid,
    pub item_id: Option<Uuid>,
    pub provider_id: String,
    pub provider_item_id: String,
    pub booking_date: NaiveDate,
    pub booking_time: Option<String>,
    pub travelers: TravelerDetails,
    pub contact_info: ContactInfo,
    /// Required for all write operations; replays return the original
    /// booking.
    pub idempotency_key: String,
}

/// An alternative found for a failed or unwanted booking.
#[derive(Debug, Clone)]
pub struct AlternativeOption {
    pub provider_id: String,
    pub result: SearchResult,
    /// Absolute price difference against the original booking.
    pub price_delta: f64,
}

/// The booking orchestrator. One per process, cheap to share.
pub struct BookingOrchestrator<'a> {
    pool: &'a PgPool,
    registry: &'a ProviderRegistry,
    provider_timeout: Duration,
}

impl<'a> BookingOrchestrator<'a> {
    pub fn new(pool: &'a PgPool, registry: &'a ProviderRegistry) -> Self {
        Self {
            pool,
            registry,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_provider_timeout(mut self, provider_timeout: Duration) -> Self {
        self.provider_timeout = provider_timeout;
        self
    }

    /// Create a booking.
    ///
    /// Replaying an idempotency key returns the original booking without
    /// touching the provider. Otherwise the booking row, its first history
    /// entry, and the idempotency record commit in one transaction before
    /// the provider is called; the provider outcome then lands as a second
    /// transition. The returned booking is `confirmed`, `pending`, or
    /// `failed` -- provider failure is a state, not an error.
    pub async fn create_booking(&self, params: &CreateBookingParams) -> EngineResult<Booking> {
        // 1. Idempotent replay.
        if let Some(record) = db::get_idempotency_record(self.pool, &params.idempotency_key).await?
        {
            let booking = db::get_booking(self.pool, record.booking_id)
                .await?
                .ok_or_else(|| {
                    EngineError::Conflict(format!(
                        "idempotency key {:?} points at missing booking {}",
                        params.idempotency_key, record.booking_id
                    ))
                })?;
            info!(booking_id = %booking.id, key = %params.idempotency_key, "idempotent replay");
            return Ok(booking);
        }

        let provider = self.require_provider(&params.provider_id)?;

        // 2. Insert the pending booking, its history root, and the
        //    idempotency record atomically.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EngineError::Storage(e.into()))?;

        let booking = db::insert_booking(
            &mut *tx,
            &db::NewBooking {
                trip_id: params.trip_id,
                item_id: params.item_id,
                provider_id: params.provider_id.clone(),
                provider_type: provider.provider_type().to_string(),
                provider_item_id: params.provider_item_id.clone(),
                traveler_details: params.travelers.clone(),
                booking_date: params.booking_date,
                booking_time: params.booking_time.clone(),
                contact_info: params.contact_info.clone(),
            },
        )
        .await?;
        db::insert_state_history(&mut *tx, booking.id, None, BookingStatus::Pending, None, None)
            .await?;
        db::insert_idempotency_record(&mut *tx, &params.idempotency_key, booking.id).await?;

        tx.commit()
            .await
            .map_err(|e| EngineError::Storage(e.into()))?;

        // 3-5. Call the provider outside the transaction and record the
        //      outcome.
        self.dispatch_to_provider(&booking, params, &params.idempotency_key)
            .await
    }

    /// Retry a failed booking with a fresh provider idempotency key.
    pub async fn retry_booking(&self, booking_id: Uuid) -> EngineResult<Booking> {
        let booking = self.require_booking(booking_id).await?;
        if booking.status != BookingStatus::Failed {
            return Err(EngineError::Conflict(format!(
                "booking {booking_id} has status {}, only failed bookings can be retried",
                booking.status
            )));
        }

        let booking = BookingStateMachine::transition(
            self.pool,
            booking_id,
            BookingStatus::Failed,
            BookingStatus::Pending,
            Some("retry"),
            None,
        )
        .await?;

        let params = CreateBookingParams {
            trip_id: booking.trip_id,
            item_id: booking.item_id,
            provider_id: booking.provider_id.clone(),
            provider_item_id: booking.provider_item_id.clone(),
            booking_date: booking.booking_date,
            booking_time: booking.booking_time.clone(),
            travelers: booking.traveler_details.0.clone(),
            contact_info: booking.contact_info.0.clone(),
            idempotency_key: Uuid::new_v4().to_string(),
        };
        let fresh_key = params.idempotency_key.clone();
        self.dispatch_to_provider(&booking, &params, &fresh_key)
            .await
    }

    /// Cancel a confirmed booking through its provider.
    pub async fn cancel_booking(&self, booking_id: Uuid) -> EngineResult<Booking> {
        let booking = self.require_booking(booking_id).await?;
        if booking.status != BookingStatus::Confirmed {
            return Err(EngineError::Conflict(format!(
                "booking {booking_id} has status {}, only confirmed bookings can be canceled",
                booking.status
            )));
        }

        let provider = self.require_provider(&booking.provider_id)?;
        let external_id = booking.external_booking_id.as_deref().ok_or_else(|| {
            EngineError::Conflict(format!(
                "booking {booking_id} has no external booking id to cancel"
            ))
        })?;

        let cancel = match timeout(self.provider_timeout, provider.cancel_booking(external_id))
            .await
        {
            Err(_) => {
                return Err(EngineError::provider_transient(format!(
                    "cancel timed out after {:?}",
                    self.provider_timeout
                )))
            }
            Ok(Err(e)) => return Err(EngineError::provider_terminal(e.to_string())),
            Ok(Ok(response)) => response,
        };

        let reason = format!("canceled by user, refund: {:?}", cancel.refund_status);
        BookingStateMachine::transition(
            self.pool,
            booking_id,
            BookingStatus::Confirmed,
            BookingStatus::Canceled,
            Some(&reason),
            None,
        )
        .await
    }

    /// Ingest a raw provider webhook payload.
    ///
    /// The provider adapter normalizes the payload; the orchestrator
    /// locates the booking by external id and applies the matching
    /// transition. A `booking_confirmed` arriving after a local timeout
    /// (`failed`) reconciles through the retry edge.
    pub async fn ingest_webhook(
        &self,
        provider_id: &str,
        payload: &serde_json::Value,
    ) -> EngineResult<Booking> {
        let provider = self.require_provider(provider_id)?;
        let event = provider
            .handle_webhook(payload)
            .map_err(|e| EngineError::Validation(format!("webhook rejected: {e}")))?;

        let booking = db::get_booking_by_external_id(
            self.pool,
            provider_id,
            &event.provider_booking_id,
        )
        .await?
        .ok_or_else(|| {
            EngineError::NotFound(format!(
                "booking with external id {:?}",
                event.provider_booking_id
            ))
        })?;

        match event.event_type {
            ProviderEventType::BookingConfirmed => match booking.status {
                BookingStatus::Pending => {
                    BookingStateMachine::transition(
                        self.pool,
                        booking.id,
                        BookingStatus::Pending,
                        BookingStatus::Confirmed,
                        Some("webhook: booking_confirmed"),
                        Some("webhook"),
                    )
                    .await
                }
                BookingStatus::Failed => {
                    // Late success after a local timeout: reconcile through
                    // the retry edge.
                    BookingStateMachine::transition(
                        self.pool,
                        booking.id,
                        BookingStatus::Failed,
                        BookingStatus::Pending,
                        Some("webhook: late confirmation"),
                        Some("webhook"),
                    )
                    .await?;
                    BookingStateMachine::transition(
                        self.pool,
                        booking.id,
                        BookingStatus::Pending,
                        BookingStatus::Confirmed,
                        Some("webhook: booking_confirmed"),
                        Some("webhook"),
                    )
                    .await
                }
                _ => {
                    info!(booking_id = %booking.id, status = %booking.status, "confirmation webhook ignored");
                    Ok(booking)
                }
            },
            ProviderEventType::BookingCanceled => BookingStateMachine::transition(
                self.pool,
                booking.id,
                BookingStatus::Confirmed,
                BookingStatus::Canceled,
                Some("webhook: booking_canceled"),
                Some("webhook"),
            )
            .await,
            ProviderEventType::PriceChanged | ProviderEventType::AvailabilityChanged => {
                warn!(
                    booking_id = %booking.id,
                    event = ?event.event_type,
                    "informational webhook recorded, no transition"
                );
                Ok(booking)
            }
        }
    }

    /// Find up to `max` alternatives for a booking: same provider first,
    /// then the rest of the registry, ranked by absolute price delta.
    pub async fn find_alternatives(
        &self,
        booking_id: Uuid,
        max: usize,
    ) -> EngineResult<Vec<AlternativeOption>> {
        let booking = self.require_booking(booking_id).await?;
        let reference_price = booking.price.as_ref().map(|p| p.amount).unwrap_or(0.0);

        let location = match booking.item_id {
            Some(item_id) => items::get_item(self.pool, item_id)
                .await?
                .and_then(|i| i.location.map(|l| l.0)),
            None => None,
        };

        let options = SearchOptions {
            query: None,
            location,
            date: Some(booking.booking_date),
            travelers: booking.traveler_details.adults + booking.traveler_details.children,
            max_results: max,
        };

        let mut alternatives: Vec<AlternativeOption> = Vec::new();
        let mut providers: Vec<&dyn Provider> = Vec::new();
        if let Some(original) = self.registry.get(&booking.provider_id) {
            providers.push(original);
        }
        for provider in self.registry.iter() {
            if provider.id() != booking.provider_id {
                providers.push(provider);
            }
        }

        for provider in providers {
            match timeout(self.provider_timeout, provider.search(&options)).await {
                Err(_) => {
                    warn!(provider = provider.id(), "alternatives search timed out");
                }
                Ok(Err(e)) => {
                    warn!(provider = provider.id(), error = %e, "alternatives search failed");
                }
                Ok(Ok(results)) => {
                    for result in results {
                        alternatives.push(AlternativeOption {
                            provider_id: provider.id().to_string(),
                            price_delta: (result.price.amount - reference_price).abs(),
                            result,
                        });
                    }
                }
            }
        }

        alternatives.sort_by(|a, b| a.price_delta.total_cmp(&b.price_delta));
        alternatives.truncate(max);
        Ok(alternatives)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn require_provider(&self, provider_id: &str) -> EngineResult<&dyn Provider> {
        self.registry
            .get(provider_id)
            .ok_or_else(|| EngineError::Validation(format!("unknown provider {provider_id:?}")))
    }

    async fn require_booking(&self, booking_id: Uuid) -> EngineResult<Booking> {
        db::get_booking(self.pool, booking_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("booking {booking_id}")))
    }

    /// Call the provider for a pending booking and record the outcome as a
    /// transition. Never returns a provider error: failures become the
    /// `failed` state with the reason in history.
    async fn dispatch_to_provider(
        &self,
        booking: &Booking,
        params: &CreateBookingParams,
        idempotency_key: &str,
    ) -> EngineResult<Booking> {
        let provider = self.require_provider(&params.provider_id)?;

        let request = CreateBookingRequest {
            provider_item_id: params.provider_item_id.clone(),
            date: params.booking_date,
            time_slot: params
                .booking_time
                .as_deref()
                .and_then(|t| t.parse().ok()),
            travelers: params.travelers.clone(),
            contact_info: params.contact_info.clone(),
            idempotency_key: idempotency_key.to_string(),
        };

        let outcome = match timeout(self.provider_timeout, provider.create_booking(&request)).await
        {
            Err(_) => Err(format!(
                "provider call timed out after {:?}",
                self.provider_timeout
            )),
            Ok(Err(e)) => Err(e.to_string()),
            Ok(Ok(response)) => Ok(response),
        };

        match outcome {
            Ok(response) => self.record_confirmation(booking.id, &response).await,
            Err(reason) => {
                warn!(booking_id = %booking.id, reason = %reason, "provider booking failed");
                BookingStateMachine::transition(
                    self.pool,
                    booking.id,
                    BookingStatus::Pending,
                    BookingStatus::Failed,
                    Some(&reason),
                    None,
                )
                .await
            }
        }
    }

    /// Record a provider acceptance: external id, price, policies, voucher,
    /// and the `pending -> confirmed` transition (when already confirmed by
    /// the provider) in one transaction.
    async fn record_confirmation(
        &self,
        booking_id: Uuid,
        response: &CreateBookingResponse,
    ) -> EngineResult<Booking> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EngineError::Storage(e.into()))?;

        db::update_booking_confirmation(
            &mut *tx,
            booking_id,
            &response.booking_id,
            &response.price,
            &response.policies,
            response.voucher.as_ref(),
            Some(&response.confirmation_number),
        )
        .await?;

        if response.status == ProviderBookingStatus::Confirmed {
            let rows = db::transition_booking_status(
                &mut *tx,
                booking_id,
                BookingStatus::Pending,
                BookingStatus::Confirmed,
            )
            .await?;
            if rows == 0 {
                return Err(EngineError::Conflict(format!(
                    "booking {booking_id} left pending before confirmation landed"
                )));
            }
            db::insert_state_history(
                &mut *tx,
                booking_id,
                Some(BookingStatus::Pending),
                BookingStatus::Confirmed,
                Some("provider confirmed"),
                None,
            )
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| EngineError::Storage(e.into()))?;

        info!(booking_id = %booking_id, external_id = %response.booking_id, "booking recorded");
        self.require_booking(booking_id).await
    }
}
