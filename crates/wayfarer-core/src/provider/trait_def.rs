//! The `Provider` trait -- the adapter interface for booking systems.
//!
//! Each concrete provider (activity marketplaces, hotel APIs, transport
//! operators) implements this trait. The trait is intentionally
//! object-safe so it can be stored as `Box<dyn Provider>` in the
//! [`super::ProviderRegistry`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use wayfarer_db::models::TravelerDetails;

use super::types::{
    Availability, CancelBookingResponse, CreateBookingRequest, CreateBookingResponse, ItemDetails,
    ProviderBookingStatus, ProviderEvent, SearchOptions, SearchResult,
};

/// Adapter interface for a single booking provider.
///
/// # Object Safety
///
/// This trait is object-safe: every method returns a concrete type. The
/// orchestrator only ever sees `&dyn Provider` resolved through the
/// registry.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider id (e.g. "viator", "hotelbeds").
    fn id(&self) -> &str;

    /// Kind of inventory this provider sells (e.g. "activity", "hotel").
    fn provider_type(&self) -> &str;

    /// Search bookable items.
    async fn search(&self, options: &SearchOptions) -> Result<Vec<SearchResult>>;

    /// Fetch the full detail record for one item.
    async fn get_details(&self, item_id: &str) -> Result<ItemDetails>;

    /// Check availability for an item on a date for a party size.
    async fn check_availability(
        &self,
        item_id: &str,
        date: NaiveDate,
        travelers: &TravelerDetails,
    ) -> Result<Availability>;

    /// Create a booking. MUST be idempotent on
    /// `request.idempotency_key`: a replay returns the original booking.
    async fn create_booking(&self, request: &CreateBookingRequest) -> Result<CreateBookingResponse>;

    /// Current status of a booking previously created here.
    async fn get_booking_status(&self, booking_id: &str) -> Result<ProviderBookingStatus>;

    /// Cancel a booking.
    async fn cancel_booking(&self, booking_id: &str) -> Result<CancelBookingResponse>;

    /// Parse a raw webhook payload into the neutral event shape.
    fn handle_webhook(&self, payload: &serde_json::Value) -> Result<ProviderEvent>;

    /// Liveness probe.
    async fn health_check(&self) -> bool;
}

// Compile-time assertion: Provider must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Provider) {}
};
