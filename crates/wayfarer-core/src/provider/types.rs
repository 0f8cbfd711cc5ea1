//! Neutral request/response types shared by all provider adapters.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use wayfarer_db::models::{BookingPolicies, ContactInfo, GeoPoint, Money, TravelerDetails, Voucher};

use crate::timegeo::TimeOfDay;

/// Search options passed to [`super::Provider::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub query: Option<String>,
    pub location: Option<GeoPoint>,
    pub date: Option<NaiveDate>,
    pub travelers: u32,
    /// 0 = provider default.
    pub max_results: usize,
}

/// One bookable item returned by a provider search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<GeoPoint>,
    pub price: Money,
    pub rating: Option<f64>,
}

/// Full detail record for one bookable item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDetails {
    pub id: String,
    pub name: String,
    pub location: Option<GeoPoint>,
    pub price: Money,
    pub availability: bool,
    pub policies: BookingPolicies,
    pub rating: Option<f64>,
}

/// One bookable time slot on a date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub time: TimeOfDay,
    pub available: bool,
    pub price: Option<Money>,
}

/// Availability answer for an item/date/party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub slots: Vec<AvailabilitySlot>,
}

/// Status a provider reports for a booking it accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderBookingStatus {
    Confirmed,
    Pending,
}

/// Request body for [`super::Provider::create_booking`].
///
/// Providers MUST be idempotent on `idempotency_key`: replaying the same
/// key returns the original response instead of creating a second booking.
#[derive(Debug, Clone)]
pub struct CreateBookingRequest {
    pub provider_item_id: String,
    pub date: NaiveDate,
    pub time_slot: Option<TimeOfDay>,
    pub travelers: TravelerDetails,
    pub contact_info: ContactInfo,
    pub idempotency_key: String,
}

/// Response from a successful booking creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingResponse {
    pub booking_id: String,
    pub status: ProviderBookingStatus,
    pub price: Money,
    pub policies: BookingPolicies,
    pub voucher: Option<Voucher>,
    pub confirmation_number: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Refund outcome reported on cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Full,
    Partial,
    None,
}

/// Response from [`super::Provider::cancel_booking`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBookingResponse {
    pub booking_id: String,
    pub refund_amount: Option<Money>,
    pub refund_status: RefundStatus,
}

/// Kind of webhook event after adapter normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderEventType {
    BookingConfirmed,
    BookingCanceled,
    PriceChanged,
    AvailabilityChanged,
}

/// A provider webhook payload normalized into the neutral shape the
/// orchestrator consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub event_type: ProviderEventType,
    pub provider_booking_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}
