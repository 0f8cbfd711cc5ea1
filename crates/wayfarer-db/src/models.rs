//! Row models and typed JSONB payloads for the wayfarer schema.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Draft,
    Planning,
    Booked,
    Active,
    Completed,
    Cancelled,
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Planning => "planning",
            Self::Booked => "booked",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for TripStatus {
    type Err = TripStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "planning" => Ok(Self::Planning),
            "booked" => Ok(Self::Booked),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(TripStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TripStatus`] string.
#[derive(Debug, Clone)]
pub struct TripStatusParseError(pub String);

impl fmt::Display for TripStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid trip status: {:?}", self.0)
    }
}

impl std::error::Error for TripStatusParseError {}

// ---------------------------------------------------------------------------

/// Who owns a trip: a registered user or an anonymous guest session.
///
/// A trip has exactly one owner id; `owner_kind` says which namespace it
/// lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    User,
    Guest,
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::User => "user",
            Self::Guest => "guest",
        };
        f.write_str(s)
    }
}

impl FromStr for OwnerKind {
    type Err = OwnerKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "guest" => Ok(Self::Guest),
            other => Err(OwnerKindParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`OwnerKind`] string.
#[derive(Debug, Clone)]
pub struct OwnerKindParseError(pub String);

impl fmt::Display for OwnerKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid owner kind: {:?}", self.0)
    }
}

impl std::error::Error for OwnerKindParseError {}

// ---------------------------------------------------------------------------

/// Kind of itinerary item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Poi,
    Activity,
    Hotel,
    Transport,
    Meal,
    FreeTime,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Poi => "poi",
            Self::Activity => "activity",
            Self::Hotel => "hotel",
            Self::Transport => "transport",
            Self::Meal => "meal",
            Self::FreeTime => "free_time",
        };
        f.write_str(s)
    }
}

impl FromStr for ItemType {
    type Err = ItemTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "poi" => Ok(Self::Poi),
            "activity" => Ok(Self::Activity),
            "hotel" => Ok(Self::Hotel),
            "transport" => Ok(Self::Transport),
            "meal" => Ok(Self::Meal),
            "free_time" => Ok(Self::FreeTime),
            other => Err(ItemTypeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ItemType`] string.
#[derive(Debug, Clone)]
pub struct ItemTypeParseError(pub String);

impl fmt::Display for ItemTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid item type: {:?}", self.0)
    }
}

impl std::error::Error for ItemTypeParseError {}

// ---------------------------------------------------------------------------

/// Status of a booking with an external provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Failed,
    Canceled,
    Refunded,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

impl FromStr for BookingStatus {
    type Err = BookingStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            "refunded" => Ok(Self::Refunded),
            other => Err(BookingStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`BookingStatus`] string.
#[derive(Debug, Clone)]
pub struct BookingStatusParseError(pub String);

impl fmt::Display for BookingStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid booking status: {:?}", self.0)
    }
}

impl std::error::Error for BookingStatusParseError {}

// ---------------------------------------------------------------------------

/// Kind of real-world disruption signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Weather,
    Closure,
    SoldOut,
    Delay,
    AvailabilityChanged,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Weather => "weather",
            Self::Closure => "closure",
            Self::SoldOut => "sold_out",
            Self::Delay => "delay",
            Self::AvailabilityChanged => "availability_changed",
        };
        f.write_str(s)
    }
}

impl FromStr for EventType {
    type Err = EventTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weather" => Ok(Self::Weather),
            "closure" => Ok(Self::Closure),
            "sold_out" => Ok(Self::SoldOut),
            "delay" => Ok(Self::Delay),
            "availability_changed" => Ok(Self::AvailabilityChanged),
            other => Err(EventTypeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`EventType`] string.
#[derive(Debug, Clone)]
pub struct EventTypeParseError(pub String);

impl fmt::Display for EventTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid event type: {:?}", self.0)
    }
}

impl std::error::Error for EventTypeParseError {}

// ---------------------------------------------------------------------------

/// Severity of a disruption signal, also used as replan trigger priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = SeverityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(SeverityParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Severity`] string.
#[derive(Debug, Clone)]
pub struct SeverityParseError(pub String);

impl fmt::Display for SeverityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid severity: {:?}", self.0)
    }
}

impl std::error::Error for SeverityParseError {}

// ---------------------------------------------------------------------------
// JSONB payload types
// ---------------------------------------------------------------------------

/// A geographic point with an optional human-readable address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            address: None,
        }
    }

    /// Range checks: lat in [-90, 90], lng in (-180, 180].
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && self.lng > -180.0 && self.lng <= 180.0
    }
}

/// A monetary amount with an ISO-4217 currency code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

/// Whether a cost figure is a quoted price or a planner estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostConfidence {
    Fixed,
    Estimated,
}

/// Estimated or quoted cost attached to an itinerary item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub amount: f64,
    pub currency: String,
    pub confidence: CostConfidence,
}

/// Transport mode for a route segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    Walking,
    Transit,
    Taxi,
    Drive,
}

/// Route estimate from the previous item in the day, embedded on the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_item_id: Option<Uuid>,
    pub mode: TravelMode,
    pub distance_km: f64,
    pub duration_minutes: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<Money>,
}

/// Destination of a trip: a display name plus its center point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub location: GeoPoint,
}

/// Traveler mix for a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Travelers {
    pub adults: u32,
    pub children: u32,
    pub seniors: u32,
}

impl Travelers {
    pub fn total(&self) -> u32 {
        self.adults + self.children + self.seniors
    }
}

/// Trip budget: total and/or per-day caps in one currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_day: Option<f64>,
    pub currency: String,
}

/// Scheduling constraints derived from the traveler mix and user choices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_walking_km_per_day: Option<f64>,
    #[serde(default)]
    pub has_children: bool,
    #[serde(default)]
    pub has_seniors: bool,
    #[serde(default)]
    pub needs_rest_time: bool,
    #[serde(default)]
    pub avoid_crowds: bool,
}

/// Traveler details forwarded to a booking provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelerDetails {
    pub adults: u32,
    pub children: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_name: Option<String>,
}

/// Contact information forwarded to a booking provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Cancellation/refund policies attached to a confirmed booking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingPolicies {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_deadline: Option<DateTime<Utc>>,
}

/// Voucher issued by a provider on confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Weather condition reported by the forecast service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Sunny,
    LightRain,
    HeavyRain,
    Cloudy,
    Snow,
    #[serde(other)]
    Other,
}

/// Structured payload of a disruption signal, keyed by event kind.
///
/// Validated on ingest; the core never handles untyped JSON here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDetails {
    Weather {
        condition: WeatherCondition,
    },
    Closure {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    SoldOut,
    Delay {
        minutes: i32,
    },
    AvailabilityChanged,
}

// ---------------------------------------------------------------------------
// Replan change descriptions
// ---------------------------------------------------------------------------

/// Specification of an item a proposal wants to insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItemSpec {
    pub day: i32,
    pub item_type: ItemType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poi_id: Option<Uuid>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<CostEstimate>,
}

/// One old-for-new substitution in a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacedItem {
    pub old_item_id: Uuid,
    pub new_item: NewItemSpec,
}

/// One reschedule in a proposal. Duration is preserved; the end time is
/// recomputed on apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovedItem {
    pub item_id: Uuid,
    pub day: i32,
    pub start_time: String,
}

/// The full change set of a replan proposal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalChanges {
    #[serde(default)]
    pub replaced_items: Vec<ReplacedItem>,
    #[serde(default)]
    pub moved_items: Vec<MovedItem>,
    #[serde(default)]
    pub removed_items: Vec<Uuid>,
    #[serde(default)]
    pub added_items: Vec<NewItemSpec>,
}

impl ProposalChanges {
    /// True when the proposal would not touch anything.
    pub fn is_empty(&self) -> bool {
        self.replaced_items.is_empty()
            && self.moved_items.is_empty()
            && self.removed_items.is_empty()
            && self.added_items.is_empty()
    }
}

/// Estimated impact of applying a proposal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalImpact {
    pub time_change_minutes: i64,
    pub cost_change: f64,
    pub distance_change_km: f64,
    pub disruption_score: f64,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Items of one itinerary day as captured in a version snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySnapshot {
    pub day: i32,
    pub items: Vec<ItineraryItem>,
}

/// Full itinerary state captured by a version row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItinerarySnapshot {
    pub version: i32,
    pub days: Vec<DaySnapshot>,
}

impl ItinerarySnapshot {
    /// Group items (already ordered by day, position) into day buckets.
    pub fn from_items(version: i32, items: &[ItineraryItem]) -> Self {
        let mut days: Vec<DaySnapshot> = Vec::new();
        for item in items {
            match days.last_mut() {
                Some(d) if d.day == item.day => d.items.push(item.clone()),
                _ => days.push(DaySnapshot {
                    day: item.day,
                    items: vec![item.clone()],
                }),
            }
        }
        Self { version, days }
    }

    /// Flatten back into an item list ordered by (day, position).
    pub fn into_items(self) -> Vec<ItineraryItem> {
        self.days.into_iter().flat_map(|d| d.items).collect()
    }
}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A trip -- the aggregate root everything else hangs off.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub owner_kind: OwnerKind,
    pub owner_id: Uuid,
    pub status: TripStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User-supplied planning preferences, 1:1 with a trip.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TripPreferences {
    pub trip_id: Uuid,
    pub destination: Json<Destination>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub travelers: Json<Travelers>,
    pub budget: Option<Json<Budget>>,
    pub style: String,
    /// Daily scheduling window start, `HH:MM`.
    pub window_start: String,
    /// Daily scheduling window end, `HH:MM`.
    pub window_end: String,
    pub constraints: Json<TripConstraints>,
}

impl TripPreferences {
    /// Number of itinerary days covered by the date range (inclusive of the
    /// start day; a same-day trip is one day).
    pub fn day_count(&self) -> i32 {
        (self.end_date - self.start_date).num_days() as i32 + 1
    }

    /// The calendar date of 1-based itinerary day `day`.
    pub fn date_of_day(&self, day: i32) -> NaiveDate {
        self.start_date + chrono::Duration::days(i64::from(day) - 1)
    }
}

/// Current itinerary head for a trip: just the version counter.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Itinerary {
    pub trip_id: Uuid,
    pub version: i32,
    pub generated_at: DateTime<Utc>,
}

/// A single scheduled entry in one day of the itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ItineraryItem {
    pub id: Uuid,
    pub trip_id: Uuid,
    /// 1-based day index within the trip.
    pub day: i32,
    pub item_type: ItemType,
    pub poi_id: Option<Uuid>,
    pub name: String,
    pub location: Option<Json<GeoPoint>>,
    /// `HH:MM`, local time.
    pub start_time: String,
    /// `HH:MM`, local time.
    pub end_time: String,
    pub duration_minutes: i32,
    pub is_pinned: bool,
    /// Zero-based position within the day; gap-free per (trip, day).
    pub position: i32,
    pub route_from_previous: Option<Json<RouteSegment>>,
    pub cost_estimate: Option<Json<CostEstimate>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only snapshot of the itinerary after a mutation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ItineraryVersion {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub version: i32,
    /// Name of the operation that produced this version (e.g. "generate",
    /// "reorder", "replan").
    pub change_type: String,
    pub changed_by: Option<String>,
    pub snapshot: Json<ItinerarySnapshot>,
    pub diff: Option<Json<serde_json::Value>>,
    pub created_at: DateTime<Utc>,
}

/// An external reservation tracked against the plan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub item_id: Option<Uuid>,
    pub provider_id: String,
    pub provider_type: String,
    /// The provider-side inventory item this booking was made against.
    pub provider_item_id: String,
    pub external_booking_id: Option<String>,
    pub status: BookingStatus,
    pub price: Option<Json<Money>>,
    pub policies: Option<Json<BookingPolicies>>,
    pub voucher: Option<Json<Voucher>>,
    pub confirmation_number: Option<String>,
    pub traveler_details: Json<TravelerDetails>,
    pub booking_date: NaiveDate,
    pub booking_time: Option<String>,
    pub contact_info: Json<ContactInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One append-only row per booking state transition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookingStateEntry {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub from_status: Option<BookingStatus>,
    pub to_status: BookingStatus,
    pub reason: Option<String>,
    pub changed_by: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Maps a caller-supplied idempotency key to the booking it created.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IdempotencyRecord {
    pub key: String,
    pub booking_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// An ingested disruption signal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventSignal {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub event_type: EventType,
    pub severity: Severity,
    pub location: Json<GeoPoint>,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
    pub details: Json<EventDetails>,
    pub affected_items: Vec<Uuid>,
    pub processed: bool,
    pub replan_triggered: bool,
    pub created_at: DateTime<Utc>,
}

/// A replan-worthy signal emitted by ingest.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReplanTrigger {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub event_id: Uuid,
    pub reason: String,
    pub priority: Severity,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

/// A ranked candidate repair for a trigger.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReplanProposal {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub trigger_id: Uuid,
    pub score: f64,
    pub explanation: String,
    pub changes: Json<ProposalChanges>,
    pub impact: Json<ProposalImpact>,
    pub created_at: DateTime<Utc>,
}

/// Record of a proposal having been applied, with its rollback window.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReplanApplication {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub proposal_id: Uuid,
    pub idempotency_key: String,
    pub applied_version: i32,
    pub rollback_available_until: DateTime<Utc>,
    pub rolled_back: bool,
    pub rolled_back_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_status_round_trip() {
        for s in [
            TripStatus::Draft,
            TripStatus::Planning,
            TripStatus::Booked,
            TripStatus::Active,
            TripStatus::Completed,
            TripStatus::Cancelled,
        ] {
            let text = s.to_string();
            assert_eq!(text.parse::<TripStatus>().unwrap(), s);
        }
    }

    #[test]
    fn booking_status_rejects_unknown() {
        assert!("definitely-not-a-status".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn geo_point_validation() {
        assert!(GeoPoint::new(13.75, 100.5).is_valid());
        assert!(GeoPoint::new(-90.0, 180.0).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.0).is_valid());
    }

    #[test]
    fn event_details_tagged_serialization() {
        let details = EventDetails::Weather {
            condition: WeatherCondition::HeavyRain,
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["kind"], "weather");
        assert_eq!(json["condition"], "heavy_rain");

        let back: EventDetails = serde_json::from_value(json).unwrap();
        assert_eq!(back, details);
    }

    #[test]
    fn unknown_weather_condition_maps_to_other() {
        let parsed: WeatherCondition = serde_json::from_str("\"hailstorm\"").unwrap();
        assert_eq!(parsed, WeatherCondition::Other);
    }

    #[test]
    fn day_count_is_inclusive() {
        let prefs = TripPreferences {
            trip_id: Uuid::nil(),
            destination: Json(Destination {
                name: "Bangkok".into(),
                location: GeoPoint::new(13.75, 100.5),
            }),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
            travelers: Json(Travelers {
                adults: 2,
                children: 0,
                seniors: 0,
            }),
            budget: None,
            style: "balanced".into(),
            window_start: "10:00".into(),
            window_end: "20:00".into(),
            constraints: Json(TripConstraints::default()),
        };
        assert_eq!(prefs.day_count(), 2);
        assert_eq!(
            prefs.date_of_day(2),
            NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
        );
    }

    #[test]
    fn snapshot_groups_by_day() {
        let mk = |day: i32, position: i32| ItineraryItem {
            id: Uuid::new_v4(),
            trip_id: Uuid::nil(),
            day,
            item_type: ItemType::Poi,
            poi_id: None,
            name: format!("item-{day}-{position}"),
            location: None,
            start_time: "10:00".into(),
            end_time: "11:00".into(),
            duration_minutes: 60,
            is_pinned: false,
            position,
            route_from_previous: None,
            cost_estimate: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let items = vec![mk(1, 0), mk(1, 1), mk(2, 0)];
        let snap = ItinerarySnapshot::from_items(3, &items);
        assert_eq!(snap.version, 3);
        assert_eq!(snap.days.len(), 2);
        assert_eq!(snap.days[0].items.len(), 2);
        assert_eq!(snap.days[1].items.len(), 1);
        assert_eq!(snap.into_items().len(), 3);
    }
}
