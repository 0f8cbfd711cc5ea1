//! An in-memory provider backed by a fixed inventory.
//!
//! Used by integration tests and the CLI demo flows. Honors the
//! idempotency contract of [`super::Provider::create_booking`] and can be
//! switched into a failure mode to exercise the orchestrator's retry path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use wayfarer_db::models::{BookingPolicies, GeoPoint, Money, TravelerDetails, Voucher};

use super::trait_def::Provider;
use super::types::{
    Availability, AvailabilitySlot, CancelBookingResponse, CreateBookingRequest,
    CreateBookingResponse, ItemDetails, ProviderBookingStatus, ProviderEvent, ProviderEventType,
    RefundStatus, SearchOptions, SearchResult,
};

/// One bookable item in the static inventory.
#[derive(Debug, Clone)]
pub struct StaticItem {
    pub id: String,
    pub name: String,
    pub location: Option<GeoPoint>,
    pub price: Money,
    pub rating: Option<f64>,
    pub available: bool,
}

/// In-memory provider with a fixed item list.
pub struct StaticProvider {
    id: String,
    provider_type: String,
    items: Vec<StaticItem>,
    /// When set, `create_booking` fails with this reason.
    fail_bookings: AtomicBool,
    booking_counter: AtomicU64,
    /// idempotency_key -> original response.
    replays: Mutex<HashMap<String, CreateBookingResponse>>,
    /// provider booking id -> current status.
    bookings: Mutex<HashMap<String, ProviderBookingStatus>>,
}

impl StaticProvider {
    pub fn new(id: impl Into<String>, provider_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider_type: provider_type.into(),
            items: Vec::new(),
            fail_bookings: AtomicBool::new(false),
            booking_counter: AtomicU64::new(0),
            replays: Mutex::new(HashMap::new()),
            bookings: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_items(mut self, items: Vec<StaticItem>) -> Self {
        self.items = items;
        self
    }

    /// Toggle the failure mode for `create_booking`.
    pub fn set_fail_bookings(&self, fail: bool) {
        self.fail_bookings.store(fail, Ordering::SeqCst);
    }

    fn find_item(&self, item_id: &str) -> Result<&StaticItem> {
        self.items
            .iter()
            .find(|i| i.id == item_id)
            .ok_or_else(|| anyhow!("provider {}: unknown item {item_id:?}", self.id))
    }
}

#[async_trait]
impl Provider for StaticProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn provider_type(&self) -> &str {
        &self.provider_type
    }

    async fn search(&self, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let mut results: Vec<SearchResult> = self
            .items
            .iter()
            .filter(|i| match &options.query {
                Some(q) => i.name.to_lowercase().contains(&q.to_lowercase()),
                None => true,
            })
            .map(|i| SearchResult {
                id: i.id.clone(),
                name: i.name.clone(),
                description: None,
                location: i.location.clone(),
                price: i.price.clone(),
                rating: i.rating,
            })
            .collect();

        if options.max_results > 0 {
            results.truncate(options.max_results);
        }
        Ok(results)
    }

    async fn get_details(&self, item_id: &str) -> Result<ItemDetails> {
        let item = self.find_item(item_id)?;
        Ok(ItemDetails {
            id: item.id.clone(),
            name: item.name.clone(),
            location: item.location.clone(),
            price: item.price.clone(),
            availability: item.available,
            policies: BookingPolicies {
                cancellation: Some("free cancellation up to 24h before".into()),
                refund: Some("full refund before deadline".into()),
                cancellation_deadline: None,
            },
            rating: item.rating,
        })
    }

    async fn check_availability(
        &self,
        item_id: &str,
        _date: NaiveDate,
        _travelers: &TravelerDetails,
    ) -> Result<Availability> {
        let item = self.find_item(item_id)?;
        let slots = if item.available {
            vec![
                AvailabilitySlot {
                    time: "10:00".parse().unwrap(),
                    available: true,
                    price: Some(item.price.clone()),
                },
                AvailabilitySlot {
                    time: "14:00".parse().unwrap(),
                    available: true,
                    price: Some(item.price.clone()),
                },
            ]
        } else {
            Vec::new()
        };
        Ok(Availability {
            available: item.available,
            slots,
        })
    }

    async fn create_booking(&self, request: &CreateBookingRequest) -> Result<CreateBookingResponse> {
        // Idempotent replay: same key returns the original booking, even in
        // failure mode.
        if let Some(existing) = self
            .replays
            .lock()
            .expect("replay map poisoned")
            .get(&request.idempotency_key)
        {
            return Ok(existing.clone());
        }

        if self.fail_bookings.load(Ordering::SeqCst) {
            bail!("provider {}: inventory unavailable", self.id);
        }

        let item = self.find_item(&request.provider_item_id)?;
        if !item.available {
            bail!("provider {}: item {} is sold out", self.id, item.id);
        }

        let n = self.booking_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let booking_id = format!("{}-bk-{n}", self.id);
        let response = CreateBookingResponse {
            booking_id: booking_id.clone(),
            status: ProviderBookingStatus::Confirmed,
            price: item.price.clone(),
            policies: BookingPolicies {
                cancellation: Some("free cancellation up to 24h before".into()),
                refund: Some("full refund before deadline".into()),
                cancellation_deadline: None,
            },
            voucher: Some(Voucher {
                url: Some(format!("https://vouchers.example/{booking_id}")),
                data: None,
            }),
            confirmation_number: format!("CN-{n:06}"),
            expires_at: None,
        };

        self.bookings
            .lock()
            .expect("booking map poisoned")
            .insert(booking_id, ProviderBookingStatus::Confirmed);
        self.replays
            .lock()
            .expect("replay map poisoned")
            .insert(request.idempotency_key.clone(), response.clone());

        Ok(response)
    }

    async fn get_booking_status(&self, booking_id: &str) -> Result<ProviderBookingStatus> {
        self.bookings
            .lock()
            .expect("booking map poisoned")
            .get(booking_id)
            .copied()
            .ok_or_else(|| anyhow!("provider {}: unknown booking {booking_id:?}", self.id))
    }

    async fn cancel_booking(&self, booking_id: &str) -> Result<CancelBookingResponse> {
        let mut bookings = self.bookings.lock().expect("booking map poisoned");
        if bookings.remove(booking_id).is_none() {
            bail!("provider {}: unknown booking {booking_id:?}", self.id);
        }
        Ok(CancelBookingResponse {
            booking_id: booking_id.to_string(),
            refund_amount: None,
            refund_status: RefundStatus::Full,
        })
    }

    fn handle_webhook(&self, payload: &serde_json::Value) -> Result<ProviderEvent> {
        let event = payload
            .get("event")
            .and_then(|v| v.as_str())
            .context("webhook payload missing \"event\"")?;
        let booking_id = payload
            .get("booking_id")
            .and_then(|v| v.as_str())
            .context("webhook payload missing \"booking_id\"")?;

        let event_type = match event {
            "booking.confirmed" => ProviderEventType::BookingConfirmed,
            "booking.canceled" => ProviderEventType::BookingCanceled,
            "price.changed" => ProviderEventType::PriceChanged,
            "availability.changed" => ProviderEventType::AvailabilityChanged,
            other => bail!("unknown webhook event {other:?}"),
        };

        Ok(ProviderEvent {
            event_type,
            provider_booking_id: booking_id.to_string(),
            timestamp: Utc::now(),
            payload: payload.clone(),
        })
    }

    async fn health_check(&self) -> bool {
        !self.fail_bookings.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_db::models::ContactInfo;

    fn provider_with_item() -> StaticProvider {
        StaticProvider::new("testprov", "activity").with_items(vec![StaticItem {
            id: "tour-1".into(),
            name: "City Walking Tour".into(),
            location: Some(GeoPoint::new(13.75, 100.5)),
            price: Money::new(500.0, "THB"),
            rating: Some(4.6),
            available: true,
        }])
    }

    fn request(key: &str) -> CreateBookingRequest {
        CreateBookingRequest {
            provider_item_id: "tour-1".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            time_slot: None,
            travelers: TravelerDetails {
                adults: 2,
                children: 0,
                lead_name: None,
            },
            contact_info: ContactInfo {
                email: "lead@example.com".into(),
                phone: None,
            },
            idempotency_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn create_booking_is_idempotent() {
        let provider = provider_with_item();
        let first = provider.create_booking(&request("k1")).await.unwrap();
        let replay = provider.create_booking(&request("k1")).await.unwrap();
        assert_eq!(first.booking_id, replay.booking_id);
        assert_eq!(first.confirmation_number, replay.confirmation_number);

        let second = provider.create_booking(&request("k2")).await.unwrap();
        assert_ne!(first.booking_id, second.booking_id);
    }

    #[tokio::test]
    async fn failure_mode_rejects_new_bookings_but_replays_old() {
        let provider = provider_with_item();
        let first = provider.create_booking(&request("k1")).await.unwrap();

        provider.set_fail_bookings(true);
        assert!(provider.create_booking(&request("k9")).await.is_err());

        // The original key still replays.
        let replay = provider.create_booking(&request("k1")).await.unwrap();
        assert_eq!(first.booking_id, replay.booking_id);
    }

    #[tokio::test]
    async fn cancel_requires_known_booking() {
        let provider = provider_with_item();
        let created = provider.create_booking(&request("k1")).await.unwrap();

        let cancel = provider.cancel_booking(&created.booking_id).await.unwrap();
        assert_eq!(cancel.refund_status, RefundStatus::Full);

        assert!(provider.cancel_booking(&created.booking_id).await.is_err());
    }

    #[test]
    fn webhook_parses_known_events() {
        let provider = provider_with_item();
        let payload = serde_json::json!({
            "event": "booking.confirmed",
            "booking_id": "testprov-bk-1",
        });
        let event = provider.handle_webhook(&payload).unwrap();
        assert_eq!(event.event_type, ProviderEventType::BookingConfirmed);
        assert_eq!(event.provider_booking_id, "testprov-bk-1");

        let bad = serde_json::json!({ "event": "mystery", "booking_id": "x" });
        assert!(provider.handle_webhook(&bad).is_err());
    }
}
