//! Booking state machine and orchestrator.
//!
//! Validates and executes state transitions for bookings, enforcing the
//! allowed transition graph, optimistic locking, and the append-only state
//! history.

pub mod orchestrator;

pub use orchestrator::{AlternativeOption, BookingOrchestrator, CreateBookingParams};

use sqlx::PgPool;
use uuid::Uuid;

use wayfarer_db::models::{Booking, BookingStatus};
use wayfarer_db::queries::bookings as db;

use crate::error::{EngineError, EngineResult};

/// The booking state machine.
///
/// Enforces the valid transition graph:
///
/// ```text
/// (new)     -> pending
/// pending   -> confirmed
/// pending   -> failed
/// failed    -> pending   (retry)
/// confirmed -> canceled
/// confirmed -> refunded
/// canceled  -> refunded
/// refunded  -> (terminal)
/// ```
pub struct BookingStateMachine;

impl BookingStateMachine {
    /// Check whether a transition from `from` to `to` is a valid edge in
    /// the state graph. `from = None` is booking creation.
    pub fn is_valid_transition(from: Option<BookingStatus>, to: BookingStatus) -> bool {
        matches!(
            (from, to),
            (None, BookingStatus::Pending)
                | (Some(BookingStatus::Pending), BookingStatus::Confirmed)
                | (Some(BookingStatus::Pending), BookingStatus::Failed)
                | (Some(BookingStatus::Failed), BookingStatus::Pending)
                | (Some(BookingStatus::Confirmed), BookingStatus::Canceled)
                | (Some(BookingStatus::Confirmed), BookingStatus::Refunded)
                | (Some(BookingStatus::Canceled), BookingStatus::Refunded)
        )
    }

    /// Execute a state transition with optimistic locking.
    ///
    /// The UPDATE only matches while the booking still has status `from`;
    /// the matching history row is appended in the same transaction, so
    /// transitions for one booking are linearizable and the history's last
    /// row always matches the booking's current status.
    ///
    /// Returns the updated booking, or:
    /// - [`EngineError::Conflict`] when the transition is not a valid
    ///   edge, or the current status no longer matches `from`.
    /// - [`EngineError::NotFound`] when the booking does not exist.
    pub async fn transition(
        pool: &PgPool,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        reason: Option<&str>,
        changed_by: Option<&str>,
    ) -> EngineResult<Booking> {
        if !Self::is_valid_transition(Some(from), to) {
            return Err(EngineError::Conflict(format!(
                "invalid booking transition: {from} -> {to} for booking {booking_id}"
            )));
        }

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| EngineError::Storage(e.into()))?;

        let rows = db::transition_booking_status(&mut *tx, booking_id, from, to).await?;
        if rows == 0 {
            // Either the booking does not exist or the status changed
            // underneath us.
            let booking = db::get_booking(pool, booking_id).await?;
            return match booking {
                None => Err(EngineError::NotFound(format!("booking {booking_id}"))),
                Some(b) => Err(EngineError::Conflict(format!(
                    "booking {booking_id} has status {}, expected {from}",
                    b.status
                ))),
            };
        }

        db::insert_state_history(&mut *tx, booking_id, Some(from), to, reason, changed_by).await?;

        tx.commit()
            .await
            .map_err(|e| EngineError::Storage(e.into()))?;

        let booking = db::get_booking(pool, booking_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("booking {booking_id}")))?;
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions_accepted() {
        let valid = [
            (None, BookingStatus::Pending),
            (Some(BookingStatus::Pending), BookingStatus::Confirmed),
            (Some(BookingStatus::Pending), BookingStatus::Failed),
            (Some(BookingStatus::Failed), BookingStatus::Pending),
            (Some(BookingStatus::Confirmed), BookingStatus::Canceled),
            (Some(BookingStatus::Confirmed), BookingStatus::Refunded),
            (Some(BookingStatus::Canceled), BookingStatus::Refunded),
        ];
        for (from, to) in valid {
            assert!(
                BookingStateMachine::is_valid_transition(from, to),
                "expected {from:?} -> {to} to be valid"
            );
        }
    }

    #[test]
    fn invalid_transitions_rejected() {
        let invalid = [
            (None, BookingStatus::Confirmed),
            (None, BookingStatus::Failed),
            (Some(BookingStatus::Pending), BookingStatus::Canceled),
            (Some(BookingStatus::Pending), BookingStatus::Refunded),
            (Some(BookingStatus::Pending), BookingStatus::Pending),
            (Some(BookingStatus::Confirmed), BookingStatus::Pending),
            (Some(BookingStatus::Confirmed), BookingStatus::Failed),
            (Some(BookingStatus::Failed), BookingStatus::Confirmed),
            (Some(BookingStatus::Failed), BookingStatus::Canceled),
            (Some(BookingStatus::Failed), BookingStatus::Refunded),
            (Some(BookingStatus::Canceled), BookingStatus::Pending),
            (Some(BookingStatus::Canceled), BookingStatus::Confirmed),
            (Some(BookingStatus::Refunded), BookingStatus::Pending),
            (Some(BookingStatus::Refunded), BookingStatus::Confirmed),
            (Some(BookingStatus::Refunded), BookingStatus::Canceled),
        ];
        for (from, to) in invalid {
            assert!(
                !BookingStateMachine::is_valid_transition(from, to),
                "expected {from:?} -> {to} to be invalid"
            );
        }
    }
}
