//! Plan lifecycle engine for the wayfarer trip planner.
//!
//! The engine owns the mutable plan aggregate: it generates itineraries
//! from preferences and a POI selection ([`generator`]), edits and
//! validates them ([`editor`]), tracks external reservations through a
//! state machine with idempotency ([`booking`]), and repairs plans when
//! real-world disruptions land ([`replan`]). External collaborators --
//! POI catalog, routing, weather, booking providers -- are consumed
//! through traits ([`catalog`], [`routing`], [`weather`], [`provider`]).

pub mod booking;
pub mod catalog;
pub mod editor;
pub mod error;
pub mod generator;
pub mod provider;
pub mod replan;
pub mod routing;
pub mod timegeo;
pub mod weather;

pub use error::{EngineError, EngineResult};
