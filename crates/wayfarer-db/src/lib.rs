//! PostgreSQL persistence for the wayfarer trip-planning engine.
//!
//! Layout:
//! - [`config`]: the database-URL resolution chain (flag > env > config
//!   file > default) and URL helpers for the db-init flow.
//! - [`pool`]: pool sizing and embedded migrations.
//! - [`models`]: row structs, status enums, and typed JSONB payloads.
//! - [`queries`]: per-table query functions.
//! - [`tx`]: the per-trip transactional scope used by every multi-row
//!   itinerary mutation.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
pub mod tx;
