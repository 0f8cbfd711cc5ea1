//! Integration tests for database migrations and connection pooling.
//!
//! Each test creates a unique temporary database inside a shared
//! containerized PostgreSQL instance (via testcontainers), runs migrations,
//! and drops it on completion so tests are fully isolated and idempotent.

use std::time::Duration;

use wayfarer_db::config::DbConfig;
use wayfarer_db::pool::{self, PoolSettings};

use wayfarer_test_utils::{create_test_db, drop_test_db, pg_url};

/// Expected tables created by the migrations, alphabetically.
const EXPECTED_TABLES: &[&str] = &[
    "booking_idempotency",
    "booking_state_history",
    "bookings",
    "event_signals",
    "itineraries",
    "itinerary_items",
    "itinerary_versions",
    "replan_applications",
    "replan_proposals",
    "replan_triggers",
    "trip_preferences",
    "trips",
];

#[tokio::test]
async fn migrations_create_all_tables() {
    let (temp_pool, db_name) = create_test_db().await;

    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT tablename::text FROM pg_tables \
         WHERE schemaname = 'public' \
         ORDER BY tablename",
    )
    .fetch_all(&temp_pool)
    .await
    .expect("should list tables");

    let user_tables: Vec<&str> = rows
        .iter()
        .map(|(name,)| name.as_str())
        .filter(|t| !t.starts_with("_sqlx"))
        .collect();

    assert_eq!(
        user_tables, EXPECTED_TABLES,
        "migrations should create exactly the expected tables"
    );

    temp_pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let (temp_pool, db_name) = create_test_db().await;

    // create_test_db already ran migrations once; a second run must be a
    // no-op.
    pool::run_migrations(&temp_pool)
        .await
        .expect("second migration run should succeed (idempotent)");

    for table in EXPECTED_TABLES {
        let query = format!("SELECT COUNT(*) FROM {table}");
        let count: (i64,) = sqlx::query_as(&query)
            .fetch_one(&temp_pool)
            .await
            .unwrap_or_else(|e| panic!("failed to count {table}: {e}"));
        assert_eq!(count.0, 0, "table {table} should be empty after migrations");
    }

    temp_pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn connect_with_reaches_a_migrated_database() {
    let (temp_pool, db_name) = create_test_db().await;
    temp_pool.close().await;

    let url = format!("{}/{db_name}", pg_url().await);
    let pool = pool::connect_with(
        &DbConfig::new(url),
        PoolSettings {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        },
    )
    .await
    .expect("connect should succeed");

    let one: (i32,) = sqlx::query_as("SELECT 1")
        .fetch_one(&pool)
        .await
        .expect("simple query should work");
    assert_eq!(one.0, 1);

    pool.close().await;
    drop_test_db(&db_name).await;
}
