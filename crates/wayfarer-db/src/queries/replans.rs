//! Database query functions for the `replan_proposals` and
//! `replan_applications` tables.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{ProposalChanges, ProposalImpact, ReplanApplication, ReplanProposal};

/// Parameters for inserting a new proposal row.
#[derive(Debug, Clone)]
pub struct NewProposal {
    pub trip_id: Uuid,
    pub trigger_id: Uuid,
    pub score: f64,
    pub explanation: String,
    pub changes: ProposalChanges,
    pub impact: ProposalImpact,
}

/// Insert a new proposal row.
pub async fn insert_proposal(pool: &PgPool, new: &NewProposal) -> Result<ReplanProposal> {
    let proposal = sqlx::query_as::<_, ReplanProposal>(
        "INSERT INTO replan_proposals (trip_id, trigger_id, score, explanation, changes, impact) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(new.trip_id)
    .bind(new.trigger_id)
    .bind(new.score)
    .bind(&new.explanation)
    .bind(Json(&new.changes))
    .bind(Json(&new.impact))
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert proposal for trigger {}", new.trigger_id))?;

    Ok(proposal)
}

/// Fetch a proposal by ID.
pub async fn get_proposal(pool: &PgPool, id: Uuid) -> Result<Option<ReplanProposal>> {
    let proposal =
        sqlx::query_as::<_, ReplanProposal>("SELECT * FROM replan_proposals WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch replan proposal")?;

    Ok(proposal)
}

/// List a trigger's proposals, best score first.
pub async fn list_proposals_for_trigger(
    pool: &PgPool,
    trigger_id: Uuid,
) -> Result<Vec<ReplanProposal>> {
    let proposals = sqlx::query_as::<_, ReplanProposal>(
        "SELECT * FROM replan_proposals \
         WHERE trigger_id = $1 \
         ORDER BY score DESC, created_at ASC",
    )
    .bind(trigger_id)
    .fetch_all(pool)
    .await
    .context("failed to list proposals for trigger")?;

    Ok(proposals)
}

// ---------------------------------------------------------------------------
// Applications
// ---------------------------------------------------------------------------

/// Record a proposal application with its rollback window.
pub async fn insert_application<'e>(
    exec: impl PgExecutor<'e>,
    trip_id: Uuid,
    proposal_id: Uuid,
    idempotency_key: &str,
    applied_version: i32,
    rollback_available_until: DateTime<Utc>,
) -> Result<ReplanApplication> {
    let application = sqlx::query_as::<_, ReplanApplication>(
        "INSERT INTO replan_applications \
             (trip_id, proposal_id, idempotency_key, applied_version, rollback_available_until) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(trip_id)
    .bind(proposal_id)
    .bind(idempotency_key)
    .bind(applied_version)
    .bind(rollback_available_until)
    .fetch_one(exec)
    .await
    .with_context(|| format!("failed to insert application for proposal {proposal_id}"))?;

    Ok(application)
}

/// Fetch an application by ID.
pub async fn get_application(pool: &PgPool, id: Uuid) -> Result<Option<ReplanApplication>> {
    let application =
        sqlx::query_as::<_, ReplanApplication>("SELECT * FROM replan_applications WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch replan application")?;

    Ok(application)
}

/// Find the application previously recorded under an apply idempotency key.
pub async fn get_application_by_key(
    pool: &PgPool,
    idempotency_key: &str,
) -> Result<Option<ReplanApplication>> {
    let application = sqlx::query_as::<_, ReplanApplication>(
        "SELECT * FROM replan_applications WHERE idempotency_key = $1",
    )
    .bind(idempotency_key)
    .fetch_optional(pool)
    .await
    .context("failed to fetch replan application by key")?;

    Ok(application)
}

/// List applications for a trip, newest first.
pub async fn list_applications_for_trip(
    pool: &PgPool,
    trip_id: Uuid,
) -> Result<Vec<ReplanApplication>> {
    let applications = sqlx::query_as::<_, ReplanApplication>(
        "SELECT * FROM replan_applications WHERE trip_id = $1 ORDER BY created_at DESC",
    )
    .bind(trip_id)
    .fetch_all(pool)
    .await
    .context("failed to list applications for trip")?;

    Ok(applications)
}

/// Consume an application's rollback: flips `rolled_back` exactly once.
///
/// The `rolled_back = FALSE` guard makes a second rollback a no-op at the
/// row level; callers inspect the returned row count.
pub async fn mark_application_rolled_back<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE replan_applications \
         SET rolled_back = TRUE, rolled_back_at = now() \
         WHERE id = $1 AND rolled_back = FALSE",
    )
    .bind(id)
    .execute(exec)
    .await
    .context("failed to mark application rolled back")?;

    Ok(result.rows_affected())
}
