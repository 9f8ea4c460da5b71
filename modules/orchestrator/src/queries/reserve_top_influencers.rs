//! The atomic reservation query: locks a caller-supplied, already
//! vector-ranked and MMS-filtered candidate list and inserts reservation rows
//! for whichever of them are still eligible, in one transaction, so no two
//! active reservations ever exist for the same `(tenant_id, influencer_id)`
//! under arbitrary worker concurrency.
//!
//! Uses the `SELECT ... FOR UPDATE OF i SKIP LOCKED` eligible-candidate CTE
//! pattern used for atomic claims elsewhere in the reference monorepo's
//! outbox dispatcher: the CTE performs the lock/skip, the outer statement
//! fetches the locked rows, and the insert runs against that fixed set — a
//! second worker racing for an overlapping candidate set sees a disjoint
//! remainder, never the same row.
//!
//! Candidate ranking (vector distance, third-rail/platform/geography
//! filtering, MMS threshold and sort) happens before this call, in
//! `services::stage_b` — this query only re-checks the safety predicates
//! that can change between that ranking and this lock (another run claiming
//! the row, a cooling-off window starting) and persists the claim.

use chrono::Duration;
use sqlx::{FromRow, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
struct InsertedReservation {
    influencer_id: Uuid,
    reservation_id: Uuid,
}

#[derive(Debug, Error)]
pub enum ReserveTopInfluencersError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Attempts to reserve every id in `candidate_ids`, preserving their input
/// order (the caller's similarity/MMS ranking). Returns only the ids that
/// were actually still eligible and lockable, paired with their new
/// reservation id. Empty input: empty result, no writes.
pub async fn reserve_candidates(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    candidate_ids: &[Uuid],
    duration: Duration,
    reason: &str,
) -> Result<Vec<(Uuid, Uuid)>, ReserveTopInfluencersError> {
    if candidate_ids.is_empty() {
        return Ok(Vec::new());
    }

    let interval = format!("{} seconds", duration.num_seconds());
    let inserted = sqlx::query_as::<_, InsertedReservation>(
        r#"
        WITH eligible AS (
            SELECT i.id
            FROM influencers i
            WHERE i.tenant_id = $1
              AND i.id = ANY($2::uuid[])
              AND i.do_not_contact = false
              AND (i.cooling_off_until IS NULL OR i.cooling_off_until <= now())
              AND NOT EXISTS (
                  SELECT 1 FROM reservations r
                  WHERE r.tenant_id = i.tenant_id
                    AND r.influencer_id = i.id
                    AND r.reserved_until > now()
              )
            FOR UPDATE OF i SKIP LOCKED
        ),
        inserted AS (
            INSERT INTO reservations (id, tenant_id, influencer_id, reserved_until, reason)
            SELECT gen_random_uuid(), $1, eligible.id, now() + $3::interval, $4
            FROM eligible
            RETURNING id, influencer_id
        )
        SELECT influencer_id, id AS reservation_id FROM inserted
        "#,
    )
    .bind(tenant_id)
    .bind(candidate_ids)
    .bind(interval)
    .bind(reason)
    .fetch_all(&mut **tx)
    .await?;

    let reserved: std::collections::HashMap<Uuid, Uuid> = inserted
        .into_iter()
        .map(|row| (row.influencer_id, row.reservation_id))
        .collect();

    Ok(candidate_ids
        .iter()
        .filter_map(|id| reserved.get(id).map(|rid| (*id, *rid)))
        .collect())
}
