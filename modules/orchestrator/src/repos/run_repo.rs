//! Run repository: the row every orchestrator poll and every terminal
//! handler writes to. Exactly one terminal transition per run.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::contracts::RunStatus;

#[derive(Debug, Clone, FromRow)]
pub struct Run {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub trace_id: String,
    pub campaign_id: Option<Uuid>,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result_json: Option<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("run not found: tenant_id={tenant_id}, run_id={run_id}")]
    NotFound { tenant_id: Uuid, run_id: Uuid },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn insert_running(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    tenant_id: Uuid,
    trace_id: &str,
) -> Result<Run, RunError> {
    let run = sqlx::query_as::<_, Run>(
        r#"
        INSERT INTO runs (id, tenant_id, trace_id, status, started_at)
        VALUES ($1, $2, $3, 'running', now())
        RETURNING id, tenant_id, trace_id, campaign_id, status, started_at,
                  completed_at, error_message, result_json
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .bind(trace_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(run)
}

pub async fn link_campaign(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    run_id: Uuid,
    campaign_id: Uuid,
) -> Result<(), RunError> {
    sqlx::query("UPDATE runs SET campaign_id = $1 WHERE tenant_id = $2 AND id = $3")
        .bind(campaign_id)
        .bind(tenant_id)
        .bind(run_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn find_by_id(
    pool: &PgPool,
    tenant_id: Uuid,
    run_id: Uuid,
) -> Result<Option<Run>, RunError> {
    let run = sqlx::query_as::<_, Run>(
        r#"
        SELECT id, tenant_id, trace_id, campaign_id, status, started_at,
               completed_at, error_message, result_json
        FROM runs
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(tenant_id)
    .bind(run_id)
    .fetch_optional(pool)
    .await?;

    Ok(run)
}

/// Writes the run to `completed`. Guarded by `status = 'running'` in the
/// WHERE clause so a duplicate terminal write (e.g. a replayed Stage G
/// envelope, seed scenario 5) is a no-op rather than clobbering `result_json`.
pub async fn complete(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    run_id: Uuid,
    result_json: serde_json::Value,
) -> Result<(), RunError> {
    sqlx::query(
        r#"
        UPDATE runs
        SET status = 'completed', completed_at = now(), result_json = $3
        WHERE tenant_id = $1 AND id = $2 AND status = 'running'
        "#,
    )
    .bind(tenant_id)
    .bind(run_id)
    .bind(result_json)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Writes the run to `failed`. Same running-only guard as `complete`.
pub async fn fail(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    run_id: Uuid,
    error_message: &str,
) -> Result<(), RunError> {
    sqlx::query(
        r#"
        UPDATE runs
        SET status = 'failed', completed_at = now(), error_message = $3
        WHERE tenant_id = $1 AND id = $2 AND status = 'running'
        "#,
    )
    .bind(tenant_id)
    .bind(run_id)
    .bind(error_message)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_error_carries_ids() {
        let tenant_id = Uuid::new_v4();
        let run_id = Uuid::new_v4();
        let err = RunError::NotFound { tenant_id, run_id };
        assert!(err.to_string().contains(&run_id.to_string()));
    }
}
