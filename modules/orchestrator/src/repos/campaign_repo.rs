//! Campaign repository: one row per run, carrying the finalized brief as
//! `brief_json` so downstream stages can read slots without a typed join.

use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::contracts::CampaignBrief;

#[derive(Debug, Clone, FromRow)]
pub struct Campaign {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub trace_id: String,
    pub run_id: Uuid,
    pub brief_json: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("campaign not found: tenant_id={tenant_id}, campaign_id={campaign_id}")]
    NotFound {
        tenant_id: Uuid,
        campaign_id: Uuid,
    },

    #[error("campaign brief is not valid JSON for its declared shape: {0}")]
    MalformedBrief(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    tenant_id: Uuid,
    trace_id: &str,
    run_id: Uuid,
    brief: &CampaignBrief,
) -> Result<Campaign, CampaignError> {
    let brief_json = serde_json::to_value(brief)?;
    let campaign = sqlx::query_as::<_, Campaign>(
        r#"
        INSERT INTO campaigns (id, tenant_id, trace_id, run_id, brief_json)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, tenant_id, trace_id, run_id, brief_json
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .bind(trace_id)
    .bind(run_id)
    .bind(brief_json)
    .fetch_one(&mut **tx)
    .await?;

    Ok(campaign)
}

pub async fn find_by_id(
    pool: &PgPool,
    tenant_id: Uuid,
    campaign_id: Uuid,
) -> Result<Option<Campaign>, CampaignError> {
    let campaign = sqlx::query_as::<_, Campaign>(
        r#"
        SELECT id, tenant_id, trace_id, run_id, brief_json
        FROM campaigns
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(tenant_id)
    .bind(campaign_id)
    .fetch_optional(pool)
    .await?;

    Ok(campaign)
}

impl Campaign {
    /// Deserializes `brief_json` back into the typed brief. Kept as a
    /// method rather than a query so callers that already hold the row
    /// (e.g. Stage B, already loaded for other fields) don't round-trip.
    pub fn brief(&self) -> Result<CampaignBrief, CampaignError> {
        Ok(serde_json::from_value(self.brief_json.clone())?)
    }
}
