//! Draft repository (Stage F): one insert per influencer; Stage G counts
//! these alongside target cards for the run's `result_json`.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Draft {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub campaign_id: Uuid,
    pub influencer_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    tenant_id: Uuid,
    campaign_id: Uuid,
    influencer_id: Uuid,
) -> Result<Draft, DraftError> {
    let draft = sqlx::query_as::<_, Draft>(
        r#"
        INSERT INTO drafts (id, tenant_id, campaign_id, influencer_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, tenant_id, campaign_id, influencer_id, created_at
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .bind(campaign_id)
    .bind(influencer_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(draft)
}

pub async fn count_for_campaign(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    campaign_id: Uuid,
) -> Result<i64, DraftError> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT count(*) FROM drafts WHERE tenant_id = $1 AND campaign_id = $2")
            .bind(tenant_id)
            .bind(campaign_id)
            .fetch_one(&mut **tx)
            .await?;

    Ok(count)
}
