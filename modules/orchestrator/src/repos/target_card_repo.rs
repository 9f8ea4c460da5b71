//! Target card repository (Stage D): idempotent upsert keyed by
//! `(tenant_id, campaign_id, influencer_id)` — a replayed `node_d.input`
//! event must not produce a second row.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct TargetCard {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub campaign_id: Uuid,
    pub influencer_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum TargetCardError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn upsert(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    tenant_id: Uuid,
    campaign_id: Uuid,
    influencer_id: Uuid,
) -> Result<TargetCard, TargetCardError> {
    let card = sqlx::query_as::<_, TargetCard>(
        r#"
        INSERT INTO target_cards (id, tenant_id, campaign_id, influencer_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (tenant_id, campaign_id, influencer_id) DO UPDATE
            SET campaign_id = EXCLUDED.campaign_id
        RETURNING id, tenant_id, campaign_id, influencer_id, created_at
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .bind(campaign_id)
    .bind(influencer_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(card)
}

pub async fn count_for_campaign(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    campaign_id: Uuid,
) -> Result<i64, TargetCardError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT count(*) FROM target_cards WHERE tenant_id = $1 AND campaign_id = $2",
    )
    .bind(tenant_id)
    .bind(campaign_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(count)
}
