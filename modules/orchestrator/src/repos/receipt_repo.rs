//! Receipt repository (Stage C): one insert per influencer processed.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Receipt {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub campaign_id: Uuid,
    pub influencer_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    tenant_id: Uuid,
    campaign_id: Uuid,
    influencer_id: Uuid,
) -> Result<Receipt, ReceiptError> {
    let receipt = sqlx::query_as::<_, Receipt>(
        r#"
        INSERT INTO receipts (id, tenant_id, campaign_id, influencer_id)
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

    Ok(receipt)
}
