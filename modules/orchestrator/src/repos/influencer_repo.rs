//! Influencer repository. Carries the safety fields (`do_not_contact`,
//! `cooling_off_until`) and the embedding foreign keys Stage B and the pulse
//! checker read and, for `recent_embedding_id`, write back.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Influencer {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub canonical_name: String,
    pub primary_url: Option<String>,
    pub platform: Option<String>,
    pub geography: Option<String>,
    pub follower_count: Option<i64>,
    pub polarity_score: Option<i32>,
    pub bio_embedding_id: Option<Uuid>,
    pub recent_embedding_id: Option<Uuid>,
    pub bio_text: Option<String>,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub last_pulse_checked_at: Option<DateTime<Utc>>,
    pub do_not_contact: bool,
    pub cooling_off_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum InfluencerError {
    #[error("influencer not found: tenant_id={tenant_id}, influencer_id={influencer_id}")]
    NotFound {
        tenant_id: Uuid,
        influencer_id: Uuid,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn find_by_id(
    pool: &PgPool,
    tenant_id: Uuid,
    influencer_id: Uuid,
) -> Result<Option<Influencer>, InfluencerError> {
    let influencer = sqlx::query_as::<_, Influencer>(
        r#"
        SELECT id, tenant_id, canonical_name, primary_url, platform, geography,
               follower_count, polarity_score, bio_embedding_id, recent_embedding_id,
               bio_text, last_scraped_at, last_pulse_checked_at, do_not_contact,
               cooling_off_until
        FROM influencers
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(tenant_id)
    .bind(influencer_id)
    .fetch_optional(pool)
    .await?;

    Ok(influencer)
}

/// Records a fresh pulse check: updates `last_pulse_checked_at` and
/// `recent_embedding_id` together, in the same transaction as the new
/// embedding insert.
pub async fn record_pulse_check(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    influencer_id: Uuid,
    recent_embedding_id: Uuid,
) -> Result<(), InfluencerError> {
    sqlx::query(
        r#"
        UPDATE influencers
        SET last_pulse_checked_at = now(), recent_embedding_id = $3
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(tenant_id)
    .bind(influencer_id)
    .bind(recent_embedding_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
