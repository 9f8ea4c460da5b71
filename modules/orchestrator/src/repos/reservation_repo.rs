//! Reservation repository: plain CRUD over rows the atomic reservation
//! query (`queries::reserve_top_influencers`) inserts. Kept separate from
//! that query per the narrow-interface design note — this file never
//! performs the locking insert itself.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub influencer_id: Uuid,
    pub reserved_until: DateTime<Utc>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.reserved_until > now
    }
}

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn find_active_for_influencer(
    pool: &PgPool,
    tenant_id: Uuid,
    influencer_id: Uuid,
) -> Result<Option<Reservation>, ReservationError> {
    let reservation = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT id, tenant_id, influencer_id, reserved_until, reason, created_at, updated_at
        FROM reservations
        WHERE tenant_id = $1 AND influencer_id = $2 AND reserved_until > now()
        "#,
    )
    .bind(tenant_id)
    .bind(influencer_id)
    .fetch_optional(pool)
    .await?;

    Ok(reservation)
}

pub async fn find_by_id(
    pool: &PgPool,
    tenant_id: Uuid,
    reservation_id: Uuid,
) -> Result<Option<Reservation>, ReservationError> {
    let reservation = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT id, tenant_id, influencer_id, reserved_until, reason, created_at, updated_at
        FROM reservations
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(tenant_id)
    .bind(reservation_id)
    .fetch_optional(pool)
    .await?;

    Ok(reservation)
}
