//! Embedding repository. Rows are immutable after insert; there is no
//! `update` here by design, only `insert` and point lookups.

use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::contracts::EmbeddingKind;

#[derive(Debug, Clone, FromRow)]
pub struct Embedding {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub kind: EmbeddingKind,
    pub model: String,
    pub dims: i32,
    pub norm: f64,
    pub vector: Vector,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding not found: tenant_id={tenant_id}, embedding_id={embedding_id}")]
    NotFound {
        tenant_id: Uuid,
        embedding_id: Uuid,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    tenant_id: Uuid,
    kind: EmbeddingKind,
    model: &str,
    dims: i32,
    norm: f64,
    vector: Vec<f32>,
) -> Result<Embedding, EmbeddingError> {
    let embedding = sqlx::query_as::<_, Embedding>(
        r#"
        INSERT INTO embeddings (id, tenant_id, kind, model, dims, norm, vector)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, tenant_id, kind, model, dims, norm, vector, created_at
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .bind(kind)
    .bind(model)
    .bind(dims)
    .bind(norm)
    .bind(Vector::from(vector))
    .fetch_one(&mut **tx)
    .await?;

    Ok(embedding)
}

pub async fn find_by_id(
    pool: &PgPool,
    tenant_id: Uuid,
    embedding_id: Uuid,
) -> Result<Option<Embedding>, EmbeddingError> {
    let embedding = sqlx::query_as::<_, Embedding>(
        r#"
        SELECT id, tenant_id, kind, model, dims, norm, vector, created_at
        FROM embeddings
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(tenant_id)
    .bind(embedding_id)
    .fetch_optional(pool)
    .await?;

    Ok(embedding)
}

pub async fn find_by_id_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    embedding_id: Uuid,
) -> Result<Option<Embedding>, EmbeddingError> {
    let embedding = sqlx::query_as::<_, Embedding>(
        r#"
        SELECT id, tenant_id, kind, model, dims, norm, vector, created_at
        FROM embeddings
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(tenant_id)
    .bind(embedding_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(embedding)
}
