//! Canonical enums shared by every payload and persisted row.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "polarity_intent", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PolarityIntent {
    Allies,
    Critics,
    Watchlist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "commercial_mode", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CommercialMode {
    Earned,
    Paid,
    Hybrid,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    CacheHit,
    PartialHit,
    CacheMiss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PulseStatus {
    Pass,
    Fail,
    Inconclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "embedding_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    Campaign,
    Bio,
    Recent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "run_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}
