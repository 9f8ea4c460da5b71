//! Pulse checker: re-verifies a candidate's current alignment with the
//! campaign against freshly fetched content, rather than trusting a stale
//! cached embedding. No URL to scrape is inconclusive, fetched content below
//! the similarity floor is a fail, everything else is a pass.
//!
//! Fetching and embedding are split into separate steps ([`PulseChecker::fetch`]
//! and [`PulseChecker::compare`]) so a caller metering provider cost can
//! charge each independently; [`PulseChecker::check`] composes the two for
//! callers that don't need that.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::contracts::{PulseStatus, ReasonCode};
use crate::services::matching::PULSE_SIMILARITY_MIN;

/// One piece of recently fetched public content for an influencer.
#[derive(Debug, Clone)]
pub struct ContentSummary {
    pub title: String,
    pub url: String,
    pub date: DateTime<Utc>,
    pub summary: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    #[error("content fetch failed: {0}")]
    Fetch(String),
    #[error("embedding provider failed: {0}")]
    Embed(String),
}

/// Cosine similarity between two equal-length embedding vectors. Returns 0.0
/// for a degenerate (zero-norm) vector rather than dividing by zero — an
/// influencer with no usable signal is indistinguishable from "not similar".
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

#[derive(Debug, Clone)]
pub struct PulseOutcome {
    pub status: PulseStatus,
    pub similarity: Option<f64>,
    pub reason: Option<ReasonCode>,
    /// The freshly computed embedding, when content was actually fetched and
    /// embedded — the caller persists this as the influencer's new recent
    /// embedding so the next run's cache can hit on it.
    pub fresh_embedding: Option<Vec<f32>>,
}

impl PulseOutcome {
    pub(crate) fn inconclusive(reason: ReasonCode) -> Self {
        Self {
            status: PulseStatus::Inconclusive,
            similarity: None,
            reason: Some(reason),
            fresh_embedding: None,
        }
    }
}

/// Fetches recent public content for an influencer to re-embed. Implemented
/// against whatever scraping/API surface a deployment uses; `None` means no
/// reachable URL for this influencer. `limit` caps how many recent items to
/// return.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_recent_summaries(
        &self,
        influencer_url: Option<&str>,
        limit: u32,
    ) -> Result<Option<Vec<ContentSummary>>, PulseError>;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PulseError>;
}

pub struct PulseChecker {
    fetcher: std::sync::Arc<dyn ContentFetcher>,
    embedder: std::sync::Arc<dyn EmbeddingProvider>,
}

impl PulseChecker {
    pub fn new(
        fetcher: std::sync::Arc<dyn ContentFetcher>,
        embedder: std::sync::Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self { fetcher, embedder }
    }

    /// Fetches up to `limit` recent content summaries for `influencer_url`.
    /// `None` means no reachable URL; `Some(vec![])` means a reachable URL
    /// that yielded nothing.
    pub async fn fetch(
        &self,
        influencer_url: Option<&str>,
        limit: u32,
    ) -> Result<Option<Vec<ContentSummary>>, PulseError> {
        self.fetcher.fetch_recent_summaries(influencer_url, limit).await
    }

    /// Embeds the combined fetched content and compares it against the
    /// campaign embedding. Caller is expected to have already handled the
    /// no-content case — `summaries` must be non-empty.
    pub async fn compare(
        &self,
        campaign_embedding: &[f32],
        summaries: &[ContentSummary],
    ) -> Result<PulseOutcome, PulseError> {
        let joined = summaries
            .iter()
            .map(|s| s.summary.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let fresh_embedding = self.embedder.embed(&joined).await?;
        let similarity = cosine_similarity(campaign_embedding, &fresh_embedding);

        if similarity < PULSE_SIMILARITY_MIN {
            return Ok(PulseOutcome {
                status: PulseStatus::Fail,
                similarity: Some(similarity),
                reason: Some(ReasonCode::PulseFailDrift),
                fresh_embedding: Some(fresh_embedding),
            });
        }

        Ok(PulseOutcome {
            status: PulseStatus::Pass,
            similarity: Some(similarity),
            reason: None,
            fresh_embedding: Some(fresh_embedding),
        })
    }

    /// Re-embeds an influencer's recent content and compares it against the
    /// campaign embedding. `influencer_url` is `None` when the influencer has
    /// no known scrapeable profile — inconclusive rather than a fail, since
    /// there is nothing to refute the cached match on. Composes [`Self::fetch`]
    /// and [`Self::compare`]; callers that meter the two steps separately
    /// should call them directly instead.
    pub async fn check(
        &self,
        campaign_embedding: &[f32],
        influencer_url: Option<&str>,
        limit: u32,
    ) -> Result<PulseOutcome, PulseError> {
        let Some(summaries) = self.fetch(influencer_url, limit).await? else {
            return Ok(PulseOutcome::inconclusive(ReasonCode::PulseInconclusiveScrape));
        };
        if summaries.is_empty() {
            return Ok(PulseOutcome::inconclusive(ReasonCode::PulseInconclusiveScrape));
        }
        self.compare(campaign_embedding, &summaries).await
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::HashMap;

    pub struct MockFetcher {
        pub by_url: HashMap<String, Vec<String>>,
    }

    #[async_trait]
    impl ContentFetcher for MockFetcher {
        async fn fetch_recent_summaries(
            &self,
            influencer_url: Option<&str>,
            limit: u32,
        ) -> Result<Option<Vec<ContentSummary>>, PulseError> {
            Ok(influencer_url.and_then(|u| self.by_url.get(u)).map(|summaries| {
                summaries
                    .iter()
                    .take(limit as usize)
                    .map(|s| ContentSummary {
                        title: String::new(),
                        url: influencer_url.unwrap_or_default().to_string(),
                        date: Utc::now(),
                        summary: s.clone(),
                    })
                    .collect()
            }))
        }
    }

    /// Returns a fixed vector regardless of input, keyed only by whether the
    /// text contains a marker substring — enough to steer similarity in tests
    /// without a real embedding model.
    pub struct MockEmbedder {
        pub aligned_marker: &'static str,
        pub aligned_vector: Vec<f32>,
        pub drifted_vector: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, PulseError> {
            if text.contains(self.aligned_marker) {
                Ok(self.aligned_vector.clone())
            } else {
                Ok(self.drifted_vector.clone())
            }
        }
    }
}
