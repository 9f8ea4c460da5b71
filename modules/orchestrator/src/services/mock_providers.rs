//! Stand-in provider implementations for the discovery/profile/contact/draft
//! stages, which are specified at the interface level only — no live
//! scraping or real embedding model is wired up. A deployment swaps these
//! for real clients behind the same traits.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::pulse::{ContentFetcher, ContentSummary, EmbeddingProvider, PulseError};

pub const MOCK_EMBEDDING_DIMS: usize = 64;
pub const MOCK_EMBEDDING_MODEL: &str = "mock-embed-v1";

/// Deterministic pseudo-embedding from a hash of the input text: same text,
/// same vector, every run. Normalized to unit length so cosine similarity
/// behaves like it would against a real model's output.
pub struct MockEmbeddingProvider {
    dims: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dims: MOCK_EMBEDDING_DIMS }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PulseError> {
        let mut raw = Vec::with_capacity(self.dims);
        for i in 0..self.dims {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let bits = hasher.finish();
            let unit = (bits % 1_000_000) as f32 / 1_000_000.0;
            raw.push(unit - 0.5);
        }

        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut raw {
                *x /= norm;
            }
        }
        Ok(raw)
    }
}

/// Up to `limit` canned summaries per reachable URL, nothing for influencers
/// with no known profile. A deployment swaps this for a real scraper behind
/// the same [`ContentFetcher`] trait.
pub struct MockContentFetcher;

#[async_trait]
impl ContentFetcher for MockContentFetcher {
    async fn fetch_recent_summaries(
        &self,
        influencer_url: Option<&str>,
        limit: u32,
    ) -> Result<Option<Vec<ContentSummary>>, PulseError> {
        Ok(influencer_url.map(|url| {
            (0..limit)
                .map(|i| ContentSummary {
                    title: format!("Mock post {i} for {url}"),
                    url: url.to_string(),
                    date: Utc::now(),
                    summary: format!("Mock summary for {url}"),
                })
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embeddings_are_deterministic_for_the_same_text() {
        let provider = MockEmbeddingProvider::new();
        let a = provider.embed("hello").await.unwrap();
        let b = provider.embed("hello").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn embeddings_differ_for_different_text() {
        let provider = MockEmbeddingProvider::new();
        let a = provider.embed("hello").await.unwrap();
        let b = provider.embed("goodbye").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn fetcher_returns_none_without_a_url() {
        let outcome = MockContentFetcher.fetch_recent_summaries(None, 3).await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn fetcher_respects_limit() {
        let outcome = MockContentFetcher
            .fetch_recent_summaries(Some("https://x.example/alice"), 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.len(), 2);
    }
}
