//! Stage B composition: prefilter → score → threshold → reserve → pulse →
//! emit. The hardest single handler in the system.
//!
//! This module is a pure-ish composition over an already-open transaction: it
//! never touches the run row or the bus directly. The caller (the Stage B
//! handler) interprets the returned [`StageBOutcome`] into the terminal
//! run-status write and the successor events, matching the narrow-interface
//! design note — this file's only job is the matching/reservation/pulse
//! algorithm.

use chrono::{Duration, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::contracts::{CacheStatus, PulseStatus, ReasonCode};
use crate::queries::reserve_top_influencers::{reserve_candidates, ReserveTopInfluencersError};
use crate::repos::campaign_repo::{self, CampaignError};
use crate::repos::embedding_repo::{self, EmbeddingError};
use crate::repos::influencer_repo::{self, InfluencerError};
use crate::services::budget::{budget_guard, Budget, BudgetExceeded, BudgetState};
use crate::services::ledger::{CostEntry, CostLedger};
use crate::services::matching::{compute_mms, compute_polarity_alignment, compute_recency_score, TAU_PRE};
use crate::services::pulse::{PulseChecker, PulseOutcome};
use event_bus::NodeName;

const RESERVATION_DURATION_HOURS: i64 = 24;
const PULSE_CACHE_TTL_HOURS: i64 = 24;
const SAFETY_PREFILTER_LIMIT: i64 = 200;
const NO_LAST_SCRAPED_AGE_DAYS: f64 = 999.0;
const PULSE_FETCH_LIMIT: u32 = 3;

/// Desired passing-candidate count when the triggering event doesn't name
/// one. Not specified by the data model (campaigns carry no explicit target
/// headcount slot), so Stage A's forwarder fills this in.
pub const DEFAULT_DESIRED_COUNT: u32 = 5;

#[derive(Debug, Error)]
pub enum StageBError {
    #[error(transparent)]
    Campaign(#[from] CampaignError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Influencer(#[from] InfluencerError),
    #[error(transparent)]
    Reserve(#[from] ReserveTopInfluencersError),
    #[error(transparent)]
    Pulse(#[from] crate::services::pulse::PulseError),
    #[error(transparent)]
    BudgetExceeded(#[from] BudgetExceeded),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct Directive {
    pub influencer_id: Uuid,
    pub reservation_id: Uuid,
    pub mms: f64,
    pub similarity: f64,
    pub cache_status: CacheStatus,
    pub pulse_status: PulseStatus,
}

#[derive(Debug, Clone)]
pub enum StageBOutcome {
    /// No campaign row for `campaign_id` — caller marks the run failed.
    CampaignNotFound,
    /// No `query_embedding_id` in payload or brief — completes with zero targets.
    NoQueryEmbedding,
    /// The resolved query embedding row does not exist — caller marks failed.
    CampaignEmbeddingNotFound,
    /// Ran to completion. `directives` may be empty (zero targets, still a
    /// success); `discovery_needed` is set when `cache_status == cache_miss`.
    Completed {
        directives: Vec<Directive>,
        discovery_needed: Option<u32>,
    },
}

#[derive(Debug, FromRow)]
struct PrefilterRow {
    influencer_id: Uuid,
    last_scraped_at: Option<chrono::DateTime<Utc>>,
    polarity_score: Option<i32>,
    similarity: f64,
}

#[allow(clippy::too_many_arguments)]
async fn safety_prefilter_candidates(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    query_embedding_id: Uuid,
    third_rail_terms: &[String],
    platform_vector: &[String],
    geography: Option<&str>,
) -> Result<Vec<PrefilterRow>, sqlx::Error> {
    let third_rail_pattern = if third_rail_terms.is_empty() {
        None
    } else {
        Some(
            third_rail_terms
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|"),
        )
    };

    sqlx::query_as::<_, PrefilterRow>(
        r#"
        WITH query_vector AS (
            SELECT vector FROM embeddings WHERE tenant_id = $1 AND id = $2
        )
        SELECT i.id AS influencer_id, i.last_scraped_at, i.polarity_score,
               1.0 - (e.vector <=> qv.vector) AS similarity
        FROM influencers i
        JOIN embeddings e ON e.tenant_id = i.tenant_id AND e.id = i.bio_embedding_id
        CROSS JOIN query_vector qv
        WHERE i.tenant_id = $1
          AND i.do_not_contact = false
          AND (i.cooling_off_until IS NULL OR i.cooling_off_until <= now())
          AND i.bio_embedding_id IS NOT NULL
          AND NOT EXISTS (
              SELECT 1 FROM reservations r
              WHERE r.tenant_id = i.tenant_id
                AND r.influencer_id = i.id
                AND r.reserved_until > now()
          )
          AND ($3::text IS NULL OR i.bio_text IS NULL OR i.bio_text !~* $3)
          AND ($4::text[] IS NULL OR i.platform = ANY($4))
          AND ($5::text IS NULL OR i.geography ILIKE '%' || $5 || '%')
        ORDER BY (e.vector <=> qv.vector) ASC
        LIMIT $6
        "#,
    )
    .bind(tenant_id)
    .bind(query_embedding_id)
    .bind(third_rail_pattern)
    .bind(if platform_vector.is_empty() {
        None
    } else {
        Some(platform_vector.to_vec())
    })
    .bind(geography)
    .bind(SAFETY_PREFILTER_LIMIT)
    .fetch_all(&mut **tx)
    .await
}

struct ScoredCandidate {
    influencer_id: Uuid,
    similarity: f64,
    mms: f64,
}

fn score_and_filter(rows: Vec<PrefilterRow>, desired_polarity: i32, now: Utc) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = rows
        .into_iter()
        .map(|row| {
            let age_days = row
                .last_scraped_at
                .map(|ts| (now - ts).num_seconds() as f64 / 86_400.0)
                .unwrap_or(NO_LAST_SCRAPED_AGE_DAYS);
            let recency = compute_recency_score(age_days);
            let polarity = compute_polarity_alignment(desired_polarity, row.polarity_score.unwrap_or(0));
            let mms = compute_mms(row.similarity, recency, polarity);
            ScoredCandidate {
                influencer_id: row.influencer_id,
                similarity: row.similarity,
                mms,
            }
        })
        .filter(|c| c.mms >= TAU_PRE)
        .collect();

    scored.sort_by(|a, b| b.mms.partial_cmp(&a.mms).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    pool: &PgPool,
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    run_id: Uuid,
    trace_id: &str,
    campaign_id: Uuid,
    query_embedding_id_override: Option<Uuid>,
    desired_count: u32,
    pulse_checker: &PulseChecker,
    ledger: &dyn CostLedger,
    budget: &Budget,
    budget_state: &mut BudgetState,
) -> Result<StageBOutcome, StageBError> {
    let Some(campaign) = campaign_repo::find_by_id(pool, tenant_id, campaign_id).await? else {
        return Ok(StageBOutcome::CampaignNotFound);
    };
    let brief = campaign.brief()?;

    let query_embedding_id = match query_embedding_id_override.or(brief.query_embedding_id) {
        Some(id) => id,
        None => return Ok(StageBOutcome::NoQueryEmbedding),
    };

    let Some(campaign_embedding) =
        embedding_repo::find_by_id_tx(tx, tenant_id, query_embedding_id).await?
    else {
        return Ok(StageBOutcome::CampaignEmbeddingNotFound);
    };
    let campaign_vector: Vec<f32> = campaign_embedding.vector.to_vec();

    let desired_polarity = match brief.polarity_intent {
        crate::contracts::PolarityIntent::Allies => 10,
        crate::contracts::PolarityIntent::Critics => -10,
        crate::contracts::PolarityIntent::Watchlist => 0,
    };

    let prefiltered = safety_prefilter_candidates(
        tx,
        tenant_id,
        query_embedding_id,
        &brief.third_rail_terms,
        &brief.platform_vector,
        brief.geography.as_deref(),
    )
    .await?;

    let passing = score_and_filter(prefiltered, desired_polarity, Utc::now());

    budget_guard(budget, budget_state, 0.0001, Some("postgres"), 1)?;
    ledger.record(CostEntry::new(
        tenant_id,
        trace_id,
        run_id,
        NodeName::B,
        "postgres",
        "vector_search",
        0.0001,
        1.0,
    ));
    budget_state.dollars_spent += 0.0001;
    *budget_state.provider_calls.entry("postgres".to_string()).or_insert(0) += 1;

    if passing.is_empty() {
        return Ok(StageBOutcome::Completed {
            directives: vec![],
            discovery_needed: Some(desired_count),
        });
    }

    let reserve_count = (2 * desired_count as usize).min(passing.len());
    let candidate_ids: Vec<Uuid> = passing.iter().take(reserve_count).map(|c| c.influencer_id).collect();
    let by_id: std::collections::HashMap<Uuid, &ScoredCandidate> =
        passing.iter().map(|c| (c.influencer_id, c)).collect();

    let reserved = reserve_candidates(
        tx,
        tenant_id,
        &candidate_ids,
        Duration::hours(RESERVATION_DURATION_HOURS),
        "stage_b_directive",
    )
    .await?;

    let mut directives = Vec::new();
    let mut pass_count = 0u32;

    for (influencer_id, reservation_id) in &reserved {
        if pass_count >= desired_count {
            break;
        }
        let scored = by_id.get(influencer_id).expect("reserved id came from candidate_ids");

        let influencer = influencer_repo::find_by_id(pool, tenant_id, *influencer_id)
            .await?
            .ok_or(InfluencerError::NotFound {
                tenant_id,
                influencer_id: *influencer_id,
            })?;

        let cache_fresh = influencer
            .last_pulse_checked_at
            .map(|ts| (Utc::now() - ts) < Duration::hours(PULSE_CACHE_TTL_HOURS))
            .unwrap_or(false)
            && influencer.recent_embedding_id.is_some();

        let (pulse_status, _reason) = if cache_fresh {
            let recent_id = influencer.recent_embedding_id.unwrap();
            let recent_embedding = embedding_repo::find_by_id_tx(tx, tenant_id, recent_id).await?;
            match recent_embedding {
                Some(embedding) => {
                    let sim = crate::services::pulse::cosine_similarity(
                        &campaign_vector,
                        &embedding.vector.to_vec(),
                    );
                    if sim >= crate::services::matching::PULSE_SIMILARITY_MIN {
                        (PulseStatus::Pass, None)
                    } else {
                        (PulseStatus::Fail, Some(ReasonCode::PulseFailDrift))
                    }
                }
                None => (PulseStatus::Inconclusive, Some(ReasonCode::PulseInconclusiveScrape)),
            }
        } else {
            budget_guard(budget, budget_state, 0.01, Some("pulse_provider"), 1)?;
            let summaries = pulse_checker
                .fetch(influencer.primary_url.as_deref(), PULSE_FETCH_LIMIT)
                .await?;
            ledger.record(CostEntry::new(
                tenant_id,
                trace_id,
                run_id,
                NodeName::B,
                "pulse_provider",
                "fetch_summaries",
                0.01,
                1.0,
            ));
            budget_state.dollars_spent += 0.01;
            *budget_state.provider_calls.entry("pulse_provider".to_string()).or_insert(0) += 1;

            let outcome = match summaries {
                None => PulseOutcome::inconclusive(ReasonCode::PulseInconclusiveScrape),
                Some(summaries) if summaries.is_empty() => {
                    PulseOutcome::inconclusive(ReasonCode::PulseInconclusiveScrape)
                }
                Some(summaries) => {
                    budget_guard(budget, budget_state, 0.0001, Some("embedding_provider"), 1)?;
                    let outcome = pulse_checker.compare(&campaign_vector, &summaries).await?;
                    ledger.record(CostEntry::new(
                        tenant_id,
                        trace_id,
                        run_id,
                        NodeName::B,
                        "embedding_provider",
                        "embed",
                        0.0001,
                        1.0,
                    ));
                    budget_state.dollars_spent += 0.0001;
                    *budget_state
                        .provider_calls
                        .entry("embedding_provider".to_string())
                        .or_insert(0) += 1;
                    outcome
                }
            };

            if let Some(fresh) = &outcome.fresh_embedding {
                let new_embedding_id = Uuid::new_v4();
                let norm = (fresh.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>()).sqrt();
                crate::repos::embedding_repo::insert(
                    tx,
                    new_embedding_id,
                    tenant_id,
                    crate::contracts::EmbeddingKind::Recent,
                    "mock-embed-v1",
                    fresh.len() as i32,
                    norm,
                    fresh.clone(),
                )
                .await?;
                influencer_repo::record_pulse_check(tx, tenant_id, *influencer_id, new_embedding_id)
                    .await?;
            }

            (outcome.status, outcome.reason)
        };

        if pulse_status == PulseStatus::Pass {
            pass_count += 1;
            directives.push(Directive {
                influencer_id: *influencer_id,
                reservation_id: *reservation_id,
                mms: scored.mms,
                similarity: scored.similarity,
                cache_status: CacheStatus::CacheHit,
                pulse_status,
            });
        }
    }

    let cache_status = if pass_count >= desired_count {
        CacheStatus::CacheHit
    } else if pass_count > 0 {
        CacheStatus::PartialHit
    } else {
        CacheStatus::CacheMiss
    };
    for directive in &mut directives {
        directive.cache_status = cache_status;
    }

    let discovery_needed = if cache_status == CacheStatus::CacheMiss {
        Some(desired_count.saturating_sub(pass_count))
    } else {
        None
    };

    Ok(StageBOutcome::Completed {
        directives,
        discovery_needed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: Uuid, similarity: f64, age_days: i64, polarity: i32) -> PrefilterRow {
        PrefilterRow {
            influencer_id: id,
            last_scraped_at: Some(Utc::now() - Duration::days(age_days)),
            polarity_score: Some(polarity),
            similarity,
        }
    }

    #[test]
    fn filters_out_candidates_below_the_prefilter_threshold() {
        let rows = vec![row(Uuid::new_v4(), 0.01, 0, 10)];
        let scored = score_and_filter(rows, 10, Utc::now());
        assert!(scored.is_empty(), "near-zero similarity should not clear TAU_PRE");
    }

    #[test]
    fn sorts_passing_candidates_by_mms_descending() {
        let fresh_aligned = Uuid::new_v4();
        let stale_aligned = Uuid::new_v4();
        let rows = vec![row(stale_aligned, 0.99, 2, 10), row(fresh_aligned, 0.99, 0, 10)];
        let scored = score_and_filter(rows, 10, Utc::now());
        assert_eq!(scored.len(), 2, "both candidates should clear TAU_PRE");
        assert_eq!(scored[0].influencer_id, fresh_aligned, "fresher scrape scores higher at equal similarity");
    }

    #[test]
    fn missing_last_scraped_at_is_treated_as_very_stale_not_an_error() {
        let id = Uuid::new_v4();
        let rows = vec![PrefilterRow {
            influencer_id: id,
            last_scraped_at: None,
            polarity_score: Some(10),
            similarity: 0.99,
        }];
        // No panic, and a never-scraped candidate is filtered by staleness
        // like any other — absent data is not a free pass past TAU_PRE.
        let scored = score_and_filter(rows, 10, Utc::now());
        assert!(scored.is_empty());
    }
}
