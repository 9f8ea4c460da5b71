//! Drives `services::stage_b::run` and the `NodeBHandler` wrapper end to
//! end against a real database: the happy path (a matching, cache-fresh
//! candidate reserved and emitted as a directive) and a budget cut short
//! mid-run (the first cost charged inside Stage B already exceeds the
//! budget, and that must surface as `HandlerError::Budget`, not a generic
//! failure).

mod common;

use serial_test::serial;

use std::sync::Arc;

use event_bus::{make_idempotency_key, EventEnvelope, NodeName};
use uuid::Uuid;

use orchestrator::contracts::{
    CampaignBrief, CommercialMode, EmbeddingKind, NodeBInputPayload, PolarityIntent,
};
use orchestrator::handlers::registry::Handler;
use orchestrator::handlers::{node_b::NodeBHandler, HandlerContext};
use orchestrator::repos::{campaign_repo, embedding_repo, run_repo};
use orchestrator::services::budget::Budget;
use orchestrator::services::ledger::{CostLedger, InMemoryLedger};
use orchestrator::services::mock_providers::{MockContentFetcher, MockEmbeddingProvider};
use orchestrator::services::pulse::PulseChecker;
use orchestrator::services::stage_b;

const DIMS: usize = 8;

fn unit_vector(lead: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    v[0] = lead;
    v[1] = (1.0 - lead * lead).max(0.0).sqrt();
    v
}

async fn seed_campaign(
    pool: &sqlx::PgPool,
    tenant_id: Uuid,
    run_id: Uuid,
    campaign_id: Uuid,
    query_embedding_id: Uuid,
) {
    let mut tx = pool.begin().await.unwrap();
    run_repo::insert_running(&mut tx, run_id, tenant_id, "trace-stage-b").await.unwrap();
    embedding_repo::insert(
        &mut tx,
        query_embedding_id,
        tenant_id,
        EmbeddingKind::Campaign,
        "mock-embed-v1",
        DIMS as i32,
        1.0,
        unit_vector(1.0),
    )
    .await
    .unwrap();
    campaign_repo::insert(
        &mut tx,
        campaign_id,
        tenant_id,
        "trace-stage-b",
        run_id,
        &CampaignBrief {
            polarity_intent: PolarityIntent::Allies,
            commercial_mode: CommercialMode::Earned,
            platform_vector: vec![],
            geography: None,
            third_rail_terms: vec![],
            query_embedding_id: Some(query_embedding_id),
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
}

async fn seed_matching_influencer(pool: &sqlx::PgPool, tenant_id: Uuid) -> Uuid {
    let influencer_id = Uuid::new_v4();
    let bio_embedding_id = Uuid::new_v4();
    let recent_embedding_id = Uuid::new_v4();

    let mut tx = pool.begin().await.unwrap();
    embedding_repo::insert(
        &mut tx,
        bio_embedding_id,
        tenant_id,
        EmbeddingKind::Bio,
        "mock-embed-v1",
        DIMS as i32,
        1.0,
        unit_vector(1.0),
    )
    .await
    .unwrap();
    embedding_repo::insert(
        &mut tx,
        recent_embedding_id,
        tenant_id,
        EmbeddingKind::Recent,
        "mock-embed-v1",
        DIMS as i32,
        1.0,
        unit_vector(1.0),
    )
    .await
    .unwrap();
    sqlx::query(
        r#"
        INSERT INTO influencers
            (id, tenant_id, canonical_name, bio_embedding_id, recent_embedding_id,
             last_scraped_at, last_pulse_checked_at, polarity_score, do_not_contact)
        VALUES ($1, $2, 'Matching Influencer', $3, $4, now(), now(), 10, false)
        "#,
    )
    .bind(influencer_id)
    .bind(tenant_id)
    .bind(bio_embedding_id)
    .bind(recent_embedding_id)
    .execute(&mut *tx)
    .await
    .unwrap();
    tx.commit().await.unwrap();

    influencer_id
}

fn test_pulse_checker() -> Arc<PulseChecker> {
    Arc::new(PulseChecker::new(
        Arc::new(MockContentFetcher),
        Arc::new(MockEmbeddingProvider::new()),
    ))
}

#[tokio::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
#[serial]
async fn happy_path_reserves_and_emits_a_passing_directive() {
    let pool = common::get_test_pool().await;
    let tenant_id = common::new_tenant();
    let run_id = Uuid::new_v4();
    let campaign_id = Uuid::new_v4();
    let query_embedding_id = Uuid::new_v4();

    seed_campaign(&pool, tenant_id, run_id, campaign_id, query_embedding_id).await;
    seed_matching_influencer(&pool, tenant_id).await;

    let ledger = InMemoryLedger::new();
    let budget = Budget::with_max_dollars(5.0);
    let mut budget_state = Default::default();
    let pulse_checker = test_pulse_checker();

    let mut tx = pool.begin().await.unwrap();
    let outcome = stage_b::run(
        &pool,
        &mut tx,
        tenant_id,
        run_id,
        "trace-stage-b",
        campaign_id,
        None,
        stage_b::DEFAULT_DESIRED_COUNT,
        &pulse_checker,
        &ledger,
        &budget,
        &mut budget_state,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    match outcome {
        stage_b::StageBOutcome::Completed { directives, .. } => {
            assert_eq!(directives.len(), 1, "the one seeded, on-brand influencer passes");
            assert_eq!(
                directives[0].cache_status,
                orchestrator::contracts::CacheStatus::CacheHit
            );
        }
        other => panic!("expected Completed, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
#[serial]
async fn budget_exhausted_inside_stage_b_surfaces_as_budget_exceeded() {
    let pool = common::get_test_pool().await;
    let tenant_id = common::new_tenant();
    let run_id = Uuid::new_v4();
    let campaign_id = Uuid::new_v4();
    let query_embedding_id = Uuid::new_v4();

    seed_campaign(&pool, tenant_id, run_id, campaign_id, query_embedding_id).await;
    seed_matching_influencer(&pool, tenant_id).await;

    let ledger = InMemoryLedger::new();
    // Lower than the very first cost Stage B charges (prefilter, $0.0001):
    // the budget is blown before a single candidate is even scored.
    let budget = Budget::with_max_dollars(0.0);
    let mut budget_state = Default::default();
    let pulse_checker = test_pulse_checker();

    let mut tx = pool.begin().await.unwrap();
    let result = stage_b::run(
        &pool,
        &mut tx,
        tenant_id,
        run_id,
        "trace-stage-b",
        campaign_id,
        None,
        stage_b::DEFAULT_DESIRED_COUNT,
        &pulse_checker,
        &ledger,
        &budget,
        &mut budget_state,
    )
    .await;

    assert!(
        matches!(result, Err(stage_b::StageBError::BudgetExceeded(_))),
        "expected BudgetExceeded, got {result:?}"
    );
}

#[tokio::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
#[serial]
async fn node_b_handler_fails_the_run_on_budget_exceeded_not_generic_retry() {
    let pool = common::get_test_pool().await;
    let tenant_id = common::new_tenant();
    let run_id = Uuid::new_v4();
    let campaign_id = Uuid::new_v4();
    let query_embedding_id = Uuid::new_v4();

    seed_campaign(&pool, tenant_id, run_id, campaign_id, query_embedding_id).await;
    seed_matching_influencer(&pool, tenant_id).await;

    let payload = NodeBInputPayload {
        campaign_id,
        query_embedding_id: None,
        limit: stage_b::DEFAULT_DESIRED_COUNT,
    };
    let idempotency_key = make_idempotency_key(
        tenant_id,
        run_id,
        NodeName::A,
        event_bus::EVENT_NODE_B_INPUT,
        "proceed",
    );
    let envelope = EventEnvelope::new(
        tenant_id,
        NodeName::A,
        event_bus::EVENT_NODE_B_INPUT,
        "trace-stage-b".to_string(),
        run_id,
        idempotency_key,
        payload,
    );
    let fields = event_bus::to_fields(&envelope).unwrap();

    let bus: Arc<dyn event_bus::StreamBus> = Arc::new(event_bus::InMemoryStreamBus::new());
    let ledger: Arc<dyn CostLedger> = Arc::new(InMemoryLedger::new());
    // Same trap as above, but now through the handler, to pin that the
    // conversion to `HandlerError::Budget` actually happens at this seam.
    let budget = Arc::new(Budget::with_max_dollars(0.0));
    let pulse_checker = test_pulse_checker();

    let ctx = HandlerContext {
        fields,
        pool: pool.clone(),
        bus,
        ledger,
        budget,
        budget_state: Arc::new(tokio::sync::Mutex::new(Default::default())),
        pulse_checker,
    };

    let result = NodeBHandler.handle(ctx).await;
    assert!(
        matches!(result, Err(orchestrator::handlers::HandlerError::Budget(_))),
        "expected HandlerError::Budget, got {result:?}"
    );

    let run = run_repo::find_by_id(&pool, tenant_id, run_id).await.unwrap().unwrap();
    assert_eq!(run.status, orchestrator::contracts::RunStatus::Running);
}
