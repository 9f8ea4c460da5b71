//! The run's final `result_json.total_cost_dollars` matches the ledger's own
//! sum over every cost entry recorded for that run, including entries prior
//! stages recorded before Stage G ran.

mod common;

use serial_test::serial;

use std::sync::Arc;

use event_bus::{make_idempotency_key, EventEnvelope, NodeName};
use uuid::Uuid;

use orchestrator::contracts::PassThroughPayload;
use orchestrator::handlers::registry::Handler;
use orchestrator::handlers::{node_g::NodeGHandler, HandlerContext};
use orchestrator::repos::run_repo;
use orchestrator::services::budget::Budget;
use orchestrator::services::ledger::{CostEntry, CostLedger, InMemoryLedger};
use orchestrator::services::mock_providers::{MockContentFetcher, MockEmbeddingProvider};
use orchestrator::services::pulse::PulseChecker;

#[tokio::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
#[serial]
async fn result_json_total_matches_the_ledgers_own_sum() {
    let pool = common::get_test_pool().await;
    let tenant_id = common::new_tenant();
    let run_id = Uuid::new_v4();
    let campaign_id = Uuid::new_v4();
    let influencer_id = Uuid::new_v4();

    let mut tx = pool.begin().await.unwrap();
    run_repo::insert_running(&mut tx, run_id, tenant_id, "trace-cost").await.unwrap();
    tx.commit().await.unwrap();

    let ledger = Arc::new(InMemoryLedger::new());
    // Entries recorded by earlier stages before Stage G ever runs.
    ledger.record(CostEntry::new(tenant_id, "trace-cost", run_id, NodeName::B, "mock_embed", "embed", 0.01, 3.0));
    ledger.record(CostEntry::new(tenant_id, "trace-cost", run_id, NodeName::D, "postgres", "upsert_target_card", 0.0001, 1.0));
    let ledger: Arc<dyn CostLedger> = ledger;

    let payload = PassThroughPayload { campaign_id, influencer_id };
    let idempotency_key = make_idempotency_key(tenant_id, run_id, NodeName::F, event_bus::EVENT_NODE_G_INPUT, "finalize");
    let envelope = EventEnvelope::new(
        tenant_id,
        NodeName::F,
        event_bus::EVENT_NODE_G_INPUT,
        "trace-cost".to_string(),
        run_id,
        idempotency_key,
        payload,
    );
    let fields = event_bus::to_fields(&envelope).unwrap();

    let bus: Arc<dyn event_bus::StreamBus> = Arc::new(event_bus::InMemoryStreamBus::new());
    let budget = Arc::new(Budget::with_max_dollars(5.0));
    let pulse_checker = Arc::new(PulseChecker::new(
        Arc::new(MockContentFetcher),
        Arc::new(MockEmbeddingProvider::new()),
    ));

    let ctx = HandlerContext {
        fields,
        pool: pool.clone(),
        bus,
        ledger: ledger.clone(),
        budget,
        budget_state: Arc::new(tokio::sync::Mutex::new(Default::default())),
        pulse_checker,
    };

    NodeGHandler.handle(ctx).await.unwrap();

    let run = run_repo::find_by_id(&pool, tenant_id, run_id).await.unwrap().unwrap();
    let result_json = run.result_json.expect("Stage G always writes result_json");
    let total_from_result = result_json["total_cost_dollars"].as_f64().unwrap();

    assert_eq!(total_from_result, ledger.total_dollars(run_id));
}
