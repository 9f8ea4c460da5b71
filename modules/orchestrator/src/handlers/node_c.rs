//! Stage C: insert one receipt for the influencer, emit `node_d.input`.

use event_bus::{make_idempotency_key, EventEnvelope, NodeName, Publisher};
use uuid::Uuid;

use crate::contracts::payloads::PassThroughPayload;
use crate::repos::receipt_repo;
use crate::services::budget::budget_guard;
use crate::services::ledger::CostEntry;

use super::context::{HandlerContext, HandlerError};
use super::registry::Handler;

pub struct NodeCHandler;

#[async_trait::async_trait]
impl Handler for NodeCHandler {
    async fn handle(&self, ctx: HandlerContext) -> Result<(), HandlerError> {
        let envelope: EventEnvelope<PassThroughPayload> = event_bus::from_fields(&ctx.fields)?;
        let tenant_id = envelope.tenant_id;
        let run_id = envelope.run_id;
        let campaign_id = envelope.payload.campaign_id;
        let influencer_id = envelope.payload.influencer_id;

        {
            let mut budget_state = ctx.budget_state.lock().await;
            budget_guard(&ctx.budget, &budget_state, 0.02, Some("mock_discovery"), 1)?;
            ctx.ledger.record(CostEntry::new(
                tenant_id,
                &envelope.trace_id,
                run_id,
                NodeName::C,
                "mock_discovery",
                "scrape",
                0.02,
                1.0,
            ));
            budget_state.dollars_spent += 0.02;
            *budget_state
                .provider_calls
                .entry("mock_discovery".to_string())
                .or_insert(0) += 1;
        }

        let mut tx = ctx.pool.begin().await?;
        receipt_repo::insert(&mut tx, Uuid::new_v4(), tenant_id, campaign_id, influencer_id).await?;
        tx.commit().await?;

        let payload = PassThroughPayload {
            campaign_id,
            influencer_id,
        };
        let step = influencer_id.to_string();
        let idempotency_key =
            make_idempotency_key(tenant_id, run_id, NodeName::C, event_bus::EVENT_NODE_D_INPUT, &step);
        let out = EventEnvelope::new(
            tenant_id,
            NodeName::C,
            event_bus::EVENT_NODE_D_INPUT,
            envelope.trace_id.clone(),
            run_id,
            idempotency_key,
            payload,
        );
        Publisher::new(ctx.bus.clone()).publish(&out).await?;

        Ok(())
    }
}
