//! Stage G: terminal handler. Counts target cards and drafts for the
//! campaign, reads the ledger's per-run totals, and writes the run row to
//! `completed`. Guarded by `run_repo::complete`'s `status = 'running'`
//! predicate, so a replayed `node_g.input` (seed scenario 5) is a no-op.

use event_bus::{EventEnvelope, NodeName};

use crate::contracts::payloads::PassThroughPayload;
use crate::repos::{draft_repo, run_repo, target_card_repo};
use crate::run_models::ResultJson;
use crate::services::budget::budget_guard;
use crate::services::ledger::CostEntry;

use super::context::{HandlerContext, HandlerError};
use super::registry::Handler;

pub struct NodeGHandler;

#[async_trait::async_trait]
impl Handler for NodeGHandler {
    async fn handle(&self, ctx: HandlerContext) -> Result<(), HandlerError> {
        let envelope: EventEnvelope<PassThroughPayload> = event_bus::from_fields(&ctx.fields)?;
        let tenant_id = envelope.tenant_id;
        let run_id = envelope.run_id;
        let campaign_id = envelope.payload.campaign_id;

        {
            let mut budget_state = ctx.budget_state.lock().await;
            budget_guard(&ctx.budget, &budget_state, 0.0, Some("internal"), 1)?;
            ctx.ledger.record(CostEntry::new(
                tenant_id,
                &envelope.trace_id,
                run_id,
                NodeName::G,
                "internal",
                "finalize",
                0.0,
                1.0,
            ));
            budget_state.dollars_spent += 0.0;
            *budget_state
                .provider_calls
                .entry("internal".to_string())
                .or_insert(0) += 1;
        }

        let mut tx = ctx.pool.begin().await?;
        let target_cards_count = target_card_repo::count_for_campaign(&mut tx, tenant_id, campaign_id).await?;
        let drafts_count = draft_repo::count_for_campaign(&mut tx, tenant_id, campaign_id).await?;

        let result = ResultJson {
            target_cards_count,
            drafts_count,
            total_cost_dollars: ctx.ledger.total_dollars(run_id),
            cost_summary: ctx.ledger.summary(run_id),
            notes: "completed".to_string(),
        };
        run_repo::complete(
            &mut tx,
            tenant_id,
            run_id,
            serde_json::to_value(&result).expect("ResultJson always serializes"),
        )
        .await?;
        tx.commit().await?;

        Ok(())
    }
}
