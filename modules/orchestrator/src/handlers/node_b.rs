//! Stage B handler: the thin envelope-in/events-out wrapper around
//! `services::stage_b::run`. This file owns the transaction, the terminal
//! run-status writes, and the successor-event publishes; the matching
//! algorithm itself lives in `services::stage_b`.

use event_bus::{make_idempotency_key, EventEnvelope, NodeName, Publisher};

use crate::contracts::payloads::{DirectiveEmittedPayload, DiscoveryNeededPayload, NodeBInputPayload};
use crate::repos::run_repo;
use crate::run_models::ResultJson;
use crate::services::stage_b::{self, StageBError, StageBOutcome};

use super::context::{HandlerContext, HandlerError};
use super::registry::Handler;

pub struct NodeBHandler;

#[async_trait::async_trait]
impl Handler for NodeBHandler {
    async fn handle(&self, ctx: HandlerContext) -> Result<(), HandlerError> {
        let envelope: EventEnvelope<NodeBInputPayload> = event_bus::from_fields(&ctx.fields)?;
        let tenant_id = envelope.tenant_id;
        let run_id = envelope.run_id;
        let campaign_id = envelope.payload.campaign_id;

        let mut tx = ctx.pool.begin().await?;
        let mut budget_state = ctx.budget_state.lock().await;

        let outcome = match stage_b::run(
            &ctx.pool,
            &mut tx,
            tenant_id,
            run_id,
            &envelope.trace_id,
            campaign_id,
            envelope.payload.query_embedding_id,
            envelope.payload.limit,
            &ctx.pulse_checker,
            ctx.ledger.as_ref(),
            &ctx.budget,
            &mut budget_state,
        )
        .await
        {
            Ok(outcome) => outcome,
            // A budget overrun inside Stage B is fatal for the run, same as one
            // raised directly in a handler — it must surface as `HandlerError::Budget`,
            // not get folded into the generic `StageB` variant the retry path falls
            // through on.
            Err(StageBError::BudgetExceeded(exceeded)) => {
                drop(budget_state);
                return Err(HandlerError::Budget(exceeded));
            }
            Err(other) => {
                drop(budget_state);
                return Err(HandlerError::StageB(other));
            }
        };
        drop(budget_state);

        match outcome {
            StageBOutcome::CampaignNotFound => {
                run_repo::fail(&mut tx, tenant_id, run_id, "campaign not found").await?;
                tx.commit().await?;
            }
            StageBOutcome::NoQueryEmbedding => {
                let result = ResultJson::zero_targets("no query embedding resolvable for campaign");
                run_repo::complete(
                    &mut tx,
                    tenant_id,
                    run_id,
                    serde_json::to_value(&result).expect("ResultJson always serializes"),
                )
                .await?;
                tx.commit().await?;
            }
            StageBOutcome::CampaignEmbeddingNotFound => {
                run_repo::fail(&mut tx, tenant_id, run_id, "campaign embedding not found").await?;
                tx.commit().await?;
            }
            StageBOutcome::Completed {
                directives,
                discovery_needed,
            } => {
                if directives.is_empty() {
                    let result = ResultJson::zero_targets("no candidates passed the precheck");
                    run_repo::complete(
                        &mut tx,
                        tenant_id,
                        run_id,
                        serde_json::to_value(&result).expect("ResultJson always serializes"),
                    )
                    .await?;
                }
                tx.commit().await?;

                let publisher = Publisher::new(ctx.bus.clone());

                for directive in &directives {
                    let payload = DirectiveEmittedPayload {
                        campaign_id,
                        influencer_id: directive.influencer_id,
                        reservation_id: Some(directive.reservation_id),
                        action: "proceed".to_string(),
                        mms: directive.mms,
                        similarity: directive.similarity,
                        cache_status: directive.cache_status,
                        pulse_status: directive.pulse_status,
                    };
                    let step = format!("proceed:{}", directive.influencer_id);
                    let idempotency_key = make_idempotency_key(
                        tenant_id,
                        run_id,
                        NodeName::B,
                        event_bus::EVENT_DIRECTIVE_EMITTED,
                        &step,
                    );
                    let out = EventEnvelope::new(
                        tenant_id,
                        NodeName::B,
                        event_bus::EVENT_DIRECTIVE_EMITTED,
                        envelope.trace_id.clone(),
                        run_id,
                        idempotency_key,
                        payload,
                    );
                    publisher.publish(&out).await?;
                }

                if let Some(needed_count) = discovery_needed {
                    let payload = DiscoveryNeededPayload {
                        campaign_id,
                        needed_count,
                    };
                    let idempotency_key = make_idempotency_key(
                        tenant_id,
                        run_id,
                        NodeName::B,
                        event_bus::EVENT_DISCOVERY_NEEDED,
                        "discovery_needed",
                    );
                    let out = EventEnvelope::new(
                        tenant_id,
                        NodeName::B,
                        event_bus::EVENT_DISCOVERY_NEEDED,
                        envelope.trace_id.clone(),
                        run_id,
                        idempotency_key,
                        payload,
                    );
                    publisher.publish(&out).await?;
                }
            }
        }

        Ok(())
    }
}
