//! Stage B → Stage C forwarder, mirroring `handle_node_b_directive_emitted`:
//! a thin republish of the directive's identity fields as `node_c.input`, kept
//! as its own registry entry so Stage B's own scope stays "produce directives".

use event_bus::{make_idempotency_key, EventEnvelope, NodeName, Publisher};

use crate::contracts::payloads::{DirectiveEmittedPayload, PassThroughPayload};

use super::context::{HandlerContext, HandlerError};
use super::registry::Handler;

pub struct DirectiveForwardHandler;

#[async_trait::async_trait]
impl Handler for DirectiveForwardHandler {
    async fn handle(&self, ctx: HandlerContext) -> Result<(), HandlerError> {
        let envelope: EventEnvelope<DirectiveEmittedPayload> = event_bus::from_fields(&ctx.fields)?;
        let tenant_id = envelope.tenant_id;
        let run_id = envelope.run_id;
        let influencer_id = envelope.payload.influencer_id;

        let payload = PassThroughPayload {
            campaign_id: envelope.payload.campaign_id,
            influencer_id,
        };
        let step = format!("forward:{influencer_id}");
        let idempotency_key =
            make_idempotency_key(tenant_id, run_id, NodeName::B, event_bus::EVENT_NODE_C_INPUT, &step);
        let out = EventEnvelope::new(
            tenant_id,
            NodeName::B,
            event_bus::EVENT_NODE_C_INPUT,
            envelope.trace_id.clone(),
            run_id,
            idempotency_key,
            payload,
        );

        Publisher::new(ctx.bus.clone()).publish(&out).await?;
        Ok(())
    }
}
