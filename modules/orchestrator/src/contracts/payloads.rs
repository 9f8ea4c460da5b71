//! Per-event payload types. Field names must match the wire JSON exactly —
//! every payload here is the `payload` field of an [`event_bus::EventEnvelope`]
//! after `serde_json` round-tripping, so a renamed field silently breaks
//! cross-version compatibility rather than failing to compile.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{CacheStatus, CommercialMode, PolarityIntent, PulseStatus};

/// The brief carried on `node_a.brief_finalized`, matching the required slots
/// in the campaign data model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignBrief {
    pub polarity_intent: PolarityIntent,
    pub commercial_mode: CommercialMode,
    #[serde(default)]
    pub platform_vector: Vec<String>,
    pub geography: Option<String>,
    #[serde(default)]
    pub third_rail_terms: Vec<String>,
    pub query_embedding_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefFinalizedPayload {
    pub campaign_id: Uuid,
    pub brief: CampaignBrief,
}

/// Payload of `node_b.input`, emitted by the node-A pass-through handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeBInputPayload {
    pub campaign_id: Uuid,
    pub query_embedding_id: Option<Uuid>,
    pub limit: u32,
}

/// Payload of `node_b.directive_emitted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveEmittedPayload {
    pub campaign_id: Uuid,
    pub influencer_id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub action: String,
    pub mms: f64,
    pub similarity: f64,
    pub cache_status: CacheStatus,
    pub pulse_status: PulseStatus,
}

/// Payload of `node_c.discovery_needed`, emitted when Stage B's cache status
/// is `cache_miss`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryNeededPayload {
    pub campaign_id: Uuid,
    pub needed_count: u32,
}

/// Shared shape for the pass-through stages C→D→E→F→G: each stage reads the
/// prior stage's `influencer_id`/`campaign_id` pair and forwards it, adding
/// nothing the next stage doesn't also need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassThroughPayload {
    pub campaign_id: Uuid,
    pub influencer_id: Uuid,
}
