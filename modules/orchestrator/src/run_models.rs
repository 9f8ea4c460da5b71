//! The run's externally visible shapes: the `result_json` every terminal
//! write stores, and the `DossierResult` `await_completion` returns,
//! following the row-to-dossier shape an orchestrator's completion poll
//! returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contracts::RunStatus;
use crate::services::ledger::CostSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultJson {
    pub target_cards_count: i64,
    pub drafts_count: i64,
    pub total_cost_dollars: f64,
    pub cost_summary: CostSummary,
    pub notes: String,
}

impl ResultJson {
    pub fn zero_targets(notes: impl Into<String>) -> Self {
        Self {
            target_cards_count: 0,
            drafts_count: 0,
            total_cost_dollars: 0.0,
            cost_summary: CostSummary::default(),
            notes: notes.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DossierResult {
    pub run_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub tenant_id: Uuid,
    pub trace_id: String,
    pub status: RunStatus,
    pub target_cards_count: i64,
    pub drafts_count: i64,
    pub total_cost_dollars: f64,
    pub cost_summary: CostSummary,
    pub notes: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl DossierResult {
    pub fn from_run(run: &crate::repos::run_repo::Run) -> Self {
        let result: Option<ResultJson> = run
            .result_json
            .clone()
            .and_then(|v| serde_json::from_value(v).ok());

        Self {
            run_id: run.id,
            campaign_id: run.campaign_id,
            tenant_id: run.tenant_id,
            trace_id: run.trace_id.clone(),
            status: run.status,
            target_cards_count: result.as_ref().map(|r| r.target_cards_count).unwrap_or(0),
            drafts_count: result.as_ref().map(|r| r.drafts_count).unwrap_or(0),
            total_cost_dollars: result.as_ref().map(|r| r.total_cost_dollars).unwrap_or(0.0),
            cost_summary: result.map(|r| r.cost_summary).unwrap_or_default(),
            notes: String::new(),
            completed_at: run.completed_at,
            error_message: run.error_message.clone(),
        }
    }

    /// Synthesized when `await_completion` times out before the run reaches
    /// a terminal status — never a real DB row.
    pub fn timeout(tenant_id: Uuid, run_id: Uuid, trace_id: impl Into<String>) -> Self {
        Self {
            run_id,
            campaign_id: None,
            tenant_id,
            trace_id: trace_id.into(),
            status: RunStatus::Failed,
            target_cards_count: 0,
            drafts_count: 0,
            total_cost_dollars: 0.0,
            cost_summary: CostSummary::default(),
            notes: String::new(),
            completed_at: None,
            error_message: Some("await_completion timeout".to_string()),
        }
    }
}
