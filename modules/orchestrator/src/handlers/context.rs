//! The typed context every handler receives. Unlike a signature-inspecting
//! dispatcher that decides at call time whether to pass `ledger`/`budget_state`,
//! every field here is always present — unused fields cost nothing, and the
//! dispatcher never needs reflection.

use std::collections::HashMap;
use std::sync::Arc;

use event_bus::StreamBus;
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::services::budget::{Budget, BudgetState};
use crate::services::ledger::CostLedger;
use crate::services::pulse::PulseChecker;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Budget(#[from] crate::services::budget::BudgetExceeded),

    #[error("envelope decode error: {0}")]
    Decode(#[from] event_bus::DecodeError),

    #[error("bus error: {0}")]
    Bus(#[from] event_bus::BusError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    StageB(#[from] crate::services::stage_b::StageBError),

    #[error(transparent)]
    Run(#[from] crate::repos::run_repo::RunError),

    #[error(transparent)]
    Campaign(#[from] crate::repos::campaign_repo::CampaignError),

    #[error(transparent)]
    Receipt(#[from] crate::repos::receipt_repo::ReceiptError),

    #[error(transparent)]
    TargetCard(#[from] crate::repos::target_card_repo::TargetCardError),

    #[error(transparent)]
    ContactMethod(#[from] crate::repos::contact_method_repo::ContactMethodError),

    #[error(transparent)]
    Draft(#[from] crate::repos::draft_repo::DraftError),
}

/// Per-invocation dependencies, handed to every registered handler. The bus
/// and ledger are shared across the whole worker; `budget_state` is the
/// worker-local, per-`(tenant_id, run_id)` soft estimate — two workers
/// processing the same run hold independent instances, which is accepted
/// imprecision.
#[derive(Clone)]
pub struct HandlerContext {
    pub fields: HashMap<String, String>,
    pub pool: PgPool,
    pub bus: Arc<dyn StreamBus>,
    pub ledger: Arc<dyn CostLedger>,
    pub budget: Arc<Budget>,
    pub budget_state: Arc<Mutex<BudgetState>>,
    pub pulse_checker: Arc<PulseChecker>,
}
