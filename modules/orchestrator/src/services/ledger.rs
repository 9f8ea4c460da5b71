//! Cost ledger: records provider/operation cost entries; two
//! implementations, an in-memory list (tests, aggregation) and a
//! line-per-entry logging sink (production), using `tracing` rather than a
//! bespoke file writer.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use event_bus::NodeName;
use serde::Serialize;
use uuid::Uuid;

/// `dollars = round(unit_cost × quantity, 6)`.
pub fn compute_cost(unit_cost: f64, quantity: f64) -> f64 {
    (unit_cost * quantity * 1_000_000.0).round() / 1_000_000.0
}

#[derive(Debug, Clone, Serialize)]
pub struct CostEntry {
    pub occurred_at: DateTime<Utc>,
    pub tenant_id: Uuid,
    pub trace_id: String,
    pub run_id: Uuid,
    pub node: NodeName,
    pub provider: String,
    pub operation: String,
    pub unit_cost: f64,
    pub quantity: f64,
    pub dollars: f64,
}

impl CostEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: Uuid,
        trace_id: impl Into<String>,
        run_id: Uuid,
        node: NodeName,
        provider: impl Into<String>,
        operation: impl Into<String>,
        unit_cost: f64,
        quantity: f64,
    ) -> Self {
        Self {
            occurred_at: Utc::now(),
            tenant_id,
            trace_id: trace_id.into(),
            run_id,
            node,
            provider: provider.into(),
            operation: operation.into(),
            unit_cost,
            quantity,
            dollars: compute_cost(unit_cost, quantity),
        }
    }
}

pub trait CostLedger: Send + Sync {
    fn record(&self, entry: CostEntry);

    /// Sum of `dollars` across every entry recorded for `run_id` so far.
    /// Stage G reads this for `result_json.total_cost_dollars`.
    fn total_dollars(&self, run_id: Uuid) -> f64;

    /// Per-node and per-provider dollar sums for `run_id`, for the run's
    /// `result_json.cost_summary`.
    fn summary(&self, run_id: Uuid) -> CostSummary;
}

/// Per-run, per-node, per-provider dollar sums over a run's recorded entries.
#[derive(Debug, Clone, Default, Serialize, serde::Deserialize)]
pub struct CostSummary {
    pub by_node: HashMap<String, f64>,
    pub by_provider: HashMap<String, f64>,
}

/// In-memory ledger: tests and the aggregation `summary`/`total_dollars` used
/// when Stage G writes the run's final `result_json`.
#[derive(Default)]
pub struct InMemoryLedger {
    entries: Mutex<Vec<CostEntry>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn compute_total(&self, run_id: Uuid) -> f64 {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.run_id == run_id)
            .map(|e| e.dollars)
            .sum()
    }

    fn compute_summary(&self, run_id: Uuid) -> CostSummary {
        let entries = self.entries.lock().unwrap();
        let mut summary = CostSummary::default();
        for entry in entries.iter().filter(|e| e.run_id == run_id) {
            *summary.by_node.entry(entry.node.to_string()).or_insert(0.0) += entry.dollars;
            *summary
                .by_provider
                .entry(entry.provider.clone())
                .or_insert(0.0) += entry.dollars;
        }
        summary
    }
}

impl CostLedger for InMemoryLedger {
    fn record(&self, entry: CostEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    fn total_dollars(&self, run_id: Uuid) -> f64 {
        self.compute_total(run_id)
    }

    fn summary(&self, run_id: Uuid) -> CostSummary {
        self.compute_summary(run_id)
    }
}

/// Production ledger: emits one `tracing::info!` structured event per entry
/// rather than a bespoke JSON-lines writer, treating `tracing` as the single
/// sink for everything observability-shaped. Also
/// retains entries in-process (an `InMemoryLedger` underneath) so Stage G can
/// still read `total_dollars`/`summary` for the run that just finished —
/// the log line is for the operator, this retention is for the dossier.
#[derive(Default)]
pub struct LoggingLedger {
    inner: InMemoryLedger,
}

impl LoggingLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CostLedger for LoggingLedger {
    fn record(&self, entry: CostEntry) {
        tracing::info!(
            target: "metismedia.cost",
            tenant_id = %entry.tenant_id,
            trace_id = %entry.trace_id,
            run_id = %entry.run_id,
            node = %entry.node,
            provider = %entry.provider,
            operation = %entry.operation,
            unit_cost = entry.unit_cost,
            quantity = entry.quantity,
            dollars = entry.dollars,
            "cost entry recorded"
        );
        self.inner.record(entry);
    }

    fn total_dollars(&self, run_id: Uuid) -> f64 {
        self.inner.compute_total(run_id)
    }

    fn summary(&self, run_id: Uuid) -> CostSummary {
        self.inner.compute_summary(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_cost_rounds_to_six_decimal_places() {
        assert_eq!(compute_cost(0.0001, 3.0), 0.0003);
    }

    #[test]
    fn in_memory_ledger_sums_only_the_requested_run() {
        let ledger = InMemoryLedger::new();
        let run_a = Uuid::new_v4();
        let run_b = Uuid::new_v4();
        ledger.record(CostEntry::new(
            Uuid::new_v4(),
            "t",
            run_a,
            NodeName::B,
            "mock_llm",
            "embed",
            0.01,
            2.0,
        ));
        ledger.record(CostEntry::new(
            Uuid::new_v4(),
            "t",
            run_b,
            NodeName::B,
            "mock_llm",
            "embed",
            1.0,
            1.0,
        ));
        assert_eq!(ledger.total_dollars(run_a), 0.02);
    }

    #[test]
    fn summary_groups_by_node_and_provider() {
        let ledger = InMemoryLedger::new();
        let run_id = Uuid::new_v4();
        ledger.record(CostEntry::new(
            Uuid::new_v4(),
            "t",
            run_id,
            NodeName::B,
            "mock_llm",
            "embed",
            0.01,
            1.0,
        ));
        ledger.record(CostEntry::new(
            Uuid::new_v4(),
            "t",
            run_id,
            NodeName::C,
            "postgres",
            "insert_receipt",
            0.001,
            1.0,
        ));
        let summary = ledger.summary(run_id);
        assert_eq!(summary.by_node.len(), 2);
        assert_eq!(summary.by_provider.len(), 2);
    }
}
