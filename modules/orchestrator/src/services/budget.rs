//! Cost ledger's companion: the budget guard. Pure — the guard itself
//! never mutates state, the caller updates `BudgetState` after a successful
//! check, which is what lets the guard be reused pre-flight.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, thiserror::Error)]
#[error("budget exceeded ({limit_type}): {message}")]
pub struct BudgetExceeded {
    pub message: String,
    pub limit_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct Budget {
    pub max_dollars: f64,
    pub max_provider_calls: HashMap<String, u64>,
    pub max_node_seconds: HashMap<String, f64>,
}

impl Budget {
    pub fn with_max_dollars(max_dollars: f64) -> Self {
        Self {
            max_dollars,
            max_provider_calls: HashMap::new(),
            max_node_seconds: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BudgetState {
    pub dollars_spent: f64,
    pub provider_calls: HashMap<String, u64>,
    pub started_at: DateTime<Utc>,
}

impl Default for BudgetState {
    fn default() -> Self {
        Self {
            dollars_spent: 0.0,
            provider_calls: HashMap::new(),
            started_at: Utc::now(),
        }
    }
}

/// Check that applying the deltas would not exceed `budget`'s limits.
/// Does not mutate `state` — on success the caller updates `dollars_spent`
/// and `provider_calls` itself. Negative deltas are a programmer error, not
/// a budget condition, so they panic rather than returning `BudgetExceeded`.
///
/// Per-node time limits are advisory here: `max_node_seconds` is carried on
/// `Budget` for callers that want to wrap a handler invocation in a timeout;
/// this guard does not enforce it.
pub fn budget_guard(
    budget: &Budget,
    state: &BudgetState,
    cost_delta: f64,
    provider: Option<&str>,
    calls_delta: u64,
) -> Result<(), BudgetExceeded> {
    assert!(cost_delta >= 0.0, "cost_delta must be >= 0");

    let new_dollars = state.dollars_spent + cost_delta;
    if new_dollars > budget.max_dollars {
        return Err(BudgetExceeded {
            message: format!(
                "{new_dollars:.4} > {} max_dollars",
                budget.max_dollars
            ),
            limit_type: "max_dollars",
        });
    }

    if let Some(provider) = provider {
        if calls_delta > 0 {
            if let Some(&cap) = budget.max_provider_calls.get(provider) {
                let current = *state.provider_calls.get(provider).unwrap_or(&0);
                let new_calls = current + calls_delta;
                if new_calls > cap {
                    return Err(BudgetExceeded {
                        message: format!("{provider} would be {new_calls} > {cap}"),
                        limit_type: "max_provider_calls",
                    });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_spend_within_limit() {
        let budget = Budget::with_max_dollars(5.0);
        let state = BudgetState::default();
        assert!(budget_guard(&budget, &state, 1.0, None, 0).is_ok());
    }

    #[test]
    fn rejects_spend_over_limit() {
        let budget = Budget::with_max_dollars(0.01);
        let state = BudgetState {
            dollars_spent: 0.005,
            ..Default::default()
        };
        let err = budget_guard(&budget, &state, 0.01, None, 0).unwrap_err();
        assert_eq!(err.limit_type, "max_dollars");
    }

    #[test]
    fn rejects_provider_calls_over_cap() {
        let mut budget = Budget::with_max_dollars(100.0);
        budget.max_provider_calls.insert("mock_llm".to_string(), 2);
        let mut state = BudgetState::default();
        state.provider_calls.insert("mock_llm".to_string(), 2);
        let err = budget_guard(&budget, &state, 0.0, Some("mock_llm"), 1).unwrap_err();
        assert_eq!(err.limit_type, "max_provider_calls");
    }

    #[test]
    #[should_panic(expected = "cost_delta must be >= 0")]
    fn rejects_negative_cost_delta() {
        let budget = Budget::with_max_dollars(5.0);
        let state = BudgetState::default();
        let _ = budget_guard(&budget, &state, -1.0, None, 0);
    }
}
