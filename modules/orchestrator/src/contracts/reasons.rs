//! Stable reason codes attached to directives and pulse results.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    MmsBelowPrecheck,
    PulseFailDrift,
    PulseInconclusiveScrape,
}
