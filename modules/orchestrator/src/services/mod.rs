pub mod budget;
pub mod ledger;
pub mod matching;
pub mod mock_providers;
pub mod pulse;
pub mod stage_b;
