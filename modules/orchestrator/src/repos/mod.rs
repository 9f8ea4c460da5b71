pub mod campaign_repo;
pub mod contact_method_repo;
pub mod draft_repo;
pub mod embedding_repo;
pub mod influencer_repo;
pub mod receipt_repo;
pub mod reservation_repo;
pub mod run_repo;
pub mod target_card_repo;
