pub mod reserve_top_influencers;
