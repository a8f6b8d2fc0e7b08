pub mod database;
pub mod delegator_reconciler;
pub mod http;
pub mod price_service;
pub mod reward_backfill;
pub mod solana_rpc;
pub mod stake_discovery;
