use serde::{Deserialize, Serialize};

/// Originating stake transaction for a delegator, backfilled by the
/// discovery side effect of the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeTransaction {
    pub delegator_id: String,
    /// Block time, epoch milliseconds.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub type_: String,
    /// Staked lamports.
    pub amount: i64,
    pub sol_usd: f64,
    /// Number of signatures found for the delegator at discovery time.
    pub transaction_count: i64,
    pub transaction_hash: String,
    /// Fee in SOL.
    pub fee: f64,
}
