use serde::{Deserialize, Serialize};

/// One tracked delegation to the validator. `deactivation_epoch` holds
/// `i64::MAX` while the stake has no scheduled deactivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delegator {
    pub delegator_id: String,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
    /// Staked lamports as of the last reconciliation.
    pub staked_amount: i64,
    pub activation_epoch: i64,
    pub deactivation_epoch: i64,
    pub unstaked: bool,
    /// -1 until the delegation is observed unstaked.
    pub unstaked_epoch: i64,
    /// -1 until the delegation is observed unstaked.
    pub unstaked_timestamp: i64,
    pub apr: f64,
}
