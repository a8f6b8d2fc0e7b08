use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserAction {
    #[serde(rename = "REWARD")]
    Reward,
    #[serde(rename = "WITHDRAW")]
    Withdraw,
}

/// Per-epoch reward record. `total_*` and `pending_*` are running sums
/// carried forward from the previous record for the same delegator;
/// `pending_rewards` is only ever decremented by a withdrawal, which this
/// worker does not produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub delegator_id: String,
    pub epoch_num: i64,
    /// Reward block time truncated to UTC midnight, epoch milliseconds.
    pub timestamp: i64,
    pub sol_usd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_action: Option<UserAction>,
    /// Lamports earned this epoch.
    pub reward: i64,
    pub reward_usd: f64,
    pub total_reward: i64,
    pub total_reward_usd: f64,
    pub pending_rewards: i64,
    pub pending_rewards_usd: f64,
    /// Stake account balance right after the reward was applied, lamports.
    pub post_balance: i64,
    pub post_balance_usd: f64,
    /// -1 for the validator's own rewards.
    pub staked_amount: i64,
    pub staked_amount_usd: f64,
}
