use std::collections::HashMap;

use log::{error, info};
use mongodb::Database;

use crate::config::Config;
use crate::models::{Reward, UserAction};
use crate::repositories::{delegator_repository, reward_repository};
use crate::services::price_service::PriceService;
use crate::services::solana_rpc::{InflationReward, SolanaRpcClient};
use crate::utils::helpers;

/// One identity the epoch walker tracks. `ledger_id` keys the reward ledger,
/// `pubkey` is the account queried on-chain; they differ only for the
/// validator itself.
pub struct WalkIdentity {
    pub ledger_id: String,
    pub pubkey: String,
    pub activation_epoch: i64,
    pub deactivation_epoch: i64,
    /// -1 when the amount is not tracked (validator scope).
    pub staked_amount: i64,
}

/// Identity scope for one backfill run. The delegator instantiation enforces
/// the activation/deactivation window; the validator instantiation is always
/// eligible.
pub struct WalkScope {
    pub identities: Vec<WalkIdentity>,
    pub enforce_eligibility_window: bool,
}

impl WalkScope {
    /// All currently staked delegators.
    pub async fn active_delegators(db: &Database) -> Result<Self, mongodb::error::Error> {
        let delegators = delegator_repository::find_active(db).await?;
        let identities = delegators
            .into_iter()
            .map(|delegator| WalkIdentity {
                ledger_id: delegator.delegator_id.clone(),
                pubkey: delegator.delegator_id,
                activation_epoch: delegator.activation_epoch,
                deactivation_epoch: delegator.deactivation_epoch,
                staked_amount: delegator.staked_amount,
            })
            .collect();
        Ok(Self {
            identities,
            enforce_eligibility_window: true,
        })
    }

    /// The validator's own rewards, recorded under its ledger identity.
    pub fn validator(config: &Config) -> Self {
        Self {
            identities: vec![WalkIdentity {
                ledger_id: config.validator_id.clone(),
                pubkey: config.validator_pub_key.clone(),
                activation_epoch: 0,
                deactivation_epoch: i64::MAX,
                staked_amount: -1,
            }],
            enforce_eligibility_window: false,
        }
    }

    fn ledger_ids(&self) -> Vec<String> {
        self.identities
            .iter()
            .map(|identity| identity.ledger_id.clone())
            .collect()
    }

    fn pubkeys(&self) -> Vec<String> {
        self.identities
            .iter()
            .map(|identity| identity.pubkey.clone())
            .collect()
    }
}

/// Walks epochs from the scope's resume point up to (but excluding) the
/// network's current epoch, committing one epoch's reward set at a time.
/// An epoch's writes are all-or-nothing: any failure inside an epoch rolls
/// back that epoch's rows before the error surfaces, so the next run resumes
/// at the cleared epoch.
pub async fn run(
    rpc: &SolanaRpcClient,
    price: &PriceService,
    db: &Database,
    config: &Config,
    scope: &WalkScope,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if scope.identities.is_empty() {
        info!("No identities in scope, nothing to backfill");
        return Ok(());
    }

    let ledger_ids = scope.ledger_ids();
    let latest_recorded = reward_repository::find_latest(db, &ledger_ids)
        .await?
        .map(|reward| reward.epoch_num);
    let resume = next_epoch_to_process(latest_recorded, config.start_epoch);
    let latest_epoch = rpc.fetch_latest_epoch().await?;

    // The in-progress epoch's reward is not finalized upstream; stop short.
    for epoch in resume..latest_epoch {
        info!("current epoch: {}, latest epoch: {}", epoch, latest_epoch);
        if let Err(e) = process_epoch(rpc, price, db, scope, epoch).await {
            match reward_repository::delete_epoch(db, &ledger_ids, epoch).await {
                Ok(deleted) => info!("Rolled back {} reward records for epoch {}", deleted, epoch),
                Err(rollback_err) => {
                    error!("Failed to roll back epoch {}: {}", epoch, rollback_err)
                }
            }
            return Err(e);
        }
    }

    info!("Reached latest epoch: {}", latest_epoch);
    Ok(())
}

fn next_epoch_to_process(latest_recorded: Option<i64>, start_epoch: i64) -> i64 {
    match latest_recorded {
        Some(epoch) => epoch + 1,
        None => start_epoch,
    }
}

async fn process_epoch(
    rpc: &SolanaRpcClient,
    price: &PriceService,
    db: &Database,
    scope: &WalkScope,
    epoch: i64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let pubkeys = scope.pubkeys();
    let entries = rpc.get_inflation_rewards(&pubkeys, epoch).await?;
    let rewards = index_rewards_by_pubkey(&pubkeys, entries)?;

    if rewards.is_empty() {
        info!("no rewards for epoch [{}]", epoch);
        return Ok(());
    }

    let mut processed = 0;
    for identity in &scope.identities {
        let Some(entry) = rewards.get(&identity.pubkey) else {
            continue;
        };
        if scope.enforce_eligibility_window
            && !is_epoch_in_reward_window(
                epoch,
                identity.activation_epoch,
                identity.deactivation_epoch,
            )
        {
            continue;
        }

        let block_time = rpc
            .get_block_time(entry.effective_slot)
            .await?
            .ok_or_else(|| format!("no block time for slot {}", entry.effective_slot))?;
        let timestamp = helpers::truncate_to_utc_midnight(block_time * 1000);
        let sol_usd = price.sol_usd_at(timestamp).await?;

        // A re-run landing on the same day replaces the tentative record.
        reward_repository::delete_by_timestamp(db, &identity.ledger_id, timestamp).await?;
        let previous =
            reward_repository::find_latest_for_delegator(db, &identity.ledger_id).await?;
        let record = build_reward_record(identity, entry, previous.as_ref(), timestamp, sol_usd);
        reward_repository::insert(db, &record).await?;
        processed += 1;
    }

    info!("processed {} rewards for epoch [{}]", processed, epoch);
    Ok(())
}

/// Rewards accrue strictly inside the delegation window: the activation and
/// deactivation epochs themselves are excluded.
fn is_epoch_in_reward_window(epoch: i64, activation_epoch: i64, deactivation_epoch: i64) -> bool {
    epoch > activation_epoch && epoch < deactivation_epoch
}

/// Converts the positionally aligned `getInflationReward` response into a
/// pubkey-keyed map, dropping the null entries. A length mismatch means the
/// response cannot be trusted.
fn index_rewards_by_pubkey(
    pubkeys: &[String],
    entries: Vec<Option<InflationReward>>,
) -> Result<HashMap<String, InflationReward>, Box<dyn std::error::Error + Send + Sync>> {
    if entries.len() != pubkeys.len() {
        return Err(format!(
            "inflation reward response has {} entries for {} requested accounts",
            entries.len(),
            pubkeys.len()
        )
        .into());
    }
    Ok(pubkeys
        .iter()
        .cloned()
        .zip(entries)
        .filter_map(|(pubkey, entry)| entry.map(|reward| (pubkey, reward)))
        .collect())
}

fn build_reward_record(
    identity: &WalkIdentity,
    entry: &InflationReward,
    previous: Option<&Reward>,
    timestamp: i64,
    sol_usd: f64,
) -> Reward {
    let mut total_reward = entry.amount;
    let mut pending_rewards = entry.amount;
    if let Some(previous) = previous {
        total_reward += previous.total_reward;
        pending_rewards += previous.pending_rewards;
    }

    Reward {
        delegator_id: identity.ledger_id.clone(),
        epoch_num: entry.epoch,
        timestamp,
        sol_usd,
        user_action: Some(UserAction::Reward),
        reward: entry.amount,
        reward_usd: helpers::convert_sol_usd(entry.amount, sol_usd),
        total_reward,
        total_reward_usd: helpers::convert_sol_usd(total_reward, sol_usd),
        pending_rewards,
        pending_rewards_usd: helpers::convert_sol_usd(pending_rewards, sol_usd),
        post_balance: entry.post_balance,
        post_balance_usd: helpers::convert_sol_usd(entry.post_balance, sol_usd),
        staked_amount: identity.staked_amount,
        staked_amount_usd: if identity.staked_amount < 0 {
            -1.0
        } else {
            helpers::convert_sol_usd(identity.staked_amount, sol_usd)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delegator_identity() -> WalkIdentity {
        WalkIdentity {
            ledger_id: "Delegator1".to_string(),
            pubkey: "Delegator1".to_string(),
            activation_epoch: 100,
            deactivation_epoch: i64::MAX,
            staked_amount: 1_000,
        }
    }

    fn entry(epoch: i64, amount: i64, post_balance: i64) -> InflationReward {
        InflationReward {
            epoch,
            effective_slot: epoch * 432_000,
            amount,
            post_balance,
        }
    }

    #[test]
    fn resumes_after_highest_recorded_epoch() {
        assert_eq!(next_epoch_to_process(Some(100), 0), 101);
        assert_eq!(next_epoch_to_process(None, 420), 420);
    }

    #[test]
    fn window_boundaries_are_exclusive() {
        assert!(!is_epoch_in_reward_window(100, 100, 150));
        assert!(is_epoch_in_reward_window(101, 100, 150));
        assert!(is_epoch_in_reward_window(149, 100, 150));
        assert!(!is_epoch_in_reward_window(150, 100, 150));
    }

    #[test]
    fn indexes_rewards_and_drops_nulls() {
        let pubkeys = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let entries = vec![Some(entry(101, 5, 1_005)), None, Some(entry(101, 7, 2_007))];
        let indexed = index_rewards_by_pubkey(&pubkeys, entries).unwrap();
        assert_eq!(indexed.len(), 2);
        assert_eq!(indexed["A"].amount, 5);
        assert_eq!(indexed["C"].amount, 7);
        assert!(!indexed.contains_key("B"));
    }

    #[test]
    fn misaligned_response_is_rejected() {
        let pubkeys = vec!["A".to_string(), "B".to_string()];
        let entries = vec![Some(entry(101, 5, 1_005))];
        assert!(index_rewards_by_pubkey(&pubkeys, entries).is_err());
    }

    #[test]
    fn cumulative_totals_carry_forward() {
        // Rewards of 5, 6, 7 at epochs 101..=103, with 104 yielding nothing:
        // totals must progress 5, 11, 18.
        let identity = delegator_identity();
        let amounts = [(101, 5), (102, 6), (103, 7)];
        let mut previous: Option<Reward> = None;
        let mut totals = Vec::new();

        for (epoch, amount) in amounts {
            let record = build_reward_record(
                &identity,
                &entry(epoch, amount, 1_000 + amount),
                previous.as_ref(),
                epoch * 86_400_000,
                20.0,
            );
            totals.push(record.total_reward);
            previous = Some(record);
        }

        assert_eq!(totals, vec![5, 11, 18]);
        let last = previous.unwrap();
        assert_eq!(last.pending_rewards, 18);
        assert_eq!(last.total_reward_usd, helpers::convert_sol_usd(18, 20.0));
    }

    #[test]
    fn first_record_starts_totals_at_its_own_amount() {
        let record = build_reward_record(
            &delegator_identity(),
            &entry(101, 5, 1_005),
            None,
            0,
            20.0,
        );
        assert_eq!(record.total_reward, 5);
        assert_eq!(record.pending_rewards, 5);
        assert_eq!(record.user_action, Some(UserAction::Reward));
    }

    #[test]
    fn validator_scope_keeps_untracked_stake_sentinel() {
        let config = Config {
            validator_pub_key: "ValidatorVote1".to_string(),
            validator_id: "validator".to_string(),
            solana_endpoint: "http://localhost:8899".to_string(),
            start_epoch: 0,
            delegator_interval_secs: 1800,
            rewards_interval_secs: 86_400,
            parallel_limit: 10,
        };
        let scope = WalkScope::validator(&config);
        assert!(!scope.enforce_eligibility_window);

        let record = build_reward_record(
            &scope.identities[0],
            &entry(500, 9, 1_009),
            None,
            0,
            20.0,
        );
        assert_eq!(record.delegator_id, "validator");
        assert_eq!(record.staked_amount, -1);
        assert_eq!(record.staked_amount_usd, -1.0);
    }
}
