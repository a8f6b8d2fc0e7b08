use chrono::Utc;
use futures::stream::{self, StreamExt};
use log::{info, warn};
use mongodb::Database;

use crate::config::Config;
use crate::models::Delegator;
use crate::repositories::{delegator_repository, transaction_repository};
use crate::services::price_service::PriceService;
use crate::services::solana_rpc::{SolanaRpcClient, StakeInfo};
use crate::services::stake_discovery;
use crate::utils::apr;

/// What one reconciliation pass should do with an already-tracked delegator.
#[derive(Debug, PartialEq, Eq)]
enum DelegatorAction {
    /// Deactivation already recorded with the same epoch; nothing to write.
    Noop,
    MarkUnstaked(i64),
    RefreshApr,
}

/// One reconciliation pass: compare the live on-chain delegator set against
/// the store, creating, updating, or retiring records. Per-delegator work
/// runs with bounded concurrency; the absent-set bulk retire only runs once
/// every live delegator processed cleanly.
pub async fn run(
    rpc: &SolanaRpcClient,
    price: &PriceService,
    db: &Database,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let delegations = find_delegators(rpc, config).await?;
    let latest_epoch = rpc.fetch_latest_epoch().await?;
    info!(
        "Reconciling {} live delegations at epoch {}",
        delegations.len(),
        latest_epoch
    );

    let results: Vec<Result<(), Box<dyn std::error::Error + Send + Sync>>> =
        stream::iter(delegations.iter().cloned())
            .map(|delegation| async move {
                process_delegator(rpc, price, db, config, &delegation, latest_epoch).await
            })
            .buffer_unordered(config.parallel_limit)
            .collect()
            .await;
    for result in results {
        result?;
    }

    let live_ids: Vec<String> = delegations.iter().map(|d| d.pubkey.clone()).collect();
    // The exact deactivation epoch is unknown once an account vanishes from
    // the query surface; the previous epoch is the closest safe bound.
    let retired = delegator_repository::mark_unstaked_absent(
        db,
        &live_ids,
        latest_epoch - 1,
        Utc::now().timestamp_millis(),
    )
    .await?;
    if retired > 0 {
        info!("Marked {} vanished delegators as unstaked", retired);
    }

    Ok(())
}

/// The live delegator set: every stake account delegating to the validator,
/// with its delegation window and amount. Accounts whose parsed data carries
/// no delegation are skipped; an exhausted RPC call fails the whole pass.
async fn find_delegators(
    rpc: &SolanaRpcClient,
    config: &Config,
) -> Result<Vec<StakeInfo>, Box<dyn std::error::Error + Send + Sync>> {
    let pubkeys = rpc.get_program_accounts(&config.validator_pub_key).await?;

    let results: Vec<Result<Option<StakeInfo>, Box<dyn std::error::Error + Send + Sync>>> =
        stream::iter(pubkeys)
            .map(|pubkey| async move {
                match rpc.get_stake_info(&pubkey).await? {
                    Some(info) => Ok(Some(info)),
                    None => {
                        warn!("Skipping account without a parseable delegation [{}]", pubkey);
                        Ok(None)
                    }
                }
            })
            .buffer_unordered(config.parallel_limit)
            .collect()
            .await;

    let mut delegations = Vec::new();
    for result in results {
        if let Some(info) = result? {
            delegations.push(info);
        }
    }
    Ok(delegations)
}

async fn process_delegator(
    rpc: &SolanaRpcClient,
    price: &PriceService,
    db: &Database,
    config: &Config,
    delegation: &StakeInfo,
    latest_epoch: i64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let stored = delegator_repository::find_by_id(db, &delegation.pubkey).await?;

    let Some(mut stored) = stored else {
        let mut record =
            new_delegator_record(delegation, latest_epoch, Utc::now().timestamp_millis());
        if !record.unstaked {
            record.apr = apr::find_apr_value(db, &delegation.pubkey, latest_epoch).await?;
        }
        delegator_repository::create(db, &record).await?;
        info!("Created delegator: {}", delegation.pubkey);
        stake_discovery::create_delegate_transaction(
            rpc,
            price,
            db,
            config,
            &delegation.pubkey,
            delegation.stake,
        )
        .await;
        return Ok(());
    };

    // Records created before discovery existed, or where discovery failed,
    // get another chance each pass.
    if !transaction_repository::exists_for_delegator(db, &delegation.pubkey).await? {
        stake_discovery::create_delegate_transaction(
            rpc,
            price,
            db,
            config,
            &delegation.pubkey,
            delegation.stake,
        )
        .await;
    }

    match classify(&stored, delegation.deactivation_epoch, latest_epoch) {
        DelegatorAction::Noop => Ok(()),
        DelegatorAction::MarkUnstaked(unstaked_epoch) => {
            stored.unstaked = true;
            stored.unstaked_epoch = unstaked_epoch;
            delegator_repository::update(db, &stored).await?;
            info!("Unstaked delegator: {}", stored.delegator_id);
            Ok(())
        }
        DelegatorAction::RefreshApr => {
            stored.apr = apr::find_apr_value(db, &stored.delegator_id, latest_epoch).await?;
            delegator_repository::update(db, &stored).await?;
            info!("APR updated for delegator: {}", stored.delegator_id);
            Ok(())
        }
    }
}

fn classify(stored: &Delegator, deactivation_epoch: i64, latest_epoch: i64) -> DelegatorAction {
    if latest_epoch > deactivation_epoch {
        if stored.unstaked && stored.unstaked_epoch == deactivation_epoch {
            DelegatorAction::Noop
        } else {
            DelegatorAction::MarkUnstaked(deactivation_epoch)
        }
    } else {
        DelegatorAction::RefreshApr
    }
}

/// Fresh record for a delegation seen for the first time. APR starts at 0
/// and is computed afterwards for still-active delegations only.
fn new_delegator_record(delegation: &StakeInfo, latest_epoch: i64, now_ms: i64) -> Delegator {
    let unstaked = latest_epoch >= delegation.deactivation_epoch;
    Delegator {
        delegator_id: delegation.pubkey.clone(),
        timestamp: now_ms,
        staked_amount: delegation.stake,
        activation_epoch: delegation.activation_epoch,
        deactivation_epoch: delegation.deactivation_epoch,
        unstaked,
        unstaked_epoch: if unstaked {
            delegation.deactivation_epoch
        } else {
            -1
        },
        unstaked_timestamp: -1,
        apr: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(deactivation_epoch: i64) -> StakeInfo {
        StakeInfo {
            pubkey: "Delegator1".to_string(),
            activation_epoch: 100,
            deactivation_epoch,
            stake: 1_000,
        }
    }

    fn stored(unstaked: bool, unstaked_epoch: i64) -> Delegator {
        Delegator {
            delegator_id: "Delegator1".to_string(),
            timestamp: 0,
            staked_amount: 1_000,
            activation_epoch: 100,
            deactivation_epoch: if unstaked { unstaked_epoch } else { i64::MAX },
            unstaked,
            unstaked_epoch,
            unstaked_timestamp: -1,
            apr: 0.0,
        }
    }

    #[test]
    fn active_delegation_refreshes_apr() {
        let action = classify(&stored(false, -1), i64::MAX, 200);
        assert_eq!(action, DelegatorAction::RefreshApr);
    }

    #[test]
    fn passed_deactivation_marks_unstaked() {
        let action = classify(&stored(false, -1), 150, 200);
        assert_eq!(action, DelegatorAction::MarkUnstaked(150));
    }

    #[test]
    fn reobserved_deactivation_is_a_noop() {
        // Same deactivation epoch seen again on a later pass: no writes.
        let action = classify(&stored(true, 150), 150, 210);
        assert_eq!(action, DelegatorAction::Noop);
    }

    #[test]
    fn deactivation_epoch_not_yet_reached_still_accrues() {
        // Strictly greater-than: the deactivation epoch itself still counts
        // as active for reconciliation purposes.
        let action = classify(&stored(false, -1), 200, 200);
        assert_eq!(action, DelegatorAction::RefreshApr);
    }

    #[test]
    fn new_record_for_active_delegation() {
        let record = new_delegator_record(&live(i64::MAX), 200, 1_700_000_000_000);
        assert!(!record.unstaked);
        assert_eq!(record.unstaked_epoch, -1);
        assert_eq!(record.deactivation_epoch, i64::MAX);
        assert_eq!(record.staked_amount, 1_000);
    }

    #[test]
    fn new_record_for_already_deactivated_delegation() {
        let record = new_delegator_record(&live(180), 200, 1_700_000_000_000);
        assert!(record.unstaked);
        assert_eq!(record.unstaked_epoch, 180);
        assert_eq!(record.apr, 0.0);
    }
}
