use log::{error, info};
use mongodb::Database;

use crate::config::Config;
use crate::models::StakeTransaction;
use crate::repositories::transaction_repository;
use crate::services::price_service::PriceService;
use crate::services::solana_rpc::SolanaRpcClient;
use crate::utils::helpers::LAMPORTS_PER_SOL;

/// Locates the on-chain transaction that originated a delegation and records
/// it. Fire-and-forget: failures are logged here and never surface to the
/// reconciler.
pub async fn create_delegate_transaction(
    rpc: &SolanaRpcClient,
    price: &PriceService,
    db: &Database,
    config: &Config,
    address: &str,
    staked_amount: i64,
) {
    if let Err(e) = discover(rpc, price, db, config, address, staked_amount).await {
        error!("Error creating delegate transaction [{}]: {}", address, e);
    }
}

async fn discover(
    rpc: &SolanaRpcClient,
    price: &PriceService,
    db: &Database,
    config: &Config,
    address: &str,
    staked_amount: i64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let signatures = rpc.get_signatures_for_address(address).await?;

    for signature_info in &signatures {
        let transaction = rpc.get_transaction(&signature_info.signature).await?;
        if transaction.is_null() {
            continue;
        }

        let validator_involved = transaction["transaction"]["message"]["accountKeys"]
            .as_array()
            .map_or(false, |keys| {
                keys.iter()
                    .any(|key| key.as_str() == Some(config.validator_pub_key.as_str()))
            });
        if !validator_involved {
            continue;
        }
        let Some(block_time) = transaction["blockTime"].as_i64() else {
            continue;
        };

        let timestamp = block_time * 1000;
        let sol_usd = price.sol_usd_at(timestamp).await?;
        let fee = transaction["meta"]["fee"].as_i64().unwrap_or(0) as f64 / LAMPORTS_PER_SOL as f64;

        transaction_repository::insert(
            db,
            &StakeTransaction {
                delegator_id: address.to_string(),
                timestamp,
                type_: "STAKE".to_string(),
                amount: staked_amount,
                sol_usd,
                transaction_count: signatures.len() as i64,
                transaction_hash: signature_info.signature.clone(),
                fee,
            },
        )
        .await?;

        info!("Transaction created [{}]", address);
    }

    Ok(())
}
