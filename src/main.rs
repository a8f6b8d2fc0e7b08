use dotenv::dotenv;
use log::{error, info};
use mongodb::Database;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

mod config;
mod models;
mod repositories;
mod services;
mod utils;

use crate::config::Config;
use crate::services::price_service::PriceService;
use crate::services::solana_rpc::SolanaRpcClient;
use crate::services::{database, delegator_reconciler, reward_backfill};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    info!("Starting Solana rewards tracker");
    let config = Arc::new(Config::from_env());

    let db = database::connect_to_database().await?;
    let rpc = Arc::new(SolanaRpcClient::new(config.solana_endpoint.clone()));
    let price = Arc::new(PriceService::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let jobs = vec![
        tokio::spawn(delegator_job_loop(
            Arc::clone(&rpc),
            Arc::clone(&price),
            db.clone(),
            Arc::clone(&config),
            shutdown_rx.clone(),
        )),
        tokio::spawn(rewards_job_loop(
            Arc::clone(&rpc),
            Arc::clone(&price),
            db.clone(),
            Arc::clone(&config),
            shutdown_rx.clone(),
        )),
        tokio::spawn(validator_rewards_job_loop(
            Arc::clone(&rpc),
            Arc::clone(&price),
            db.clone(),
            Arc::clone(&config),
            shutdown_rx,
        )),
    ];

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, letting in-flight jobs finish");
    let _ = shutdown_tx.send(true);
    for job in jobs {
        let _ = job.await;
    }
    info!("All cron jobs stopped");

    Ok(())
}

async fn delegator_job_loop(
    rpc: Arc<SolanaRpcClient>,
    price: Arc<PriceService>,
    db: Database,
    config: Arc<Config>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Delegator cron started");
    let mut ticker = interval(Duration::from_secs(config.delegator_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match delegator_reconciler::run(&rpc, &price, &db, &config).await {
                    Ok(()) => info!("Delegator cron job successfully executed"),
                    Err(e) => error!("Delegator cron job failed: {}", e),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn rewards_job_loop(
    rpc: Arc<SolanaRpcClient>,
    price: Arc<PriceService>,
    db: Database,
    config: Arc<Config>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Rewards cron started");
    let mut ticker = interval(Duration::from_secs(config.rewards_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let result = match reward_backfill::WalkScope::active_delegators(&db).await {
                    Ok(scope) => reward_backfill::run(&rpc, &price, &db, &config, &scope).await,
                    Err(e) => Err(e.into()),
                };
                match result {
                    Ok(()) => info!("Rewards cron job successfully executed"),
                    Err(e) => error!("Rewards cron job failed: {}", e),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn validator_rewards_job_loop(
    rpc: Arc<SolanaRpcClient>,
    price: Arc<PriceService>,
    db: Database,
    config: Arc<Config>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Validator rewards cron started");
    let mut ticker = interval(Duration::from_secs(config.rewards_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let scope = reward_backfill::WalkScope::validator(&config);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match reward_backfill::run(&rpc, &price, &db, &config, &scope).await {
                    Ok(()) => info!("Validator rewards cron job successfully executed"),
                    Err(e) => error!("Validator rewards cron job failed: {}", e),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}
