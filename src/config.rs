use std::env;

pub struct Config {
    pub validator_pub_key: String,
    pub validator_id: String,
    pub solana_endpoint: String,
    pub start_epoch: i64,
    pub delegator_interval_secs: u64,
    pub rewards_interval_secs: u64,
    pub parallel_limit: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            validator_pub_key: env::var("VALIDATOR_PUB_KEY")
                .expect("VALIDATOR_PUB_KEY must be set"),
            validator_id: env::var("VALIDATOR_ID").expect("VALIDATOR_ID must be set"),
            solana_endpoint: env::var("SOLANA_ENDPOINT").expect("SOLANA_ENDPOINT must be set"),
            start_epoch: env::var("START_EPOCH")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap(),
            delegator_interval_secs: env::var("DELEGATOR_INTERVAL_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .unwrap(),
            rewards_interval_secs: env::var("REWARDS_INTERVAL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .unwrap(),
            parallel_limit: env::var("PARALLEL_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap(),
        }
    }
}
