use serde::Deserialize;
use serde_json::{json, Value};

use crate::services::http;
use crate::utils::helpers;

const STAKE_PROGRAM_ID: &str = "Stake11111111111111111111111111111111111111";

/// JSON-RPC client for the Solana endpoint. Transient failures are retried
/// with exponential backoff inside the shared HTTP helper; an error surfaced
/// here means retries were exhausted.
pub struct SolanaRpcClient {
    client: reqwest::Client,
    endpoint: String,
}

/// `getInflationReward` entry for one stake account at one epoch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InflationReward {
    pub epoch: i64,
    pub effective_slot: i64,
    /// Lamports credited this epoch.
    pub amount: i64,
    /// Account balance right after the reward was applied, lamports.
    pub post_balance: i64,
}

/// Delegation parsed out of a stake account's jsonParsed data.
#[derive(Debug, Clone)]
pub struct StakeInfo {
    pub pubkey: String,
    pub activation_epoch: i64,
    pub deactivation_epoch: i64,
    /// Delegated lamports.
    pub stake: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignatureInfo {
    pub signature: String,
}

impl SolanaRpcClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let mut response = http::post_json(&self.client, &self.endpoint, &populate_body(method, params)).await?;
        if let Some(rpc_error) = response.get("error") {
            return Err(format!("RPC {} returned error: {}", method, rpc_error).into());
        }
        Ok(response["result"].take())
    }

    /// Current network epoch.
    pub async fn fetch_latest_epoch(&self) -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
        let result = self.call("getEpochInfo", None).await?;
        result["epoch"]
            .as_i64()
            .ok_or_else(|| "malformed getEpochInfo response".into())
    }

    /// Pubkeys of all stake accounts delegating to the validator.
    pub async fn get_program_accounts(
        &self,
        validator_pub_key: &str,
    ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        let params = json!([
            STAKE_PROGRAM_ID,
            {
                "commitment": "confirmed",
                "encoding": "base64",
                "dataSize": 200,
                "filters": [
                    { "memcmp": { "offset": 124, "bytes": validator_pub_key } }
                ],
            }
        ]);
        let result = self.call("getProgramAccounts", Some(params)).await?;
        let accounts = result
            .as_array()
            .ok_or("malformed getProgramAccounts response")?;
        Ok(accounts
            .iter()
            .filter_map(|account| account["pubkey"].as_str().map(str::to_string))
            .collect())
    }

    /// Delegation details for one stake account. `Ok(None)` means the account
    /// exists but its parsed data does not carry a delegation (closed,
    /// non-stake, or malformed) and the caller should skip it.
    pub async fn get_stake_info(
        &self,
        pubkey: &str,
    ) -> Result<Option<StakeInfo>, Box<dyn std::error::Error + Send + Sync>> {
        let result = self
            .call("getAccountInfo", Some(json!([pubkey, { "encoding": "jsonParsed" }])))
            .await?;
        Ok(parse_stake_info(pubkey, &result))
    }

    /// Rewards for the given accounts at one epoch, positionally aligned
    /// with `pubkeys`; `None` entries had no reward.
    pub async fn get_inflation_rewards(
        &self,
        pubkeys: &[String],
        epoch: i64,
    ) -> Result<Vec<Option<InflationReward>>, Box<dyn std::error::Error + Send + Sync>> {
        let result = self
            .call("getInflationReward", Some(json!([pubkeys, { "epoch": epoch }])))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Unix-second block time of a slot; `None` when the node has no time
    /// for it.
    pub async fn get_block_time(
        &self,
        slot: i64,
    ) -> Result<Option<i64>, Box<dyn std::error::Error + Send + Sync>> {
        let result = self.call("getBlockTime", Some(json!([slot]))).await?;
        Ok(result.as_i64())
    }

    pub async fn get_signatures_for_address(
        &self,
        address: &str,
    ) -> Result<Vec<SignatureInfo>, Box<dyn std::error::Error + Send + Sync>> {
        let result = self
            .call("getSignaturesForAddress", Some(json!([address])))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Raw transaction payload; `Value::Null` when the node does not know
    /// the signature.
    pub async fn get_transaction(
        &self,
        signature: &str,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        self.call("getTransaction", Some(json!([signature, "json"]))).await
    }
}

fn populate_body(method: &str, params: Option<Value>) -> Value {
    let mut body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
    });
    if let Some(params) = params {
        body["params"] = params;
    }
    body
}

fn parse_stake_info(pubkey: &str, result: &Value) -> Option<StakeInfo> {
    let delegation = &result["value"]["data"]["parsed"]["info"]["stake"]["delegation"];
    let activation_epoch = helpers::parse_clamped_epoch(delegation["activationEpoch"].as_str()?)?;
    let deactivation_epoch =
        helpers::parse_clamped_epoch(delegation["deactivationEpoch"].as_str()?)?;
    let stake = delegation["stake"].as_str()?.parse::<i64>().ok()?;
    Some(StakeInfo {
        pubkey: pubkey.to_string(),
        activation_epoch,
        deactivation_epoch,
        stake,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_active_delegation() {
        let result = json!({
            "value": {
                "data": {
                    "parsed": {
                        "info": {
                            "stake": {
                                "delegation": {
                                    "activationEpoch": "412",
                                    "deactivationEpoch": "18446744073709551615",
                                    "stake": "5000000000",
                                    "voter": "Vote111"
                                }
                            }
                        }
                    }
                }
            }
        });
        let info = parse_stake_info("StakeAcc1", &result).unwrap();
        assert_eq!(info.pubkey, "StakeAcc1");
        assert_eq!(info.activation_epoch, 412);
        assert_eq!(info.deactivation_epoch, i64::MAX);
        assert_eq!(info.stake, 5_000_000_000);
    }

    #[test]
    fn non_stake_account_yields_none() {
        let result = json!({ "value": { "data": ["AAAA", "base64"] } });
        assert!(parse_stake_info("NotAStake", &result).is_none());
    }

    #[test]
    fn deserializes_inflation_rewards_with_nulls() {
        let result = json!([
            { "epoch": 501, "effectiveSlot": 216_432_000, "amount": 5, "postBalance": 1_005 },
            null,
        ]);
        let rewards: Vec<Option<InflationReward>> = serde_json::from_value(result).unwrap();
        assert_eq!(rewards.len(), 2);
        let first = rewards[0].as_ref().unwrap();
        assert_eq!(first.epoch, 501);
        assert_eq!(first.amount, 5);
        assert!(rewards[1].is_none());
    }

    #[test]
    fn body_omits_params_when_absent() {
        let body = populate_body("getEpochInfo", None);
        assert!(body.get("params").is_none());
        assert_eq!(body["method"], "getEpochInfo");
    }
}
