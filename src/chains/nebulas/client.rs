use crate::config::{ChainConfig, OracleConfig, RpcConfig};
use crate::core::chain::ChainApi;
use crate::core::types::{
    AccountState, Block, CallContract, CallRequest, ContractCallResult, RpcEnvelope,
    ValidatorNode, Vote,
};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the Nebulas node API
pub struct NebulasClient {
    http: Client,
    base_url: String,
    chain: ChainConfig,
    oracle: OracleConfig,
}

impl NebulasClient {
    pub fn new(rpc: &RpcConfig, chain: ChainConfig, oracle: OracleConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(rpc.timeout_secs))
            .build()
            .context("Failed to build node HTTP client")?;
        Ok(Self {
            http,
            base_url: rpc.url.trim_end_matches('/').to_string(),
            chain,
            oracle,
        })
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", endpoint))?;
        Self::decode(endpoint, resp).await
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", endpoint))?;
        Self::decode(endpoint, resp).await
    }

    async fn decode<T: DeserializeOwned>(endpoint: &str, resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            bail!("{} returned bad status code: {}", endpoint, status);
        }
        resp.json::<T>()
            .await
            .with_context(|| format!("Failed to decode {} response", endpoint))
    }

    /// Read-only contract call. Returns the raw `result` string.
    async fn call_contract(&self, contract: &str, function: &str, args: &[&str]) -> Result<String> {
        let request = CallRequest {
            from: self.oracle.caller_address.clone(),
            to: contract.to_string(),
            value: "0".to_string(),
            gas_price: self.oracle.gas_price.clone(),
            gas_limit: self.oracle.gas_limit.clone(),
            contract: CallContract {
                function: function.to_string(),
                args: serde_json::to_string(args)?,
            },
        };
        debug!(contract, function, "Calling contract");

        let envelope: RpcEnvelope<ContractCallResult> =
            self.post("v1/user/call", &request).await?;
        let result = envelope.result;
        if !result.execute_err.is_empty() {
            bail!("{} execution error: {}", function, result.execute_err);
        }
        Ok(result.result)
    }
}

/// Contract results that carry an amount come back as a JSON string literal,
/// e.g. `"\"1000\""`. Empty and `null` mean zero.
pub fn parse_amount_result(raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim().trim_matches('"');
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(trimmed).map_err(|e| anyhow!("Invalid amount result {:?}: {}", raw, e))
}

#[async_trait]
impl ChainApi for NebulasClient {
    async fn latest_irreversible_height(&self) -> Result<u64> {
        let envelope: RpcEnvelope<Block> = self.get("v1/user/lib").await?;
        Ok(envelope.result.height)
    }

    async fn block_by_height(&self, height: u64) -> Result<Block> {
        let body = json!({ "height": height, "full_fill_transaction": true });
        let envelope: RpcEnvelope<Block> = self
            .post("v1/user/getBlockByHeight", &body)
            .await
            .with_context(|| format!("Failed to fetch block {}", height))?;
        Ok(envelope.result)
    }

    async fn account_state(&self, address: &str) -> Result<AccountState> {
        let body = json!({ "address": address });
        let envelope: RpcEnvelope<AccountState> =
            self.post("v1/user/accountstate", &body).await?;
        Ok(envelope.result)
    }

    async fn token_balance(&self, address: &str) -> Result<Decimal> {
        let raw = self
            .call_contract(&self.chain.token_contract, "balanceOf", &[address])
            .await?;
        parse_amount_result(&raw)
    }

    async fn validator_nodes(&self) -> Result<Vec<ValidatorNode>> {
        let raw = self
            .call_contract(&self.chain.staking_contract, &self.oracle.node_list_function, &[])
            .await?;
        serde_json::from_str(&raw).context("Failed to decode validator node list")
    }

    async fn node_votes(&self, node_id: &str) -> Result<Vec<Vote>> {
        let raw = self
            .call_contract(
                &self.chain.staking_contract,
                &self.oracle.node_votes_function,
                &[node_id],
            )
            .await?;
        if raw.trim().is_empty() || raw.trim() == "null" {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to decode vote list of node {}", node_id))
    }

    async fn voted_amount(&self, address: &str) -> Result<Decimal> {
        let raw = self
            .call_contract(
                &self.chain.staking_contract,
                &self.oracle.voted_amount_function,
                &[address],
            )
            .await?;
        parse_amount_result(&raw)
    }
}
