use abi_common::log::parse_quantity;
use abi_common::Log;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal Ethereum JSON-RPC client over HTTP.
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> anyhow::Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_result(method, response)
    }

    /// Current head block number.
    pub async fn block_number(&self) -> anyhow::Result<u64> {
        let hex: String = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(&hex).map_err(|e| anyhow::anyhow!(e))
    }

    /// Logs matching an `eth_getLogs` filter object.
    pub async fn get_logs(&self, filter: Value) -> anyhow::Result<Vec<Log>> {
        self.request("eth_getLogs", json!([filter])).await
    }
}

fn parse_result<T: DeserializeOwned>(method: &str, response: RpcResponse) -> anyhow::Result<T> {
    if let Some(err) = response.error {
        anyhow::bail!("{} failed ({}): {}", method, err.code, err.message);
    }
    let result = response
        .result
        .ok_or_else(|| anyhow::anyhow!("{} returned neither result nor error", method))?;
    Ok(serde_json::from_value(result)?)
}
