use crate::error::{DashboardError, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::{json, Value};
use std::time::Duration;

/// Carries one JSON-RPC 2.0 request to a given endpoint URL and returns its `result`.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn request(&self, url: &str, method: &str, params: Value) -> Result<Value>;
}

/// JSON-RPC over HTTP POST.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DashboardError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&self, url: &str, method: &str, params: Value) -> Result<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1u64,
            "method": method,
            "params": params,
        });
        debug!("[RPC {}] {} {}", url, method, payload["params"]);

        let resp = self.client.post(url).json(&payload).send().await?;
        if !resp.status().is_success() {
            return Err(DashboardError::TransientRpc(format!(
                "{} answered HTTP {} to {}",
                url,
                resp.status().as_u16(),
                method
            )));
        }
        let body: Value = resp.json().await.map_err(|e| {
            DashboardError::TransientRpc(format!("{} sent malformed JSON for {}: {}", url, method, e))
        })?;
        extract_result(url, method, body)
    }
}

/// Splits a JSON-RPC response envelope into its `result` or an error.
pub fn extract_result(url: &str, method: &str, mut body: Value) -> Result<Value> {
    if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
        warn!("[RPC {}] {} returned error: {}", url, method, err);
        return Err(DashboardError::TransientRpc(format!(
            "{} error for {}: {}",
            url, method, err
        )));
    }
    match body.get_mut("result").map(Value::take) {
        Some(Value::Null) | None => Err(DashboardError::TransientRpc(format!(
            "{} returned no result for {}",
            url, method
        ))),
        Some(result) => Ok(result),
    }
}
