//! Endpoint selection and the shared connection state for one process.
//!
//! The session owns the ordered endpoint list, the current verified connection
//! and the index of the last endpoint that passed a liveness probe. It is passed
//! by `&mut` to every fetch routine; there is no global state.

use super::abi::parse_quantity;
use super::transport::RpcTransport;
use crate::error::{DashboardError, Result};
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Position in the priority ordering
    pub index: usize,
    pub url: String,
}

/// An endpoint that answered a liveness probe (or, for direct probing, one that is
/// addressed without a probe).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub endpoint: Endpoint,
    /// Block height seen by the liveness probe
    pub block_number: Option<u64>,
}

impl Connection {
    pub fn unverified(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            block_number: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.endpoint.url
    }

    pub fn index(&self) -> usize {
        self.endpoint.index
    }
}

pub struct RpcSession {
    endpoints: Vec<Endpoint>,
    transport: Arc<dyn RpcTransport>,
    connection: Option<Connection>,
    last_good: usize,
}

impl RpcSession {
    pub fn new(urls: Vec<String>, transport: Arc<dyn RpcTransport>) -> Self {
        let endpoints = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| Endpoint { index, url })
            .collect();
        Self {
            endpoints,
            transport,
            connection: None,
            last_good: 0,
        }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn transport(&self) -> Arc<dyn RpcTransport> {
        Arc::clone(&self.transport)
    }

    pub fn last_good_index(&self) -> usize {
        self.last_good
    }

    pub fn current(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    /// Issues a raw request against one endpoint, outside the shared connection.
    pub async fn raw_request(&self, endpoint: &Endpoint, method: &str, params: Value) -> Result<Value> {
        self.transport.request(&endpoint.url, method, params).await
    }

    /// Liveness probe: current block height.
    pub async fn probe(&self, endpoint: &Endpoint) -> Result<u64> {
        let result = self.raw_request(endpoint, "eth_blockNumber", json!([])).await?;
        let quantity = result.as_str().ok_or_else(|| {
            DashboardError::TransientRpc(format!(
                "{} returned non-string block number: {}",
                endpoint.url, result
            ))
        })?;
        parse_quantity(quantity).map_err(|e| DashboardError::TransientRpc(e.to_string()))
    }

    /// Walks the candidates once, starting at `start` and wrapping around, and binds
    /// the session to the first endpoint that passes the liveness probe.
    pub async fn select_endpoint(&mut self, start: usize) -> Result<Connection> {
        let n = self.endpoints.len();
        if n == 0 {
            return Err(DashboardError::AllEndpointsUnreachable(
                "no RPC endpoints configured".to_string(),
            ));
        }

        let mut failures = Vec::with_capacity(n);
        for offset in 0..n {
            let endpoint = self.endpoints[(start + offset) % n].clone();
            match self.probe(&endpoint).await {
                Ok(block) => {
                    info!(
                        "[RPC select] using endpoint #{} {} (block {})",
                        endpoint.index, endpoint.url, block
                    );
                    self.last_good = endpoint.index;
                    let connection = Connection {
                        endpoint,
                        block_number: Some(block),
                    };
                    self.connection = Some(connection.clone());
                    return Ok(connection);
                }
                Err(e) => {
                    warn!("[RPC select] endpoint #{} {} failed: {}", endpoint.index, endpoint.url, e);
                    failures.push(format!("#{}: {}", endpoint.index, e));
                }
            }
        }

        self.connection = None;
        Err(DashboardError::AllEndpointsUnreachable(failures.join("; ")))
    }

    /// Current connection, or a fresh selection starting at the last good endpoint.
    pub async fn connection(&mut self) -> Result<Connection> {
        match &self.connection {
            Some(connection) => Ok(connection.clone()),
            None => self.select_endpoint(self.last_good).await,
        }
    }

    /// Drops the current connection after a failed call.
    pub fn invalidate(&mut self) {
        if let Some(connection) = self.connection.take() {
            debug!("[RPC] discarding connection to {}", connection.url());
        }
    }
}
