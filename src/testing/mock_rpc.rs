//! Scripted in-memory JSON-RPC network.
//!
//! Each endpoint URL can be marked down, can have contracts deployed on it and can
//! answer `eth_call` with canned return data keyed by calldata. Contracts that are
//! not deployed on an endpoint answer `0x`, which is what real nodes do.

use crate::error::{DashboardError, Result};
use crate::holders::HolderPageFetcher;
use crate::rpc::abi::{self, AbiArg};
use crate::rpc::transport::RpcTransport;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub url: String,
    pub method: String,
}

#[derive(Debug, Default)]
struct NetworkState {
    down: HashSet<String>,
    deployed: HashSet<(String, Address)>,
    responses: HashMap<(String, Address, String), Vec<u8>>,
    calls: Vec<RecordedCall>,
}

#[derive(Debug, Clone, Default)]
pub struct MockRpcNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MockRpcNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self) -> Arc<dyn RpcTransport> {
        Arc::new(self.clone())
    }

    pub fn set_down(&self, url: &str) {
        self.lock().down.insert(url.to_string());
    }

    pub fn set_up(&self, url: &str) {
        self.lock().down.remove(url);
    }

    pub fn deploy(&self, url: &str, contract: Address) {
        self.lock().deployed.insert((url.to_string(), contract));
    }

    pub fn set_raw(&self, url: &str, contract: Address, signature: &str, data: Vec<u8>) {
        self.set_call(url, contract, signature, &[], data);
    }

    pub fn set_uint(&self, url: &str, contract: Address, signature: &str, value: U256) {
        self.set_call(url, contract, signature, &[], abi_uint(value));
    }

    pub fn set_balance(&self, url: &str, token: Address, holder: Address, value: U256) {
        self.set_call(
            url,
            token,
            "balanceOf(address)",
            &[AbiArg::Address(holder)],
            abi_uint(value),
        );
    }

    pub fn set_call(&self, url: &str, contract: Address, signature: &str, args: &[AbiArg], data: Vec<u8>) {
        let calldata = abi::to_hex(&abi::encode_call(signature, args));
        self.lock()
            .responses
            .insert((url.to_string(), contract, calldata), data);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.method == method).count()
    }

    pub fn urls_called(&self, method: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .map(|c| c.url.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NetworkState> {
        // a poisoned lock only happens after a panicking test; keep going
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn answer(&self, url: &str, method: &str, params: &Value) -> Result<Value> {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            url: url.to_string(),
            method: method.to_string(),
        });
        if state.down.contains(url) {
            return Err(DashboardError::TransientRpc(format!("{} is unreachable", url)));
        }

        match method {
            "eth_blockNumber" => Ok(json!("0x10d4f")),
            "eth_getCode" => {
                let contract = parse_address(&params[0])?;
                if state.deployed.contains(&(url.to_string(), contract)) {
                    Ok(json!("0x6080604052"))
                } else {
                    Ok(json!("0x"))
                }
            }
            "eth_call" => {
                let contract = parse_address(&params[0]["to"])?;
                if !state.deployed.contains(&(url.to_string(), contract)) {
                    return Ok(json!("0x"));
                }
                let calldata = params[0]["data"]
                    .as_str()
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                match state.responses.get(&(url.to_string(), contract, calldata)) {
                    Some(data) => Ok(json!(abi::to_hex(data))),
                    None => Err(DashboardError::TransientRpc(format!(
                        "{}: execution reverted",
                        url
                    ))),
                }
            }
            other => Err(DashboardError::TransientRpc(format!(
                "{}: method {} not supported",
                url, other
            ))),
        }
    }
}

#[async_trait]
impl RpcTransport for MockRpcNetwork {
    async fn request(&self, url: &str, method: &str, params: Value) -> Result<Value> {
        self.answer(url, method, &params)
    }
}

fn parse_address(value: &Value) -> Result<Address> {
    value
        .as_str()
        .and_then(|s| s.parse::<Address>().ok())
        .ok_or_else(|| DashboardError::Decode(format!("bad address param: {}", value)))
}

/// ABI encoding of a single `uint256` return value.
pub fn abi_uint(value: U256) -> Vec<u8> {
    value.to_be_bytes::<32>().to_vec()
}

/// ABI encoding of a single dynamic `string` return value.
pub fn abi_string(s: &str) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&U256::from(32u8).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(s.len()).to_be_bytes::<32>());
    let mut tail = s.as_bytes().to_vec();
    let padded = s.len().div_ceil(32) * 32;
    tail.resize(padded, 0);
    data.extend_from_slice(&tail);
    data
}

/// Explorer page fetcher returning a fixed body (or failing) and counting requests.
#[derive(Debug, Clone, Default)]
pub struct MockPageFetcher {
    body: Arc<Mutex<Option<String>>>,
    requests: Arc<Mutex<usize>>,
}

impl MockPageFetcher {
    pub fn serving(body: &str) -> Self {
        let fetcher = Self::default();
        fetcher.set_body(Some(body));
        fetcher
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn set_body(&self, body: Option<&str>) {
        *self.body.lock().unwrap_or_else(|e| e.into_inner()) = body.map(str::to_string);
    }

    pub fn requests(&self) -> usize {
        *self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl HolderPageFetcher for MockPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        *self.requests.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        self.body
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| DashboardError::SourceUnavailable(format!("{} unreachable", url)))
    }
}
