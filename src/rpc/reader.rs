use super::abi::{self, AbiArg, AbiType, AbiValue};
use super::session::Connection;
use super::transport::RpcTransport;
use crate::error::{DashboardError, Result};
use alloy_primitives::{Address, U256};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use log::debug;
use serde_json::json;
use std::sync::Arc;

/// One read-only call against a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewCall {
    pub signature: String,
    pub args: Vec<AbiArg>,
    pub returns: AbiType,
}

impl ViewCall {
    pub fn uint(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            args: Vec::new(),
            returns: AbiType::Uint256,
        }
    }

    pub fn balance_of(holder: Address) -> Self {
        Self {
            signature: "balanceOf(address)".to_string(),
            args: vec![AbiArg::Address(holder)],
            returns: AbiType::Uint256,
        }
    }
}

/// Performs `eth_call` view reads and decodes their results.
///
/// Batched reads go through a stream buffered to `max_in_flight`; with the default
/// of 1 the calls are issued strictly one after the other, which keeps rate-limited
/// public providers from rejecting bursts.
#[derive(Clone)]
pub struct ContractReader {
    transport: Arc<dyn RpcTransport>,
    max_in_flight: usize,
}

impl ContractReader {
    pub fn new(transport: Arc<dyn RpcTransport>, max_in_flight: usize) -> Self {
        Self {
            transport,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Raw `eth_call`; an empty `0x` answer is `NoContractData`, never zero.
    pub async fn call(
        &self,
        connection: &Connection,
        contract: Address,
        signature: &str,
        args: &[AbiArg],
    ) -> Result<Vec<u8>> {
        let data = abi::encode_call(signature, args);
        let params = json!([
            { "to": format!("{:#x}", contract), "data": abi::to_hex(&data) },
            "latest"
        ]);
        let result = self
            .transport
            .request(connection.url(), "eth_call", params)
            .await?;
        let hex = result.as_str().ok_or_else(|| {
            DashboardError::TransientRpc(format!(
                "{} returned non-string eth_call result: {}",
                connection.url(),
                result
            ))
        })?;
        let bytes = abi::from_hex(hex)?;
        if bytes.is_empty() {
            return Err(DashboardError::NoContractData(format!(
                "{} returned empty data for {} on {:#x}",
                connection.url(),
                signature,
                contract
            )));
        }
        debug!("[eth_call {}] {} -> {} bytes", connection.url(), signature, bytes.len());
        Ok(bytes)
    }

    pub async fn read(&self, connection: &Connection, contract: Address, call: &ViewCall) -> Result<AbiValue> {
        let bytes = self.call(connection, contract, &call.signature, &call.args).await?;
        abi::decode(call.returns, &bytes)
    }

    pub async fn read_uint(&self, connection: &Connection, contract: Address, signature: &str) -> Result<U256> {
        self.read(connection, contract, &ViewCall::uint(signature))
            .await?
            .into_uint()
    }

    pub async fn read_decimals(&self, connection: &Connection, contract: Address) -> Result<u8> {
        let call = ViewCall {
            signature: "decimals()".to_string(),
            args: Vec::new(),
            returns: AbiType::Uint8,
        };
        let value = self.read(connection, contract, &call).await?.into_uint()?;
        u8::try_from(value).map_err(|_| DashboardError::Decode(format!("decimals out of range: {}", value)))
    }

    pub async fn read_string(&self, connection: &Connection, contract: Address, signature: &str) -> Result<String> {
        let call = ViewCall {
            signature: signature.to_string(),
            args: Vec::new(),
            returns: AbiType::String,
        };
        self.read(connection, contract, &call).await?.into_string()
    }

    pub async fn read_address(&self, connection: &Connection, contract: Address, signature: &str) -> Result<Address> {
        let call = ViewCall {
            signature: signature.to_string(),
            args: Vec::new(),
            returns: AbiType::Address,
        };
        self.read(connection, contract, &call).await?.into_address()
    }

    /// Reads every call in order and stops at the first failure.
    pub async fn read_batch(
        &self,
        connection: &Connection,
        contract: Address,
        calls: &[ViewCall],
    ) -> Result<Vec<U256>> {
        stream::iter(self.uint_reads(connection, contract, calls))
            .buffered(self.max_in_flight)
            .try_collect()
            .await
    }

    /// Reads every call in order; each result stands on its own.
    pub async fn read_each(
        &self,
        connection: &Connection,
        contract: Address,
        calls: &[ViewCall],
    ) -> Vec<Result<U256>> {
        stream::iter(self.uint_reads(connection, contract, calls))
            .buffered(self.max_in_flight)
            .collect()
            .await
    }

    /// One boxed `uint256` read per call, not yet started.
    fn uint_reads<'a>(
        &'a self,
        connection: &'a Connection,
        contract: Address,
        calls: &'a [ViewCall],
    ) -> Vec<BoxFuture<'a, Result<U256>>> {
        calls
            .iter()
            .map(|call| async move { self.read(connection, contract, call).await?.into_uint() }.boxed())
            .collect()
    }

    /// `eth_getCode` at the latest block.
    pub async fn get_code(&self, connection: &Connection, contract: Address) -> Result<Vec<u8>> {
        let result = self
            .transport
            .request(
                connection.url(),
                "eth_getCode",
                json!([format!("{:#x}", contract), "latest"]),
            )
            .await?;
        let hex = result.as_str().ok_or_else(|| {
            DashboardError::TransientRpc(format!(
                "{} returned non-string eth_getCode result: {}",
                connection.url(),
                result
            ))
        })?;
        abi::from_hex(hex)
    }
}
