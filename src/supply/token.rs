use crate::config::Config;
use crate::error::Result;
use crate::rpc::{ContractReader, RpcSession, ViewCall};
use alloy_primitives::{Address, U256};
use log::{info, warn};
use std::collections::HashMap;

/// Where and how to read the token figures.
#[derive(Debug, Clone)]
pub struct TokenSource {
    pub address: Address,
    /// Used when `symbol()` cannot be read
    pub fallback_symbol: String,
    /// Supply minted at launch; any shortfall of `totalSupply()` against it counts as burned
    pub initial_supply: U256,
    pub burn_addresses: Vec<Address>,
    pub non_circulating_addresses: Vec<Address>,
}

impl TokenSource {
    pub fn from_config(config: &Config) -> Self {
        Self {
            address: config.token_address,
            fallback_symbol: config.token_symbol.clone(),
            initial_supply: config.initial_supply,
            burn_addresses: config.burn_addresses.clone(),
            non_circulating_addresses: config.non_circulating_addresses.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSnapshot {
    pub total_supply: U256,
    pub decimals: u8,
    pub symbol: String,
    /// Sum of balances held at the burn addresses
    pub burn_address_balance: U256,
    /// `max(0, initial_supply - total_supply)`
    pub supply_shrinkage: U256,
    /// `burn_address_balance + supply_shrinkage`
    pub burned: U256,
    pub non_circulating: U256,
}

/// Reads supply, decimals and the burn / non-circulating balances through the
/// session's connection, one call at a time.
///
/// `totalSupply()` and `decimals()` must succeed; a failure there drops the
/// connection and fails the snapshot. A failing balance read only loses that one
/// address, which then counts as zero.
pub async fn fetch_token_snapshot(
    session: &mut RpcSession,
    reader: &ContractReader,
    source: &TokenSource,
) -> Result<TokenSnapshot> {
    let connection = session.connection().await?;

    let head = async {
        let total_supply = reader
            .read_uint(&connection, source.address, "totalSupply()")
            .await?;
        let decimals = reader.read_decimals(&connection, source.address).await?;
        Ok::<_, crate::error::DashboardError>((total_supply, decimals))
    };
    let (total_supply, decimals) = match head.await {
        Ok(v) => v,
        Err(e) => {
            warn!("[token] supply read via {} failed: {}", connection.url(), e);
            if e.should_switch_endpoint() {
                session.invalidate();
            }
            return Err(e);
        }
    };

    let symbol = match reader.read_string(&connection, source.address, "symbol()").await {
        Ok(s) if !s.trim().is_empty() => s,
        Ok(_) => source.fallback_symbol.clone(),
        Err(e) => {
            warn!("[token] symbol() unavailable ({}), using {}", e, source.fallback_symbol);
            source.fallback_symbol.clone()
        }
    };

    // each distinct holder is read once even when it sits on both lists
    let mut holders: Vec<Address> = Vec::new();
    for addr in source
        .burn_addresses
        .iter()
        .chain(source.non_circulating_addresses.iter())
    {
        if !holders.contains(addr) {
            holders.push(*addr);
        }
    }
    let calls: Vec<ViewCall> = holders.iter().copied().map(ViewCall::balance_of).collect();
    let results = reader.read_each(&connection, source.address, &calls).await;

    let mut balances: HashMap<Address, U256> = HashMap::with_capacity(holders.len());
    for (holder, result) in holders.iter().zip(results) {
        match result {
            Ok(balance) => {
                balances.insert(*holder, balance);
            }
            Err(e) => warn!("[token] balanceOf({:#x}) failed, counting zero: {}", holder, e),
        }
    }
    let sum = |list: &[Address]| {
        list.iter()
            .filter_map(|a| balances.get(a))
            .fold(U256::ZERO, |acc, b| acc.saturating_add(*b))
    };

    let burn_address_balance = sum(&source.burn_addresses);
    let non_circulating = sum(&source.non_circulating_addresses);
    let supply_shrinkage = source.initial_supply.saturating_sub(total_supply);
    let burned = burn_address_balance.saturating_add(supply_shrinkage);

    info!(
        "[token] supply {} (decimals {}), burned {}, non-circulating {}",
        total_supply, decimals, burned, non_circulating
    );

    Ok(TokenSnapshot {
        total_supply,
        decimals,
        symbol,
        burn_address_balance,
        supply_shrinkage,
        burned,
        non_circulating,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{DEAD_ADDRESS, FULA_TOKEN_ADDRESS, ZERO_ADDRESS};
    use crate::error::DashboardError;
    use crate::testing::{abi_string, MockRpcNetwork};
    use alloy_primitives::address;
    use pretty_assertions::assert_eq;

    const URL: &str = "https://rpc1.test";

    fn tokens(whole: u64) -> U256 {
        U256::from(whole) * U256::from(10u64).pow(U256::from(18u8))
    }

    fn source() -> TokenSource {
        TokenSource {
            address: FULA_TOKEN_ADDRESS,
            fallback_symbol: "FULA".to_string(),
            initial_supply: tokens(500_000_000),
            burn_addresses: vec![ZERO_ADDRESS, DEAD_ADDRESS],
            non_circulating_addresses: vec![
                ZERO_ADDRESS,
                DEAD_ADDRESS,
                address!("1111111111111111111111111111111111111111"),
            ],
        }
    }

    fn network_with_token(total_supply: U256) -> MockRpcNetwork {
        let network = MockRpcNetwork::new();
        network.deploy(URL, FULA_TOKEN_ADDRESS);
        network.set_uint(URL, FULA_TOKEN_ADDRESS, "totalSupply()", total_supply);
        network.set_uint(URL, FULA_TOKEN_ADDRESS, "decimals()", U256::from(18u8));
        network.set_raw(URL, FULA_TOKEN_ADDRESS, "symbol()", abi_string("FULA"));
        network
    }

    #[tokio::test]
    async fn test_burned_blends_balances_and_shrinkage() {
        let network = network_with_token(tokens(499_000_000));
        network.set_balance(URL, FULA_TOKEN_ADDRESS, ZERO_ADDRESS, tokens(10));
        network.set_balance(URL, FULA_TOKEN_ADDRESS, DEAD_ADDRESS, tokens(5));
        network.set_balance(
            URL,
            FULA_TOKEN_ADDRESS,
            address!("1111111111111111111111111111111111111111"),
            tokens(100),
        );
        let mut session = RpcSession::new(vec![URL.to_string()], network.transport());
        let reader = ContractReader::new(network.transport(), 1);

        let snapshot = fetch_token_snapshot(&mut session, &reader, &source()).await.unwrap();
        assert_eq!(snapshot.total_supply, tokens(499_000_000));
        assert_eq!(snapshot.decimals, 18);
        assert_eq!(snapshot.burn_address_balance, tokens(15));
        assert_eq!(snapshot.supply_shrinkage, tokens(1_000_000));
        assert_eq!(snapshot.burned, tokens(1_000_015));
        assert_eq!(snapshot.non_circulating, tokens(115));
        // 3 distinct holders, each read once
        let balance_reads = network.call_count("eth_call") - 3;
        assert_eq!(balance_reads, 3);
    }

    #[tokio::test]
    async fn test_failing_balance_counts_zero() {
        let network = network_with_token(tokens(500_000_000));
        network.set_balance(URL, FULA_TOKEN_ADDRESS, DEAD_ADDRESS, tokens(7));
        let mut session = RpcSession::new(vec![URL.to_string()], network.transport());
        let reader = ContractReader::new(network.transport(), 1);

        let snapshot = fetch_token_snapshot(&mut session, &reader, &source()).await.unwrap();
        assert_eq!(snapshot.burned, tokens(7));
        assert_eq!(snapshot.supply_shrinkage, U256::ZERO);
        assert_eq!(snapshot.non_circulating, tokens(7));
    }

    #[tokio::test]
    async fn test_supply_above_initial_has_no_shrinkage() {
        let network = network_with_token(tokens(600_000_000));
        let mut session = RpcSession::new(vec![URL.to_string()], network.transport());
        let reader = ContractReader::new(network.transport(), 1);

        let snapshot = fetch_token_snapshot(&mut session, &reader, &source()).await.unwrap();
        assert_eq!(snapshot.supply_shrinkage, U256::ZERO);
    }

    #[tokio::test]
    async fn test_missing_contract_fails_and_drops_connection() {
        let network = MockRpcNetwork::new();
        let mut session = RpcSession::new(vec![URL.to_string()], network.transport());
        let reader = ContractReader::new(network.transport(), 1);

        let err = fetch_token_snapshot(&mut session, &reader, &source()).await.unwrap_err();
        assert!(matches!(err, DashboardError::NoContractData(_)));
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn test_symbol_falls_back_to_config() {
        let network = MockRpcNetwork::new();
        network.deploy(URL, FULA_TOKEN_ADDRESS);
        network.set_uint(URL, FULA_TOKEN_ADDRESS, "totalSupply()", tokens(1));
        network.set_uint(URL, FULA_TOKEN_ADDRESS, "decimals()", U256::from(18u8));
        let mut session = RpcSession::new(vec![URL.to_string()], network.transport());
        let reader = ContractReader::new(network.transport(), 1);
        let mut src = source();
        src.fallback_symbol = "TKN".to_string();

        let snapshot = fetch_token_snapshot(&mut session, &reader, &src).await.unwrap();
        assert_eq!(snapshot.symbol, "TKN");
    }
}
