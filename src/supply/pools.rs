//! Staking pool reads with a per-pool resilience strategy.
//!
//! Pool A was flaky on some providers, so it is probed directly on every endpoint
//! until one has its code and answers. Pool B goes through the shared connection
//! and retries with endpoint re-selection.

use super::LockBucket;
use crate::config::Config;
use crate::error::{DashboardError, Result, RetryPolicy};
use crate::rpc::{Connection, ContractReader, RpcSession, ViewCall};
use alloy_primitives::{Address, U256};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;

const TOTAL_STAKED: &str = "totalStaked()";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolId {
    A,
    B,
}

impl PoolId {
    /// Slot prefix used by the presentation layer
    pub fn slot_prefix(self) -> &'static str {
        match self {
            PoolId::A => "pool1",
            PoolId::B => "pool2",
        }
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolId::A => write!(f, "Pool A"),
            PoolId::B => write!(f, "Pool B"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FetchStrategy {
    /// Raw `eth_getCode` + `totalStaked()` on each endpoint in order; the first one
    /// that answers serves every bucket read of the cycle.
    ProbeAllEndpoints,
    /// Shared session connection; on failure move to the next endpoint, re-select
    /// and try again, up to `policy.max_attempts` times.
    ClientRetry { policy: RetryPolicy },
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub id: PoolId,
    pub address: Address,
    pub buckets: Vec<LockBucket>,
    pub strategy: FetchStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub pool: PoolId,
    pub total_staked: U256,
    /// Only the buckets the pool defines
    pub buckets: BTreeMap<LockBucket, U256>,
    /// Endpoint index that served the reads
    pub served_by: Option<usize>,
}

impl PoolSnapshot {
    /// Zero contribution used for a pool whose fetch failed.
    pub fn empty(pool: PoolId) -> Self {
        Self {
            pool,
            total_staked: U256::ZERO,
            buckets: BTreeMap::new(),
            served_by: None,
        }
    }

    pub fn bucket(&self, bucket: LockBucket) -> Option<U256> {
        self.buckets.get(&bucket).copied()
    }
}

/// Pool A: {365, 730, 1095} days, probe-all-endpoints.
/// Pool B: {90, 180, 365} days, client-retry.
pub fn pool_configs(config: &Config) -> Vec<PoolConfig> {
    vec![
        PoolConfig {
            id: PoolId::A,
            address: config.pool_a_address,
            buckets: vec![LockBucket::Days365, LockBucket::Days730, LockBucket::Days1095],
            strategy: FetchStrategy::ProbeAllEndpoints,
        },
        PoolConfig {
            id: PoolId::B,
            address: config.pool_b_address,
            buckets: vec![LockBucket::Days90, LockBucket::Days180, LockBucket::Days365],
            strategy: FetchStrategy::ClientRetry {
                policy: RetryPolicy::new(
                    config.pool_b_max_attempts,
                    Duration::from_millis(config.rpc_retry_delay_ms),
                    Duration::from_millis(config.rpc_retry_delay_ms.saturating_mul(8)),
                ),
            },
        },
    ]
}

impl FetchStrategy {
    pub async fn fetch(
        &self,
        session: &mut RpcSession,
        reader: &ContractReader,
        pool: &PoolConfig,
    ) -> Result<PoolSnapshot> {
        match self {
            FetchStrategy::ProbeAllEndpoints => probe_all_endpoints(session, reader, pool).await,
            FetchStrategy::ClientRetry { policy } => client_retry(session, reader, pool, policy).await,
        }
    }
}

impl PoolConfig {
    pub async fn fetch(&self, session: &mut RpcSession, reader: &ContractReader) -> Result<PoolSnapshot> {
        self.strategy.fetch(session, reader, self).await
    }
}

/// `totalStaked()` followed by the pool's bucket getters, read in order.
async fn read_pool(reader: &ContractReader, connection: &Connection, pool: &PoolConfig) -> Result<PoolSnapshot> {
    let calls: Vec<ViewCall> = std::iter::once(ViewCall::uint(TOTAL_STAKED))
        .chain(pool.buckets.iter().map(|b| ViewCall::uint(b.getter())))
        .collect();
    let values = reader.read_batch(connection, pool.address, &calls).await?;
    snapshot_from_values(pool, connection.index(), &values)
}

fn snapshot_from_values(pool: &PoolConfig, served_by: usize, values: &[U256]) -> Result<PoolSnapshot> {
    let (total, rest) = values.split_first().ok_or_else(|| {
        DashboardError::Decode(format!("{}: no values returned", pool.id))
    })?;
    if rest.len() != pool.buckets.len() {
        return Err(DashboardError::Decode(format!(
            "{}: expected {} bucket values, got {}",
            pool.id,
            pool.buckets.len(),
            rest.len()
        )));
    }
    Ok(PoolSnapshot {
        pool: pool.id,
        total_staked: *total,
        buckets: pool.buckets.iter().copied().zip(rest.iter().copied()).collect(),
        served_by: Some(served_by),
    })
}

async fn probe_all_endpoints(
    session: &RpcSession,
    reader: &ContractReader,
    pool: &PoolConfig,
) -> Result<PoolSnapshot> {
    let mut failures = Vec::new();
    let mut any_code = false;
    let mut saw_empty_code = false;

    for endpoint in session.endpoints() {
        let connection = Connection::unverified(endpoint.clone());

        match reader.get_code(&connection, pool.address).await {
            Ok(code) if code.is_empty() => {
                saw_empty_code = true;
                debug!("[{}] no code at {:#x} on {}", pool.id, pool.address, endpoint.url);
                failures.push(format!("#{}: no code", endpoint.index));
                continue;
            }
            Ok(_) => any_code = true,
            Err(e) => {
                warn!("[{}] eth_getCode on {} failed: {}", pool.id, endpoint.url, e);
                failures.push(format!("#{}: {}", endpoint.index, e));
                continue;
            }
        }

        // totalStaked() first: a node that cannot answer it is skipped before any
        // bucket read is spent on it
        let total = match reader.read_uint(&connection, pool.address, TOTAL_STAKED).await {
            Ok(total) => total,
            Err(e) => {
                warn!("[{}] totalStaked() on {} failed: {}", pool.id, endpoint.url, e);
                failures.push(format!("#{}: {}", endpoint.index, e));
                continue;
            }
        };

        let calls: Vec<ViewCall> = pool.buckets.iter().map(|b| ViewCall::uint(b.getter())).collect();
        match reader.read_batch(&connection, pool.address, &calls).await {
            Ok(buckets) => {
                info!("[{}] served by endpoint #{} {}", pool.id, endpoint.index, endpoint.url);
                let values: Vec<U256> = std::iter::once(total).chain(buckets).collect();
                return snapshot_from_values(pool, endpoint.index, &values);
            }
            Err(e) => {
                warn!("[{}] bucket reads on {} failed: {}", pool.id, endpoint.url, e);
                failures.push(format!("#{}: {}", endpoint.index, e));
            }
        }
    }

    let summary = format!("{} at {:#x}: {}", pool.id, pool.address, failures.join("; "));
    if saw_empty_code && !any_code {
        Err(DashboardError::NoContractData(summary))
    } else {
        Err(DashboardError::TransientRpc(summary))
    }
}

async fn client_retry(
    session: &mut RpcSession,
    reader: &ContractReader,
    pool: &PoolConfig,
    policy: &RetryPolicy,
) -> Result<PoolSnapshot> {
    let endpoint_count = session.endpoints().len().max(1);
    let mut next_start: Option<usize> = None;
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_for_attempt(attempt);
        if !delay.is_zero() {
            sleep(delay).await;
        }

        let selected = match next_start {
            Some(start) => session.select_endpoint(start).await,
            None => session.connection().await,
        };
        let connection = match selected {
            Ok(connection) => connection,
            Err(e) => {
                warn!("[{}] attempt {}/{}: {}", pool.id, attempt + 1, policy.max_attempts, e);
                last_error = Some(e);
                continue;
            }
        };

        match read_pool(reader, &connection, pool).await {
            Ok(snapshot) => {
                if attempt > 0 {
                    info!("[{}] succeeded after {} retries", pool.id, attempt);
                }
                return Ok(snapshot);
            }
            Err(e) => {
                warn!(
                    "[{}] attempt {}/{} via {} failed: {}",
                    pool.id,
                    attempt + 1,
                    policy.max_attempts,
                    connection.url(),
                    e
                );
                session.invalidate();
                next_start = Some((connection.index() + 1) % endpoint_count);
                if !e.is_recoverable() {
                    return Err(e);
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        DashboardError::TransientRpc(format!("{}: retries exhausted", pool.id))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{STAKING_POOL_A_ADDRESS, STAKING_POOL_B_ADDRESS};
    use crate::testing::MockRpcNetwork;
    use pretty_assertions::assert_eq;

    fn urls(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("https://rpc{}.test", i)).collect()
    }

    fn pool_a() -> PoolConfig {
        PoolConfig {
            id: PoolId::A,
            address: STAKING_POOL_A_ADDRESS,
            buckets: vec![LockBucket::Days365, LockBucket::Days730, LockBucket::Days1095],
            strategy: FetchStrategy::ProbeAllEndpoints,
        }
    }

    fn pool_b(attempts: u32) -> PoolConfig {
        PoolConfig {
            id: PoolId::B,
            address: STAKING_POOL_B_ADDRESS,
            buckets: vec![LockBucket::Days90, LockBucket::Days180, LockBucket::Days365],
            strategy: FetchStrategy::ClientRetry {
                policy: RetryPolicy::new(attempts, Duration::ZERO, Duration::ZERO),
            },
        }
    }

    fn stage_pool(network: &MockRpcNetwork, url: &str, pool: &PoolConfig, base: u64) {
        network.deploy(url, pool.address);
        network.set_uint(url, pool.address, TOTAL_STAKED, U256::from(base));
        for (i, bucket) in pool.buckets.iter().enumerate() {
            network.set_uint(url, pool.address, &bucket.getter(), U256::from(base + 1 + i as u64));
        }
    }

    #[tokio::test]
    async fn test_probe_skips_endpoints_without_code() {
        let network = MockRpcNetwork::new();
        let pool = pool_a();
        stage_pool(&network, "https://rpc3.test", &pool, 1000);
        let session = RpcSession::new(urls(3), network.transport());
        let reader = ContractReader::new(network.transport(), 1);

        let snapshot = probe_all_endpoints(&session, &reader, &pool).await.unwrap();
        assert_eq!(snapshot.served_by, Some(2));
        assert_eq!(snapshot.total_staked, U256::from(1000u64));
        assert_eq!(snapshot.bucket(LockBucket::Days1095), Some(U256::from(1003u64)));
        assert_eq!(snapshot.bucket(LockBucket::Days90), None);
        // probing never touches the shared connection
        assert!(session.current().is_none());
        assert_eq!(network.call_count("eth_blockNumber"), 0);
    }

    #[tokio::test]
    async fn test_probe_reports_no_contract_data_when_absent_everywhere() {
        let network = MockRpcNetwork::new();
        let session = RpcSession::new(urls(2), network.transport());
        let reader = ContractReader::new(network.transport(), 1);

        let err = probe_all_endpoints(&session, &reader, &pool_a()).await.unwrap_err();
        assert!(matches!(err, DashboardError::NoContractData(_)));
    }

    #[tokio::test]
    async fn test_probe_moves_on_when_total_staked_fails() {
        let network = MockRpcNetwork::new();
        let pool = pool_a();
        // code present on rpc1 but no answers; full pool on rpc2
        network.deploy("https://rpc1.test", pool.address);
        stage_pool(&network, "https://rpc2.test", &pool, 50);
        let session = RpcSession::new(urls(2), network.transport());
        let reader = ContractReader::new(network.transport(), 1);

        let snapshot = probe_all_endpoints(&session, &reader, &pool).await.unwrap();
        assert_eq!(snapshot.served_by, Some(1));
    }

    #[tokio::test]
    async fn test_client_retry_moves_to_next_endpoint() {
        let network = MockRpcNetwork::new();
        let pool = pool_b(3);
        // rpc1 is live but lacks the contract; rpc2 has it
        stage_pool(&network, "https://rpc2.test", &pool, 10);
        let mut session = RpcSession::new(urls(3), network.transport());
        let reader = ContractReader::new(network.transport(), 1);

        let snapshot = pool.fetch(&mut session, &reader).await.unwrap();
        assert_eq!(snapshot.served_by, Some(1));
        assert_eq!(snapshot.bucket(LockBucket::Days90), Some(U256::from(11u64)));
        assert_eq!(session.last_good_index(), 1);
    }

    #[tokio::test]
    async fn test_client_retry_skips_node_with_garbled_payload() {
        let network = MockRpcNetwork::new();
        let pool = pool_b(3);
        network.deploy("https://rpc1.test", pool.address);
        network.set_raw("https://rpc1.test", pool.address, TOTAL_STAKED, vec![0x01]);
        stage_pool(&network, "https://rpc2.test", &pool, 10);
        let mut session = RpcSession::new(urls(3), network.transport());
        let reader = ContractReader::new(network.transport(), 1);

        let snapshot = pool.fetch(&mut session, &reader).await.unwrap();
        assert_eq!(snapshot.served_by, Some(1));
        assert_eq!(snapshot.total_staked, U256::from(10u64));
        let eth_calls = network.urls_called("eth_call");
        assert_eq!(eth_calls[0], "https://rpc1.test");
        assert!(eth_calls[1..].iter().all(|u| u == "https://rpc2.test"));
    }

    #[tokio::test]
    async fn test_client_retry_recovers_when_selected_node_drops() {
        let network = MockRpcNetwork::new();
        let pool = pool_b(3);
        stage_pool(&network, "https://rpc1.test", &pool, 10);
        stage_pool(&network, "https://rpc2.test", &pool, 20);
        let mut session = RpcSession::new(urls(3), network.transport());
        let reader = ContractReader::new(network.transport(), 1);

        // rpc1 passes its liveness probe, then goes away before the pool reads
        assert_eq!(session.connection().await.unwrap().index(), 0);
        network.set_down("https://rpc1.test");

        let snapshot = pool.fetch(&mut session, &reader).await.unwrap();
        assert_eq!(snapshot.served_by, Some(1));
        assert_eq!(snapshot.total_staked, U256::from(20u64));
        assert_eq!(session.last_good_index(), 1);
    }

    #[tokio::test]
    async fn test_client_retry_gives_up_after_bound() {
        let network = MockRpcNetwork::new();
        let pool = pool_b(3);
        let mut session = RpcSession::new(urls(5), network.transport());
        let reader = ContractReader::new(network.transport(), 1);

        let err = pool.fetch(&mut session, &reader).await.unwrap_err();
        assert!(matches!(err, DashboardError::NoContractData(_)));
        // one totalStaked() per attempt, each on a different endpoint
        assert_eq!(
            network.urls_called("eth_call"),
            vec!["https://rpc1.test", "https://rpc2.test", "https://rpc3.test"]
        );
    }
}
