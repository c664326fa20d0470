//! One refresh cycle: token, Pool A, Pool B, aggregate, holder count, timestamp,
//! strictly in that order, pushing every field to the display sink as it resolves.

pub mod display;

pub use display::{DisplaySink, LogSink, RecordingSink, Slot, SlotValue};

use crate::config::Config;
use crate::error::{DashboardError, Result};
use crate::holders::HolderCountSource;
use crate::rpc::{ContractReader, RpcSession, RpcTransport};
use crate::supply::{
    aggregate, combine_pools, fetch_token_snapshot, pool_configs, AggregateReport, LockBucket, PoolConfig,
    PoolId, PoolSnapshot, TokenSnapshot, TokenSource,
};
use crate::utils::format::{format_count, format_timestamp, format_token_amount};
use alloy_primitives::U256;
use chrono::{DateTime, Local, Utc};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Used for pool figures when the token's own `decimals()` could not be read
const DEFAULT_DECIMALS: u8 = 18;

fn is_unreachable(e: &DashboardError) -> bool {
    matches!(e, DashboardError::AllEndpointsUnreachable(_))
}

/// Everything one cycle produced; each field stands on its own.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub token: Result<TokenSnapshot>,
    pub pools: Vec<(PoolId, Result<PoolSnapshot>)>,
    /// Present when the token snapshot succeeded
    pub report: Option<AggregateReport>,
    pub holders: Result<u64>,
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    pub fn pool(&self, id: PoolId) -> Option<&Result<PoolSnapshot>> {
        self.pools.iter().find(|(pool, _)| *pool == id).map(|(_, r)| r)
    }
}

/// Clears the in-flight flag when the cycle ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Dashboard {
    session: Mutex<RpcSession>,
    reader: ContractReader,
    token: TokenSource,
    pools: Vec<PoolConfig>,
    holders: HolderCountSource,
    sink: Arc<dyn DisplaySink>,
    in_flight: AtomicBool,
}

impl Dashboard {
    pub fn new(
        config: &Config,
        transport: Arc<dyn RpcTransport>,
        holders: HolderCountSource,
        sink: Arc<dyn DisplaySink>,
    ) -> Self {
        Self {
            session: Mutex::new(RpcSession::new(config.rpc_urls.clone(), Arc::clone(&transport))),
            reader: ContractReader::new(transport, config.max_in_flight_calls),
            token: TokenSource::from_config(config),
            pools: pool_configs(config),
            holders,
            sink,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn refresh(&self) -> Option<CycleReport> {
        self.refresh_at(Utc::now()).await
    }

    /// Runs one cycle as of `now`. Returns `None` without doing anything when a
    /// cycle is already in flight; triggers are dropped, never queued.
    pub async fn refresh_at(&self, now: DateTime<Utc>) -> Option<CycleReport> {
        let _guard = match InFlightGuard::acquire(&self.in_flight) {
            Some(guard) => guard,
            None => {
                debug!("[cycle] refresh already in flight, trigger ignored");
                return None;
            }
        };
        let started = Instant::now();
        info!("[cycle] refresh started");

        let mut session = self.session.lock().await;

        let token = fetch_token_snapshot(&mut session, &self.reader, &self.token).await;
        let (decimals, symbol) = match &token {
            Ok(t) => (t.decimals, t.symbol.clone()),
            Err(_) => (DEFAULT_DECIMALS, self.token.fallback_symbol.clone()),
        };
        let amount = |value: U256| format_token_amount(value, decimals, &symbol);

        match &token {
            Ok(t) => {
                self.sink.update(Slot::TotalSupply, Ok(amount(t.total_supply)));
                self.sink.update(Slot::Burned, Ok(amount(t.burned)));
            }
            Err(e) => {
                self.sink.update(Slot::TotalSupply, Err(e.clone()));
                self.sink.update(Slot::Burned, Err(e.clone()));
            }
        }

        // once a full selection pass has failed, nothing else in this cycle goes to the network
        let mut unreachable = token.as_ref().err().filter(|e| is_unreachable(e)).cloned();
        let mut pools = Vec::with_capacity(self.pools.len());
        for pool in &self.pools {
            let result = match &unreachable {
                Some(e) => {
                    debug!("[cycle] skipping {}: {}", pool.id, e);
                    Err(e.clone())
                }
                None => pool.fetch(&mut session, &self.reader).await,
            };
            if let Err(e) = &result {
                if is_unreachable(e) && unreachable.is_none() {
                    unreachable = Some(e.clone());
                }
            }
            self.push_pool(pool, &result, &amount);
            pools.push((pool.id, result));
        }
        drop(session);

        let snapshot_or_empty = |id: PoolId| {
            pools
                .iter()
                .find(|(pool, _)| *pool == id)
                .and_then(|(_, r)| r.as_ref().ok().cloned())
                .unwrap_or_else(|| PoolSnapshot::empty(id))
        };
        let pool_a = snapshot_or_empty(PoolId::A);
        let pool_b = snapshot_or_empty(PoolId::B);

        let report = token.as_ref().ok().map(|t| aggregate(t, &pool_a, &pool_b));
        match (&report, &token) {
            (Some(r), _) => self.sink.update(Slot::CirculatingSupply, Ok(amount(r.circulating_supply))),
            (None, Err(e)) => self.sink.update(Slot::CirculatingSupply, Err(e.clone())),
            (None, Ok(_)) => {}
        }

        // combined figures only exist if at least one pool answered
        let first_pool_error = pools.iter().find_map(|(_, r)| r.as_ref().err().cloned());
        let any_pool_ok = pools.iter().any(|(_, r)| r.is_ok());
        let staking = report
            .as_ref()
            .map(|r| r.staking.clone())
            .unwrap_or_else(|| combine_pools(&[&pool_a, &pool_b]));
        for bucket in LockBucket::ALL {
            let value = match (&first_pool_error, any_pool_ok) {
                (Some(e), false) => Err(e.clone()),
                _ => Ok(amount(staking.bucket(bucket))),
            };
            self.sink.update(Slot::AllPoolsBucket(bucket), value);
        }
        let total = match (&first_pool_error, any_pool_ok) {
            (Some(e), false) => Err(e.clone()),
            _ => Ok(amount(staking.total_staked)),
        };
        self.sink.update(Slot::AllPoolsTotal, total);

        let holders = self.holders.count_at(now).await;
        self.sink.update(
            Slot::HoldersCount,
            holders.as_ref().map(|n| format_count(*n)).map_err(Clone::clone),
        );

        let finished_at = Utc::now();
        self.sink.update(
            Slot::LastUpdated,
            Ok(format_timestamp(&finished_at.with_timezone(&Local))),
        );

        info!("[cycle] refresh finished in {:?}", started.elapsed());
        Some(CycleReport {
            token,
            pools,
            report,
            holders,
            finished_at,
        })
    }

    fn push_pool(&self, pool: &PoolConfig, result: &Result<PoolSnapshot>, amount: &dyn Fn(U256) -> String) {
        match result {
            Ok(snapshot) => {
                for bucket in &pool.buckets {
                    let value = snapshot.bucket(*bucket).unwrap_or(U256::ZERO);
                    self.sink.update(Slot::PoolBucket(pool.id, *bucket), Ok(amount(value)));
                }
                self.sink.update(Slot::PoolTotal(pool.id), Ok(amount(snapshot.total_staked)));
            }
            Err(e) => {
                for bucket in &pool.buckets {
                    self.sink.update(Slot::PoolBucket(pool.id, *bucket), Err(e.clone()));
                }
                self.sink.update(Slot::PoolTotal(pool.id), Err(e.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::testing::{MockPageFetcher, MockRpcNetwork};
    use std::time::Duration;

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_refresh_future_is_send() {
        let network = MockRpcNetwork::new();
        let holders = HolderCountSource::new(
            Arc::new(MockPageFetcher::failing()),
            Arc::new(MemoryStore::new()),
            "https://explorer.test/holders",
            "holders.txt",
            Duration::from_secs(3600),
        );
        let dashboard = Dashboard::new(&Config::default(), network.transport(), holders, Arc::new(LogSink));
        assert_send(dashboard.refresh());
    }
}
