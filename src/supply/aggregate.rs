use super::{LockBucket, PoolSnapshot, TokenSnapshot};
use alloy_primitives::U256;
use std::collections::BTreeMap;

/// Staking totals summed across pools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakingTotals {
    /// Every bucket is present; a bucket no pool defines stays zero
    pub per_bucket: BTreeMap<LockBucket, U256>,
    pub total_staked: U256,
}

impl StakingTotals {
    pub fn bucket(&self, bucket: LockBucket) -> U256 {
        self.per_bucket.get(&bucket).copied().unwrap_or(U256::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateReport {
    pub staking: StakingTotals,
    pub total_supply: U256,
    pub decimals: u8,
    pub burned: U256,
    pub non_circulating: U256,
    /// `total_supply - non_circulating`; burned is reported on its own and not
    /// subtracted again
    pub circulating_supply: U256,
}

pub fn combine_pools(pools: &[&PoolSnapshot]) -> StakingTotals {
    let mut per_bucket: BTreeMap<LockBucket, U256> =
        LockBucket::ALL.iter().map(|b| (*b, U256::ZERO)).collect();
    let mut total_staked = U256::ZERO;

    for pool in pools {
        for (bucket, amount) in &pool.buckets {
            let slot = per_bucket.entry(*bucket).or_insert(U256::ZERO);
            *slot = slot.saturating_add(*amount);
        }
        total_staked = total_staked.saturating_add(pool.total_staked);
    }

    StakingTotals {
        per_bucket,
        total_staked,
    }
}

/// Pure combination of one cycle's snapshots. A pool that failed to fetch is passed
/// in as `PoolSnapshot::empty` and adds nothing.
pub fn aggregate(token: &TokenSnapshot, pool_a: &PoolSnapshot, pool_b: &PoolSnapshot) -> AggregateReport {
    AggregateReport {
        staking: combine_pools(&[pool_a, pool_b]),
        total_supply: token.total_supply,
        decimals: token.decimals,
        burned: token.burned,
        non_circulating: token.non_circulating,
        circulating_supply: token.total_supply.saturating_sub(token.non_circulating),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supply::PoolId;
    use pretty_assertions::assert_eq;

    fn tokens(whole: u64) -> U256 {
        U256::from(whole) * U256::from(10u64).pow(U256::from(18u8))
    }

    fn token(total: U256, non_circulating: U256) -> TokenSnapshot {
        TokenSnapshot {
            total_supply: total,
            decimals: 18,
            symbol: "FULA".to_string(),
            burn_address_balance: tokens(10),
            supply_shrinkage: U256::ZERO,
            burned: tokens(10),
            non_circulating,
        }
    }

    fn pool(id: PoolId, total: u64, buckets: &[(LockBucket, u64)]) -> PoolSnapshot {
        PoolSnapshot {
            pool: id,
            total_staked: tokens(total),
            buckets: buckets.iter().map(|(b, v)| (*b, tokens(*v))).collect(),
            served_by: Some(0),
        }
    }

    fn pool_a() -> PoolSnapshot {
        pool(
            PoolId::A,
            600,
            &[(LockBucket::Days365, 100), (LockBucket::Days730, 200), (LockBucket::Days1095, 300)],
        )
    }

    fn pool_b() -> PoolSnapshot {
        pool(
            PoolId::B,
            70,
            &[(LockBucket::Days90, 10), (LockBucket::Days180, 20), (LockBucket::Days365, 40)],
        )
    }

    #[test]
    fn test_bucket_only_sums_pools_that_define_it() {
        let report = aggregate(&token(tokens(1_000), U256::ZERO), &pool_a(), &pool_b());
        assert_eq!(report.staking.bucket(LockBucket::Days90), tokens(10));
        assert_eq!(report.staking.bucket(LockBucket::Days1095), tokens(300));
        assert_eq!(report.staking.bucket(LockBucket::Days365), tokens(140));
        assert_eq!(report.staking.total_staked, tokens(670));
    }

    #[test]
    fn test_circulating_supply() {
        let report = aggregate(
            &token(tokens(500_000_000), tokens(50_000_000)),
            &pool_a(),
            &pool_b(),
        );
        assert_eq!(report.circulating_supply, tokens(450_000_000));
        // burned is reported, not subtracted a second time
        assert_eq!(report.burned, tokens(10));
    }

    #[test]
    fn test_failed_pool_contributes_zero() {
        let report = aggregate(
            &token(tokens(1_000), U256::ZERO),
            &PoolSnapshot::empty(PoolId::A),
            &pool_b(),
        );
        assert_eq!(report.staking.bucket(LockBucket::Days730), U256::ZERO);
        assert_eq!(report.staking.bucket(LockBucket::Days365), tokens(40));
        assert_eq!(report.staking.total_staked, tokens(70));
        assert_eq!(report.staking.per_bucket.len(), LockBucket::ALL.len());
    }

    #[test]
    fn test_non_circulating_above_supply_saturates() {
        let report = aggregate(&token(tokens(5), tokens(9)), &pool_a(), &pool_b());
        assert_eq!(report.circulating_supply, U256::ZERO);
    }
}
