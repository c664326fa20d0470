//! Token supply and staking data: snapshots fetched each cycle and the pure
//! aggregation over them.

pub mod aggregate;
pub mod pools;
pub mod token;

pub use aggregate::{aggregate, combine_pools, AggregateReport, StakingTotals};
pub use pools::{pool_configs, FetchStrategy, PoolConfig, PoolId, PoolSnapshot};
pub use token::{fetch_token_snapshot, TokenSnapshot, TokenSource};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lock-duration bucket a staking pool reports totals for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LockBucket {
    Days90,
    Days180,
    Days365,
    Days730,
    Days1095,
}

impl LockBucket {
    pub const ALL: [LockBucket; 5] = [
        LockBucket::Days90,
        LockBucket::Days180,
        LockBucket::Days365,
        LockBucket::Days730,
        LockBucket::Days1095,
    ];

    pub fn days(self) -> u32 {
        match self {
            LockBucket::Days90 => 90,
            LockBucket::Days180 => 180,
            LockBucket::Days365 => 365,
            LockBucket::Days730 => 730,
            LockBucket::Days1095 => 1095,
        }
    }

    /// View function returning the bucket total, e.g. `totalStaked365Days()`.
    pub fn getter(self) -> String {
        format!("totalStaked{}Days()", self.days())
    }
}

impl fmt::Display for LockBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}days", self.days())
    }
}
