use log::debug;
use rand::Rng;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashboardError {
    /// Network/timeout/malformed response from an RPC node
    #[error("Transient RPC Error: {0}")]
    TransientRpc(String),

    /// The node answered but has no code or data for the contract
    #[error("No Contract Data: {0}")]
    NoContractData(String),

    /// Every candidate endpoint failed its liveness probe in one pass
    #[error("All Endpoints Unreachable: {0}")]
    AllEndpointsUnreachable(String),

    /// Call result had an unexpected shape
    #[error("Decode Error: {0}")]
    Decode(String),

    /// Holder-count cache could not be read or written
    #[error("Cache Read Error: {0}")]
    CacheRead(String),

    /// Holder-count source (explorer page or fallback file) unavailable
    #[error("Source Unavailable: {0}")]
    SourceUnavailable(String),

    /// Configuration errors
    #[error("Config Error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Decode(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        DashboardError::TransientRpc(format!("HTTP transport error: {}", err))
    }
}

impl From<redis::RedisError> for DashboardError {
    fn from(err: redis::RedisError) -> Self {
        DashboardError::CacheRead(format!("Redis error: {}", err))
    }
}

impl DashboardError {
    /// Whether a later attempt (possibly on another endpoint) can succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            DashboardError::TransientRpc(_) => true,
            DashboardError::NoContractData(_) => true, // another node may have the code
            DashboardError::AllEndpointsUnreachable(_) => true, // next cycle
            DashboardError::Decode(_) => true, // a garbled payload is one node's answer
            DashboardError::CacheRead(_) => true,
            DashboardError::SourceUnavailable(_) => true,
            DashboardError::Config(_) => false,
        }
    }

    /// Whether the active connection should be dropped and another endpoint tried
    pub fn should_switch_endpoint(&self) -> bool {
        matches!(
            self,
            DashboardError::TransientRpc(_)
                | DashboardError::NoContractData(_)
                | DashboardError::Decode(_)
        )
    }

    /// Categorizes error for log output and the presentation layer
    pub fn categorize(&self) -> ErrorCategory {
        match self {
            DashboardError::TransientRpc(_) | DashboardError::AllEndpointsUnreachable(_) => {
                ErrorCategory::Network
            }
            DashboardError::NoContractData(_) | DashboardError::Decode(_) => ErrorCategory::Data,
            DashboardError::CacheRead(_) | DashboardError::SourceUnavailable(_) => {
                ErrorCategory::SecondarySource
            }
            DashboardError::Config(_) => ErrorCategory::Configuration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    SecondarySource,
    Configuration,
}

/// Retry policy with exponential backoff and jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Calculate delay before a given attempt (0-based, first attempt never waits)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let factor = 2_u128.checked_pow(attempt - 1).unwrap_or(u128::MAX);
        let delay_ms = self.base_delay.as_millis().saturating_mul(factor);
        let mut delay_ms = delay_ms.min(self.max_delay.as_millis()) as u64;
        let jitter = rand::thread_rng().gen_range(0..(delay_ms / 4).max(1));
        delay_ms += jitter;

        debug!("Retry attempt {}: delay = {}ms", attempt, delay_ms);
        Duration::from_millis(delay_ms)
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
