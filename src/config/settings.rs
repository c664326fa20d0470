use alloy_primitives::{address, Address, U256};
use std::env;
use std::str::FromStr;

pub const DEFAULT_RPC_URLS: &[&str] = &[
    "https://mainnet.base.org",
    "https://base.llamarpc.com",
    "https://base-rpc.publicnode.com",
    "https://1rpc.io/base",
    "https://base.meowrpc.com",
];

pub const FULA_TOKEN_ADDRESS: Address = address!("9e12735d77c72c5C3670636D428f2F3815d8A4cB");
pub const STAKING_POOL_A_ADDRESS: Address = address!("b2064743e3da40bB4C18e80620A02a38e87fB145");
pub const STAKING_POOL_B_ADDRESS: Address = address!("4E875E0A4fEa97E83f1350b63420c36e38241db4");

pub const ZERO_ADDRESS: Address = Address::ZERO;
pub const DEAD_ADDRESS: Address = address!("000000000000000000000000000000000000dEaD");

/// 500M tokens at 18 decimals
pub const INITIAL_SUPPLY_WEI: &str = "500000000000000000000000000";

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_urls: Vec<String>,
    pub rpc_timeout_ms: u64,
    pub rpc_retry_delay_ms: u64,
    pub max_in_flight_calls: usize,
    pub token_address: Address,
    pub token_symbol: String,
    pub initial_supply: U256,
    pub burn_addresses: Vec<Address>,
    pub non_circulating_addresses: Vec<Address>,
    pub pool_a_address: Address,
    pub pool_b_address: Address,
    pub pool_b_max_attempts: u32,
    pub refresh_interval_secs: u64,
    pub holders_explorer_url: String,
    pub holders_fallback_path: String,
    pub holders_cache_path: String,
    pub holders_cache_ttl_secs: u64,
    pub redis_url: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rpc_urls: DEFAULT_RPC_URLS.iter().map(|s| s.to_string()).collect(),
            rpc_timeout_ms: 10_000,
            rpc_retry_delay_ms: 500,
            max_in_flight_calls: 1,
            token_address: FULA_TOKEN_ADDRESS,
            token_symbol: "FULA".to_string(),
            initial_supply: U256::from_str_radix(INITIAL_SUPPLY_WEI, 10).unwrap_or_default(),
            burn_addresses: vec![ZERO_ADDRESS, DEAD_ADDRESS],
            non_circulating_addresses: vec![ZERO_ADDRESS, DEAD_ADDRESS],
            pool_a_address: STAKING_POOL_A_ADDRESS,
            pool_b_address: STAKING_POOL_B_ADDRESS,
            pool_b_max_attempts: 3,
            refresh_interval_secs: 60,
            holders_explorer_url: format!(
                "https://basescan.org/token/tokenholderchart/{:#x}",
                FULA_TOKEN_ADDRESS
            ),
            holders_fallback_path: "holders.txt".to_string(),
            holders_cache_path: "holders_cache.json".to_string(),
            holders_cache_ttl_secs: 3600,
            redis_url: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from a key lookup, falling back to the defaults for any key
    /// that is missing or does not parse.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let address_list = |key: &str| {
            lookup(key).map(|s| {
                s.split(',')
                    .filter_map(|part| Address::from_str(part.trim()).ok())
                    .collect::<Vec<_>>()
            })
        };

        Config {
            rpc_urls: lookup("RPC_URLS")
                .map(|s| {
                    s.split(',')
                        .map(|u| u.trim().to_string())
                        .filter(|u| !u.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.rpc_urls),
            rpc_timeout_ms: parse_var(&lookup, "RPC_TIMEOUT_MS").unwrap_or(defaults.rpc_timeout_ms),
            rpc_retry_delay_ms: parse_var(&lookup, "RPC_RETRY_DELAY_MS").unwrap_or(defaults.rpc_retry_delay_ms),
            max_in_flight_calls: parse_var(&lookup, "MAX_IN_FLIGHT_CALLS").unwrap_or(defaults.max_in_flight_calls),
            token_address: parse_var(&lookup, "TOKEN_ADDRESS").unwrap_or(defaults.token_address),
            token_symbol: lookup("TOKEN_SYMBOL").unwrap_or(defaults.token_symbol),
            initial_supply: lookup("INITIAL_SUPPLY_WEI")
                .and_then(|v| U256::from_str_radix(v.trim(), 10).ok())
                .unwrap_or(defaults.initial_supply),
            burn_addresses: address_list("BURN_ADDRESSES").unwrap_or(defaults.burn_addresses),
            non_circulating_addresses: address_list("NON_CIRCULATING_ADDRESSES")
                .unwrap_or(defaults.non_circulating_addresses),
            pool_a_address: parse_var(&lookup, "POOL_A_ADDRESS").unwrap_or(defaults.pool_a_address),
            pool_b_address: parse_var(&lookup, "POOL_B_ADDRESS").unwrap_or(defaults.pool_b_address),
            pool_b_max_attempts: parse_var(&lookup, "POOL_B_MAX_ATTEMPTS").unwrap_or(defaults.pool_b_max_attempts),
            refresh_interval_secs: parse_var(&lookup, "REFRESH_INTERVAL_SECS")
                .unwrap_or(defaults.refresh_interval_secs),
            holders_explorer_url: lookup("HOLDERS_EXPLORER_URL")
                .unwrap_or(defaults.holders_explorer_url),
            holders_fallback_path: lookup("HOLDERS_FALLBACK_PATH")
                .unwrap_or(defaults.holders_fallback_path),
            holders_cache_path: lookup("HOLDERS_CACHE_PATH").unwrap_or(defaults.holders_cache_path),
            holders_cache_ttl_secs: parse_var(&lookup, "HOLDERS_CACHE_TTL_SECS")
                .unwrap_or(defaults.holders_cache_ttl_secs),
            redis_url: lookup("REDIS_URL").filter(|s| !s.trim().is_empty()),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    pub fn validate_and_log(&self) {
        log::info!("Application Configuration Loaded: {:?}", self);
        if self.non_circulating_addresses.is_empty() {
            log::warn!("NON_CIRCULATING_ADDRESSES is empty; circulating supply equals total supply");
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}
