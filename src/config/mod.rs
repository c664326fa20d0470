pub mod settings;

pub use settings::Config;

use crate::error::DashboardError;
use std::sync::Arc;
use url::Url;

/// Loads `.env` (if present) and the environment, validates, and returns the config.
pub fn load_config() -> Result<Arc<Config>, DashboardError> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    validate(&config)?;
    config.validate_and_log();

    Ok(Arc::new(config))
}

pub fn validate(config: &Config) -> Result<(), DashboardError> {
    if config.rpc_urls.is_empty() {
        return Err(DashboardError::Config("RPC_URLS cannot be empty".to_string()));
    }
    for raw in &config.rpc_urls {
        let parsed = Url::parse(raw)
            .map_err(|e| DashboardError::Config(format!("invalid RPC URL {:?}: {}", raw, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DashboardError::Config(format!(
                "RPC URL {:?} must be http or https",
                raw
            )));
        }
    }
    if config.refresh_interval_secs == 0 {
        return Err(DashboardError::Config("REFRESH_INTERVAL_SECS must be positive".to_string()));
    }
    if config.max_in_flight_calls == 0 {
        return Err(DashboardError::Config("MAX_IN_FLIGHT_CALLS must be at least 1".to_string()));
    }
    if config.pool_b_max_attempts == 0 {
        return Err(DashboardError::Config("POOL_B_MAX_ATTEMPTS must be at least 1".to_string()));
    }
    Ok(())
}
