// src/main.rs
use anyhow::Context;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use supply_dashboard::{
    cache::{FileStore, KeyValueStore, RedisStore},
    config::{load_config, Config},
    holders::{HolderCountSource, HttpPageFetcher},
    rpc::HttpTransport,
    utils::setup_logging,
    Dashboard, LogSink,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};

async fn build_store(config: &Config) -> Arc<dyn KeyValueStore> {
    if let Some(url) = &config.redis_url {
        match RedisStore::new(url).await {
            Ok(store) => return Arc::new(store),
            Err(e) => warn!("Redis unavailable ({}), using {}", e, config.holders_cache_path),
        }
    }
    Arc::new(FileStore::new(&config.holders_cache_path))
}

fn spawn_refresh(dashboard: &Arc<Dashboard>, trigger: &'static str) {
    let dashboard = Arc::clone(dashboard);
    tokio::spawn(async move {
        if dashboard.refresh().await.is_none() {
            info!("[{}] refresh still in flight, skipping", trigger);
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    setup_logging(&level).context("Failed to initialize logging")?;
    info!("Supply dashboard starting...");

    let config = load_config().context("Invalid configuration")?;
    let timeout = Duration::from_millis(config.rpc_timeout_ms);

    let transport = Arc::new(HttpTransport::new(timeout)?);
    let holders = HolderCountSource::from_config(
        &config,
        Arc::new(HttpPageFetcher::new(timeout)?),
        build_store(&config).await,
    );
    let dashboard = Arc::new(Dashboard::new(&config, transport, holders, Arc::new(LogSink)));

    let mut ticker = interval(Duration::from_secs(config.refresh_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    info!(
        "Refreshing every {}s; press Enter to refresh now, Ctrl-C to exit",
        config.refresh_interval_secs
    );

    loop {
        tokio::select! {
            // first tick fires immediately and runs the initial cycle
            _ = ticker.tick() => spawn_refresh(&dashboard, "timer"),
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(_)) => spawn_refresh(&dashboard, "manual"),
                Ok(None) => stdin_open = false,
                Err(e) => {
                    error!("stdin read failed: {}", e);
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
