//! Best-effort holder count.
//!
//! Order of sources: a cache entry younger than the TTL, the explorer's holder
//! chart page, then a static fallback file holding a single integer. Nothing here
//! propagates past [`HolderCountSource::count_at`]; callers get either a count or
//! `SourceUnavailable`.

use crate::cache::KeyValueStore;
use crate::config::Config;
use crate::error::{DashboardError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const HOLDERS_CACHE_KEY: &str = "holders_count";

/// One `[timestamp, value]` pair of the chart's embedded series literal.
static SERIES_POINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\s*(\d{10,13})\s*,\s*(\d+)\s*\]").expect("Invalid holder series regex")
});

#[async_trait]
pub trait HolderPageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("supply-dashboard/0.1")
            .build()
            .map_err(|e| DashboardError::Config(format!("http client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HolderPageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DashboardError::SourceUnavailable(format!("{}: {}", url, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::SourceUnavailable(format!("{}: HTTP {}", url, status)));
        }
        response
            .text()
            .await
            .map_err(|e| DashboardError::SourceUnavailable(format!("{}: {}", url, e)))
    }
}

/// Last point of the time series embedded in the chart page, if it is positive.
pub fn parse_latest_holder_count(html: &str) -> Option<u64> {
    SERIES_POINT
        .captures_iter(html)
        .last()
        .and_then(|caps| caps[2].parse::<u64>().ok())
        .filter(|count| *count > 0)
}

/// A single integer with optional surrounding whitespace; zero is not a count.
pub fn parse_fallback(text: &str) -> Option<u64> {
    text.trim().parse::<u64>().ok().filter(|count| *count > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCount {
    pub value: u64,
    /// Unix milliseconds when the value was scraped
    pub timestamp: i64,
}

impl CachedCount {
    /// Fresh when its age is within `[0, ttl)`; a timestamp in the future is stale.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match now.timestamp_millis().checked_sub(self.timestamp) {
            Some(age_ms) if age_ms >= 0 => (age_ms as u128) < ttl.as_millis(),
            _ => false,
        }
    }
}

pub struct HolderCountSource {
    fetcher: Arc<dyn HolderPageFetcher>,
    store: Arc<dyn KeyValueStore>,
    explorer_url: String,
    fallback_path: PathBuf,
    ttl: Duration,
}

impl HolderCountSource {
    pub fn new(
        fetcher: Arc<dyn HolderPageFetcher>,
        store: Arc<dyn KeyValueStore>,
        explorer_url: impl Into<String>,
        fallback_path: impl Into<PathBuf>,
        ttl: Duration,
    ) -> Self {
        Self {
            fetcher,
            store,
            explorer_url: explorer_url.into(),
            fallback_path: fallback_path.into(),
            ttl,
        }
    }

    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn HolderPageFetcher>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::new(
            fetcher,
            store,
            config.holders_explorer_url.clone(),
            config.holders_fallback_path.clone(),
            Duration::from_secs(config.holders_cache_ttl_secs),
        )
    }

    pub async fn count(&self) -> Result<u64> {
        self.count_at(Utc::now()).await
    }

    pub async fn count_at(&self, now: DateTime<Utc>) -> Result<u64> {
        if let Some(cached) = self.read_cache().await {
            if cached.is_fresh(now, self.ttl) {
                debug!("[holders] cache hit: {}", cached.value);
                return Ok(cached.value);
            }
        }

        match self.scrape().await {
            Ok(value) => {
                info!("[holders] scraped {} holders", value);
                self.write_cache(CachedCount {
                    value,
                    timestamp: now.timestamp_millis(),
                })
                .await;
                Ok(value)
            }
            Err(e) => {
                warn!("[holders] scrape failed ({}), reading {}", e, self.fallback_path.display());
                self.read_fallback().await
            }
        }
    }

    async fn read_cache(&self) -> Option<CachedCount> {
        let raw = match self.store.get(HOLDERS_CACHE_KEY).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("[holders] cache unreadable: {}", e);
                return None;
            }
        };
        match serde_json::from_str::<CachedCount>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("[holders] ignoring malformed cache entry: {}", e);
                None
            }
        }
    }

    async fn write_cache(&self, entry: CachedCount) {
        let result = match serde_json::to_string(&entry) {
            Ok(json) => self.store.set(HOLDERS_CACHE_KEY, json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!("[holders] failed to write cache: {}", e);
        }
    }

    async fn scrape(&self) -> Result<u64> {
        let page = self.fetcher.fetch_page(&self.explorer_url).await?;
        parse_latest_holder_count(&page).ok_or_else(|| {
            DashboardError::SourceUnavailable(format!(
                "no holder series found at {}",
                self.explorer_url
            ))
        })
    }

    async fn read_fallback(&self) -> Result<u64> {
        let text = tokio::fs::read_to_string(&self.fallback_path)
            .await
            .map_err(|e| {
                DashboardError::SourceUnavailable(format!("{}: {}", self.fallback_path.display(), e))
            })?;
        parse_fallback(&text).ok_or_else(|| {
            DashboardError::SourceUnavailable(format!(
                "{} holds no positive count",
                self.fallback_path.display()
            ))
        })
    }
}
