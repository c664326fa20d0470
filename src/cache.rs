// src/cache.rs
//! Small key-value stores holding JSON strings across cycles and restarts.
//!
//! The file store is the default; Redis is used when `REDIS_URL` is set.

use crate::error::{DashboardError, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
}

/// All keys in one JSON object on disk, e.g. `{"holders_count": "{...}"}`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(HashMap::new()),
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                DashboardError::CacheRead(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(DashboardError::CacheRead(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.load().await?;
        debug!("File cache {} for key {}", if entries.contains_key(key) { "HIT" } else { "MISS" }, key);
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        // a corrupt file is replaced rather than blocking every later write
        let mut entries = self.load().await.unwrap_or_else(|e| {
            warn!("Discarding unreadable cache file: {}", e);
            HashMap::new()
        });
        entries.insert(key.to_string(), value);
        let text = serde_json::to_string_pretty(&entries)
            .map_err(|e| DashboardError::CacheRead(e.to_string()))?;
        tokio::fs::write(&self.path, text).await.map_err(|e| {
            DashboardError::CacheRead(format!("write {}: {}", self.path.display(), e))
        })
    }
}

/// Shared Redis store over a `ConnectionManager`, which reconnects on its own.
#[derive(Clone)]
pub struct RedisStore {
    conn_manager: ConnectionManager,
    redis_url: String,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("redis_url", &self.redis_url)
            .field("conn_manager", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisStore {
    pub async fn new(redis_url: &str) -> Result<Self> {
        info!("Initializing Redis connection manager for URL: {}", redis_url);
        let client = redis::Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to create Redis ConnectionManager: {}", e);
            DashboardError::CacheRead(format!("Failed to create Redis ConnectionManager: {}", e))
        })?;
        Ok(Self {
            conn_manager,
            redis_url: redis_url.to_string(),
        })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn_manager.clone();
        conn.get::<_, Option<String>>(key).await.map_err(|e| {
            error!("Redis GET error for key {}: {}", key, e);
            DashboardError::from(e)
        })
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(|e| {
            warn!("Failed to SET key '{}' in Redis: {}", key, e);
            DashboardError::from(e)
        })
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
        Ok(())
    }
}
