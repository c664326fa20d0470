//! Named display slots and the sinks that receive them.

use crate::error::DashboardError;
use crate::supply::{LockBucket, PoolId};
use log::{info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    TotalSupply,
    Burned,
    CirculatingSupply,
    PoolBucket(PoolId, LockBucket),
    PoolTotal(PoolId),
    AllPoolsBucket(LockBucket),
    AllPoolsTotal,
    LastUpdated,
    HoldersCount,
}

impl Slot {
    /// Identifier the page binds to, e.g. `pool1-365days` or `all-90days`.
    pub fn id(&self) -> String {
        match self {
            Slot::TotalSupply => "totalSupply".to_string(),
            Slot::Burned => "burnedTokens".to_string(),
            Slot::CirculatingSupply => "circulatingSupply".to_string(),
            Slot::PoolBucket(pool, bucket) => format!("{}-{}", pool.slot_prefix(), bucket),
            Slot::PoolTotal(pool) => format!("{}-total", pool.slot_prefix()),
            Slot::AllPoolsBucket(bucket) => format!("all-{}", bucket),
            Slot::AllPoolsTotal => "allPools-total".to_string(),
            Slot::LastUpdated => "lastUpdated".to_string(),
            Slot::HoldersCount => "holdersCount".to_string(),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Formatted text, or the error that kept the field from being computed.
pub type SlotValue = std::result::Result<String, DashboardError>;

pub trait DisplaySink: Send + Sync {
    fn update(&self, slot: Slot, value: SlotValue);
}

/// Writes every update to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl DisplaySink for LogSink {
    fn update(&self, slot: Slot, value: SlotValue) {
        match value {
            Ok(text) => info!("[display] {:<20} {}", slot.id(), text),
            Err(e) => warn!("[display] {:<20} Error ({:?}): {}", slot.id(), e.categorize(), e),
        }
    }
}

/// Keeps the latest value per slot.
#[derive(Debug, Default)]
pub struct RecordingSink {
    values: Mutex<BTreeMap<String, SlotValue>>,
    updates: Mutex<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: Slot) -> Option<SlotValue> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&slot.id())
            .cloned()
    }

    /// Text of a slot that holds a value; `None` when missing or errored.
    pub fn text(&self, slot: Slot) -> Option<String> {
        self.get(slot).and_then(|v| v.ok())
    }

    pub fn snapshot(&self) -> BTreeMap<String, SlotValue> {
        self.values.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn update_count(&self) -> usize {
        *self.updates.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DisplaySink for RecordingSink {
    fn update(&self, slot: Slot, value: SlotValue) {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(slot.id(), value);
        *self.updates.lock().unwrap_or_else(|e| e.into_inner()) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slot_ids() {
        assert_eq!(Slot::PoolBucket(PoolId::A, LockBucket::Days1095).id(), "pool1-1095days");
        assert_eq!(Slot::PoolTotal(PoolId::B).id(), "pool2-total");
        assert_eq!(Slot::AllPoolsBucket(LockBucket::Days90).id(), "all-90days");
        assert_eq!(Slot::Burned.id(), "burnedTokens");
    }

    #[test]
    fn test_recording_sink_keeps_latest() {
        let sink = RecordingSink::new();
        sink.update(Slot::HoldersCount, Ok("1".to_string()));
        sink.update(
            Slot::HoldersCount,
            Err(DashboardError::SourceUnavailable("down".to_string())),
        );
        assert!(sink.text(Slot::HoldersCount).is_none());
        assert!(matches!(
            sink.get(Slot::HoldersCount),
            Some(Err(DashboardError::SourceUnavailable(_)))
        ));
        assert_eq!(sink.update_count(), 2);
    }
}
