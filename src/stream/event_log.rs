use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AppError;
use crate::models::{Platform, TrendSignal};

/// One entry on the log. Carries the serialized signal payload plus the
/// denormalized columns consumers filter on without deserializing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position on the log; strictly increasing per log
    pub offset: u64,
    /// JSON-serialized TrendSignal
    pub payload: String,
    pub platform: Platform,
    pub keyword: String,
    pub timestamp: DateTime<Utc>,
    pub momentum: f64,
}

impl LogEntry {
    pub fn signal(&self) -> Result<TrendSignal, AppError> {
        serde_json::from_str(&self.payload)
            .map_err(|e| AppError::Validation(format!("undecodable log payload: {}", e)))
    }
}

/// Ordered, at-least-once delivery log with consumer-group semantics.
/// One logical stream; each group keeps its own cursor and acknowledges
/// processed entries individually. Publish order is preserved per
/// producer; a group that crashes before acking re-reads the entry.
pub trait EventLog: Send + Sync {
    /// Append one signal as a single atomic entry. Returns its offset.
    fn append(&self, signal: &TrendSignal) -> Result<u64, AppError>;

    /// Read up to `max` unacknowledged entries for `group`, starting at
    /// the group's cursor. Does not advance the cursor; redelivery
    /// happens until `ack`.
    fn read(&self, group: &str, max: usize) -> Vec<LogEntry>;

    /// Acknowledge one processed entry for `group`.
    fn ack(&self, group: &str, offset: u64);

    /// Total entries ever appended.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct GroupCursor {
    /// Everything below this offset is acknowledged.
    committed: u64,
    /// Acknowledged offsets at or above `committed` (out-of-order acks).
    acked: BTreeSet<u64>,
}

/// In-memory `EventLog`. Production deployments put a persistent log
/// behind the same trait; the pipeline and its tests run against this
/// one.
pub struct InMemoryEventLog {
    entries: RwLock<Vec<LogEntry>>,
    groups: DashMap<String, GroupCursor>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            groups: DashMap::new(),
        }
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog for InMemoryEventLog {
    fn append(&self, signal: &TrendSignal) -> Result<u64, AppError> {
        let payload = serde_json::to_string(signal)
            .map_err(|e| AppError::Validation(format!("unserializable signal: {}", e)))?;

        let mut entries = self.entries.write();
        let offset = entries.len() as u64;
        entries.push(LogEntry {
            offset,
            payload,
            platform: signal.platform,
            keyword: signal.keyword.clone(),
            timestamp: signal.timestamp,
            momentum: signal.momentum,
        });
        debug!(
            "📝 [LOG] appended offset {} ({} / {})",
            offset, signal.platform, signal.keyword
        );
        Ok(offset)
    }

    fn read(&self, group: &str, max: usize) -> Vec<LogEntry> {
        let cursor = self.groups.entry(group.to_string()).or_default();
        let entries = self.entries.read();

        entries
            .iter()
            .skip(cursor.committed as usize)
            .filter(|e| !cursor.acked.contains(&e.offset))
            .take(max)
            .cloned()
            .collect()
    }

    fn ack(&self, group: &str, offset: u64) {
        let mut cursor = self.groups.entry(group.to_string()).or_default();
        if offset < cursor.committed {
            return; // duplicate ack, at-least-once makes these normal
        }
        cursor.acked.insert(offset);
        // Advance the committed watermark over contiguous acks.
        loop {
            let next = cursor.committed;
            if cursor.acked.remove(&next) {
                cursor.committed = next + 1;
            } else {
                break;
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LifecycleStage;

    fn signal(keyword: &str, momentum: f64) -> TrendSignal {
        TrendSignal::new(
            Platform::Twitter,
            keyword,
            momentum,
            0.8,
            1_000,
            Utc::now(),
            LifecycleStage::Emerging,
            vec![],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn test_append_preserves_order_and_offsets() {
        let log = InMemoryEventLog::new();
        for i in 0..5 {
            let offset = log.append(&signal("ai", 0.1 * i as f64)).unwrap();
            assert_eq!(offset, i);
        }
        assert_eq!(log.len(), 5);

        let entries = log.read("analysis", 10);
        let offsets: Vec<u64> = entries.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_unacked_entries_are_redelivered() {
        let log = InMemoryEventLog::new();
        log.append(&signal("ai", 0.5)).unwrap();
        log.append(&signal("ai", 0.6)).unwrap();

        let first_read = log.read("analysis", 10);
        assert_eq!(first_read.len(), 2);

        // Nothing acked: the same entries come back.
        let second_read = log.read("analysis", 10);
        assert_eq!(second_read.len(), 2);

        log.ack("analysis", 0);
        let third_read = log.read("analysis", 10);
        assert_eq!(third_read.len(), 1);
        assert_eq!(third_read[0].offset, 1);
    }

    #[test]
    fn test_out_of_order_acks_advance_watermark() {
        let log = InMemoryEventLog::new();
        for _ in 0..3 {
            log.append(&signal("ai", 0.5)).unwrap();
        }

        log.ack("analysis", 2);
        log.ack("analysis", 0);
        // Offset 1 still pending.
        let pending = log.read("analysis", 10);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].offset, 1);

        log.ack("analysis", 1);
        assert!(log.read("analysis", 10).is_empty());
    }

    #[test]
    fn test_groups_are_independent() {
        let log = InMemoryEventLog::new();
        log.append(&signal("ai", 0.5)).unwrap();

        log.ack("fast-group", 0);
        assert!(log.read("fast-group", 10).is_empty());
        assert_eq!(log.read("slow-group", 10).len(), 1);
    }

    #[test]
    fn test_payload_round_trips() {
        let log = InMemoryEventLog::new();
        let original = signal("artificial intelligence", 0.73);
        log.append(&original).unwrap();

        let entry = &log.read("analysis", 1)[0];
        assert_eq!(entry.keyword, "artificial intelligence");
        assert!((entry.momentum - 0.73).abs() < f64::EPSILON);

        let decoded = entry.signal().unwrap();
        assert_eq!(decoded.keyword, original.keyword);
        assert_eq!(decoded.platform, original.platform);
        assert_eq!(decoded.volume, original.volume);
    }

    #[test]
    fn test_duplicate_ack_is_harmless() {
        let log = InMemoryEventLog::new();
        log.append(&signal("ai", 0.5)).unwrap();
        log.ack("analysis", 0);
        log.ack("analysis", 0);
        assert!(log.read("analysis", 10).is_empty());
    }
}
