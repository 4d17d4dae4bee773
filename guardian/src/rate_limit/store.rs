//! Rate-limit storage.
//!
//! [`RateLimitStore`] is the seam for where sliding-window timestamps live.
//! [`InMemoryRateLimitStore`] keeps them in process memory and is only
//! correct for a single-instance deployment: two replicas would each admit
//! `limit` requests per window. A shared-cache store can implement the same
//! trait for multi-instance deployments.

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::GuardResult;

/// Sliding window of admitted request timestamps for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    pub key: String,
    /// Epoch ms, oldest first.
    pub timestamps: VecDeque<u64>,
    pub limit: u32,
    pub window_ms: u64,
}

impl RateLimitEntry {
    pub fn new(key: impl Into<String>, limit: u32, window_ms: u64) -> Self {
        Self {
            key: key.into(),
            timestamps: VecDeque::new(),
            limit,
            window_ms,
        }
    }

    /// Drop timestamps older than `now_ms - window_ms`.
    pub fn prune(&mut self, now_ms: u64) {
        let floor = now_ms.saturating_sub(self.window_ms);
        while self.timestamps.front().is_some_and(|&t| t < floor) {
            self.timestamps.pop_front();
        }
    }

    /// Admit at `now_ms` if the window has room.
    ///
    /// Expects a pruned window.
    pub fn try_admit(&mut self, now_ms: u64) -> Admission {
        if (self.timestamps.len() as u64) < u64::from(self.limit) {
            self.timestamps.push_back(now_ms);
            Admission::Admitted {
                remaining: self.remaining(),
            }
        } else {
            Admission::Rejected {
                retry_after_ms: self.next_slot_at_ms().saturating_sub(now_ms),
            }
        }
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.timestamps.len() as u32)
    }

    /// First instant at which the oldest timestamp has left the window.
    pub fn next_slot_at_ms(&self) -> u64 {
        self.timestamps
            .front()
            .map(|&oldest| oldest.saturating_add(self.window_ms).saturating_add(1))
            .unwrap_or(0)
    }

    pub fn info(&self) -> RateLimitInfo {
        RateLimitInfo {
            limit: self.limit,
            remaining: self.remaining(),
            reset_at_ms: self.next_slot_at_ms(),
        }
    }
}

/// Result of one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum Admission {
    Admitted { remaining: u32 },
    Rejected { retry_after_ms: u64 },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

/// Snapshot of a live window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// When the oldest admitted request leaves the window.
    pub reset_at_ms: u64,
}

/// Storage for per-key sliding windows.
///
/// `admit` must run prune-check-append atomically per key: two concurrent
/// calls may never both see `count < limit` for the last free slot.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn admit(
        &self,
        key: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> GuardResult<Admission>;

    /// Current window for `key`, or `None` when it has no live requests.
    async fn info(&self, key: &str, now_ms: u64) -> GuardResult<Option<RateLimitInfo>>;

    /// Remove keys whose windows have emptied. Returns how many were removed.
    async fn evict_expired(&self, now_ms: u64) -> GuardResult<usize>;
}

/// Process-local store. Each key's window sits behind its map shard lock,
/// which is held for the whole prune-check-append.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn admit(
        &self,
        key: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> GuardResult<Admission> {
        if limit == 0 {
            return Ok(Admission::Rejected {
                retry_after_ms: window_ms,
            });
        }

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry::new(key, limit, window_ms));
        entry.limit = limit;
        entry.window_ms = window_ms;
        entry.prune(now_ms);
        Ok(entry.try_admit(now_ms))
    }

    async fn info(&self, key: &str, now_ms: u64) -> GuardResult<Option<RateLimitInfo>> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        let mut window = entry.clone();
        drop(entry);
        window.prune(now_ms);
        Ok((!window.timestamps.is_empty()).then(|| window.info()))
    }

    async fn evict_expired(&self, now_ms: u64) -> GuardResult<usize> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            entry.prune(now_ms);
            !entry.timestamps.is_empty()
        });
        Ok(before.saturating_sub(self.entries.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_keeps_window_boundary() {
        let mut e = RateLimitEntry::new("k", 5, 1_000);
        e.timestamps.extend([100, 500, 1_000]);
        e.prune(1_500);
        assert_eq!(e.timestamps, [500, 1_000]);
        e.prune(1_501);
        assert_eq!(e.timestamps, [1_000]);
    }

    #[test]
    fn test_rejection_reports_retry_after() {
        let mut e = RateLimitEntry::new("k", 2, 1_000);
        assert!(e.try_admit(0).is_admitted());
        assert!(e.try_admit(200).is_admitted());
        assert_eq!(
            e.try_admit(300),
            Admission::Rejected {
                retry_after_ms: 701
            }
        );
        assert_eq!(e.timestamps.len(), 2);
    }

    #[test]
    fn test_huge_window_saturates_retry_after() {
        let mut e = RateLimitEntry::new("k", 1, u64::MAX);
        assert!(e.try_admit(1_000).is_admitted());
        assert_eq!(
            e.try_admit(1_000),
            Admission::Rejected {
                retry_after_ms: u64::MAX - 1_000
            }
        );
        assert_eq!(e.info().reset_at_ms, u64::MAX);
    }

    #[tokio::test]
    async fn test_zero_limit_rejects_without_entry() {
        let store = InMemoryRateLimitStore::new();
        let a = store.admit("k", 0, 1_000, 0).await.unwrap();
        assert!(!a.is_admitted());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_info_and_eviction() {
        let store = InMemoryRateLimitStore::new();
        store.admit("a", 3, 1_000, 0).await.unwrap();
        store.admit("a", 3, 1_000, 10).await.unwrap();
        store.admit("b", 3, 5_000, 10).await.unwrap();

        let info = store.info("a", 20).await.unwrap().unwrap();
        assert_eq!(info.remaining, 1);
        assert_eq!(info.reset_at_ms, 1_001);
        assert!(store.info("missing", 20).await.unwrap().is_none());

        assert_eq!(store.evict_expired(2_000).await.unwrap(), 1);
        assert!(store.info("a", 2_000).await.unwrap().is_none());
        assert_eq!(store.len(), 1);
    }
}
