//! Flow Guardian — sliding-window request gate
//!
//! Evaluated before any classification or model call. A rejected request
//! records nothing; an admitted one appends `now` to its key's window.
//! Emptied windows are swept from the store at most once per window length,
//! piggybacked on admissions.
//!
//! # Usage
//!
//! ```rust,ignore
//! use flow_guardian::rate_limit::{FlowGuardian, RateLimitKey};
//!
//! let guardian = FlowGuardian::in_memory();
//! let key = RateLimitKey::new("ai-chat", user_id, client_ip);
//! if !guardian.allow(&key.to_string(), 20, 60_000).await {
//!     return throttled();
//! }
//! ```

pub mod clock;
pub mod key;
pub mod store;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{GuardError, GuardResult};

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{ClientIpHeaders, RateLimitKey, FALLBACK_CLIENT_IP};
pub use store::{Admission, InMemoryRateLimitStore, RateLimitEntry, RateLimitInfo, RateLimitStore};

/// Sliding-window limiter over a pluggable store and clock.
#[derive(Clone)]
pub struct FlowGuardian {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    /// Shared across clones so one sweep covers them all.
    last_sweep_ms: Arc<AtomicU64>,
}

impl FlowGuardian {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        let last_sweep_ms = Arc::new(AtomicU64::new(clock.now_ms()));
        Self {
            store,
            clock,
            last_sweep_ms,
        }
    }

    /// Single-instance limiter on the wall clock.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryRateLimitStore::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Try to admit one request for `key`.
    ///
    /// Store failures are propagated; see [`FlowGuardian::allow`] for the
    /// boolean gate.
    pub async fn admit(&self, key: &str, limit: u32, window_ms: u64) -> GuardResult<Admission> {
        let now_ms = self.clock.now_ms();
        let admission = self.store.admit(key, limit, window_ms, now_ms).await?;
        match admission {
            Admission::Admitted { remaining } => {
                debug!(key, remaining, "Request admitted");
            }
            Admission::Rejected { retry_after_ms } => {
                warn!(key, limit, window_ms, retry_after_ms, "Rate limit exceeded");
            }
        }
        self.sweep_if_due(now_ms, window_ms).await;
        Ok(admission)
    }

    /// Evict emptied windows once `window_ms` has passed since the last
    /// sweep. Only the caller that wins the swap runs it.
    async fn sweep_if_due(&self, now_ms: u64, window_ms: u64) {
        let last = self.last_sweep_ms.load(Ordering::Acquire);
        if now_ms < last.saturating_add(window_ms) {
            return;
        }
        if self
            .last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        match self.store.evict_expired(now_ms).await {
            Ok(0) => {}
            Ok(evicted) => debug!(evicted, "Swept idle rate-limit windows"),
            Err(e) => warn!(error = %e, "Rate limit sweep failed"),
        }
    }

    /// `true` if the request is admitted. A store failure rejects.
    pub async fn allow(&self, key: &str, limit: u32, window_ms: u64) -> bool {
        match self.admit(key, limit, window_ms).await {
            Ok(admission) => admission.is_admitted(),
            Err(e) => {
                warn!(key, error = %e, "Rate limit store failed, rejecting request");
                false
            }
        }
    }

    /// Admit or fail with [`GuardError::RateLimitExceeded`]. Returns the
    /// remaining slots on success.
    pub async fn check(&self, key: &str, limit: u32, window_ms: u64) -> GuardResult<u32> {
        match self.admit(key, limit, window_ms).await? {
            Admission::Admitted { remaining } => Ok(remaining),
            Admission::Rejected { retry_after_ms } => Err(GuardError::RateLimitExceeded {
                key: key.to_string(),
                retry_after_ms,
            }),
        }
    }

    pub async fn info(&self, key: &str) -> GuardResult<Option<RateLimitInfo>> {
        self.store.info(key, self.clock.now_ms()).await
    }

    /// Drop keys whose windows have emptied.
    pub async fn evict_expired(&self) -> GuardResult<usize> {
        let evicted = self.store.evict_expired(self.clock.now_ms()).await?;
        if evicted > 0 {
            debug!(evicted, "Evicted idle rate-limit windows");
        }
        Ok(evicted)
    }
}

impl std::fmt::Debug for FlowGuardian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowGuardian")
            .field("clock", &self.clock)
            .field("last_sweep_ms", &self.last_sweep_ms.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
