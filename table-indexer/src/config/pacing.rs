//! Delay policy for retries, submissions, pages and rate-limit recovery.
//!
//! Every sleep in the pipeline goes through this policy so tests can run with
//! [`PacingPolicy::none`] while production paces itself against the index.

use std::time::Duration;

use tokio::time::sleep;

/// Default pause before re-sending a chunk after a transport fault.
const DEFAULT_RETRY_BACKOFF_SECS: u64 = 60;

/// Default pause after submitting each chunk to the worker pool.
const DEFAULT_SUBMISSION_INTERVAL_SECS: u64 = 5;

/// Default pause after each page completes.
const DEFAULT_PAGE_INTERVAL_SECS: u64 = 25;

/// Default pause after each rate-limit recovery sub-chunk.
const DEFAULT_RECOVERY_INTERVAL_SECS: u64 = 15;

/// Delays applied between pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub retry_backoff: Duration,
    pub submission_interval: Duration,
    pub page_interval: Duration,
    pub recovery_interval: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(DEFAULT_RETRY_BACKOFF_SECS),
            submission_interval: Duration::from_secs(DEFAULT_SUBMISSION_INTERVAL_SECS),
            page_interval: Duration::from_secs(DEFAULT_PAGE_INTERVAL_SECS),
            recovery_interval: Duration::from_secs(DEFAULT_RECOVERY_INTERVAL_SECS),
        }
    }
}

impl PacingPolicy {
    /// A policy with no delays at all.
    pub fn none() -> Self {
        Self {
            retry_backoff: Duration::ZERO,
            submission_interval: Duration::ZERO,
            page_interval: Duration::ZERO,
            recovery_interval: Duration::ZERO,
        }
    }

    /// Pause before retry number `attempt` (1-based). Fixed backoff.
    pub fn retry_delay(&self, _attempt: u32) -> Duration {
        self.retry_backoff
    }

    /// Pause after submitting chunk `chunk` of a page.
    pub fn submission_delay(&self, _chunk: usize) -> Duration {
        self.submission_interval
    }

    /// Pause after finishing page `page`.
    pub fn page_delay(&self, _page: usize) -> Duration {
        self.page_interval
    }

    /// Pause after writing recovery sub-chunk `sub_chunk`.
    pub fn recovery_delay(&self, _sub_chunk: usize) -> Duration {
        self.recovery_interval
    }
}

/// Sleep for `delay`, returning immediately when it is zero.
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay).await;
    }
}
