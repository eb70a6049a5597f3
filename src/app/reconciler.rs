//! Bounded re-query loop that waits for name resolution to reflect a completed write.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::domain::{NameResolutionStore, ResolutionState, ResolutionTarget};

/// Number of re-checks before giving up
pub const DEFAULT_RECONCILE_TTL: u32 = 35;

/// Configuration for [`NameResolutionReconciler`]
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Delay before re-checking a record that is not resolved yet
    pub pending_delay: Duration,
    /// Delay after forcing a refresh of a resolved but stale record
    pub mismatch_delay: Duration,
    /// Delay before the single refresh issued once the ttl is spent
    pub final_refresh_delay: Duration,
    pub ttl: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            pending_delay: Duration::from_millis(250),
            mismatch_delay: Duration::from_millis(350),
            final_refresh_delay: Duration::from_millis(3000),
            ttl: DEFAULT_RECONCILE_TTL,
        }
    }
}

impl ReconcilerConfig {
    /// Load overrides from `RECONCILER_*` environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            env::var(key)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            pending_delay: millis("RECONCILER_PENDING_DELAY_MS", defaults.pending_delay),
            mismatch_delay: millis("RECONCILER_MISMATCH_DELAY_MS", defaults.mismatch_delay),
            final_refresh_delay: millis(
                "RECONCILER_FINAL_REFRESH_DELAY_MS",
                defaults.final_refresh_delay,
            ),
            ttl: env::var("RECONCILER_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ttl),
        }
    }
}

/// How a reconciliation run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record matched after `reschedules` re-checks
    Converged { reschedules: u32 },
    /// The ttl ran out; one final refresh was issued
    Exhausted { reschedules: u32 },
}

impl ReconcileOutcome {
    #[must_use]
    pub fn reschedules(&self) -> u32 {
        match self {
            Self::Converged { reschedules } | Self::Exhausted { reschedules } => *reschedules,
        }
    }

    #[must_use]
    pub fn converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }
}

pub struct NameResolutionReconciler {
    store: Arc<dyn NameResolutionStore>,
    config: ReconcilerConfig,
}

impl NameResolutionReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn NameResolutionStore>, config: ReconcilerConfig) -> Self {
        Self { store, config }
    }

    /// Re-check the record for `target.key` until it equals `target.expected`
    /// or the ttl is spent.
    #[instrument(skip(self, target), fields(key = %target.key))]
    pub async fn reconcile(&self, target: &ResolutionTarget) -> ReconcileOutcome {
        let mut ttl = self.config.ttl;
        let mut reschedules = 0u32;

        loop {
            if ttl == 0 {
                tokio::time::sleep(self.config.final_refresh_delay).await;
                self.refresh(&target.key).await;
                warn!(reschedules, "Resolution did not converge, issued final refresh");
                return ReconcileOutcome::Exhausted { reschedules };
            }

            let record = self.store.record(&target.key);
            let resolved = record
                .as_ref()
                .filter(|r| r.state == ResolutionState::Success)
                .and_then(|r| r.resolved_data());

            match resolved {
                Some(data) if *data == target.expected => {
                    info!(reschedules, "Resolution reflects the update");
                    return ReconcileOutcome::Converged { reschedules };
                }
                Some(data) => {
                    debug!(ttl, resolved_name = %data.name, "Resolution stale, forcing refresh");
                    self.refresh(&target.key).await;
                    tokio::time::sleep(self.config.mismatch_delay).await;
                }
                None => {
                    debug!(ttl, "Resolution not available yet");
                    tokio::time::sleep(self.config.pending_delay).await;
                }
            }

            ttl -= 1;
            reschedules += 1;
        }
    }

    /// Run [`Self::reconcile`] on its own task
    pub fn spawn(self: Arc<Self>, target: ResolutionTarget) -> JoinHandle<ReconcileOutcome> {
        tokio::spawn(async move { self.reconcile(&target).await })
    }

    async fn refresh(&self, key: &str) {
        if let Err(e) = self.store.request_resolution(key, true).await {
            warn!(key = %key, error = ?e, "Resolution refresh failed");
        }
    }
}
