//! Keystroke debounce for subdomain availability lookups.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::builder::ContractRegistry;
use crate::app::status::SubdomainInput;
use crate::domain::{NameResolutionStore, NetworkConfig, ResolutionState};

/// Quiet period after the last keystroke before a lookup is issued
pub const DEFAULT_LOOKUP_DELAY: Duration = Duration::from_millis(500);

pub struct LookupDebouncer {
    store: Arc<dyn NameResolutionStore>,
    registry: Arc<ContractRegistry>,
    network: NetworkConfig,
    delay: Duration,
    /// Bumped on every keystroke; a pending lookup only fires if it is still current
    generation: Arc<AtomicU64>,
}

impl LookupDebouncer {
    #[must_use]
    pub fn new(
        store: Arc<dyn NameResolutionStore>,
        registry: Arc<ContractRegistry>,
        network: NetworkConfig,
    ) -> Self {
        Self {
            store,
            registry,
            network,
            delay: DEFAULT_LOOKUP_DELAY,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Record a keystroke and schedule a lookup for its label.
    ///
    /// The returned task resolves to true if the lookup was issued, false if a
    /// newer keystroke superseded it or the label is empty.
    pub fn keystroke(&self, raw: &str) -> (SubdomainInput, JoinHandle<bool>) {
        let input = SubdomainInput::from_keystroke(raw);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let domain = (!input.label.is_empty()).then(|| self.registry.full_domain(&input.label));
        let current = Arc::clone(&self.generation);
        let store = Arc::clone(&self.store);
        let delay = self.delay;

        let handle = tokio::spawn(async move {
            let Some(domain) = domain else {
                return false;
            };
            tokio::time::sleep(delay).await;
            if current.load(Ordering::SeqCst) != generation {
                debug!(domain = %domain, "Lookup superseded by a newer keystroke");
                return false;
            }
            if let Err(e) = store.request_resolution(&domain, false).await {
                warn!(domain = %domain, error = ?e, "Availability lookup failed");
            }
            true
        });

        (input, handle)
    }

    /// On test networks a failed lookup is retried. Returns true if a retry was issued.
    pub async fn retry_if_failed(&self, input: &SubdomainInput) -> bool {
        if !self.network.is_testnet || input.label.is_empty() {
            return false;
        }
        let domain = self.registry.full_domain(&input.label);
        let failed = self
            .store
            .record(&domain)
            .is_some_and(|r| r.state == ResolutionState::Failed);
        if !failed {
            return false;
        }
        debug!(domain = %domain, "Retrying failed lookup on test network");
        if let Err(e) = self.store.request_resolution(&domain, false).await {
            warn!(domain = %domain, error = ?e, "Availability lookup retry failed");
        }
        true
    }
}
