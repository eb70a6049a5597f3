//! Latency simulator completing the requests recorded by [`InMemoryWalletStore`].
//!
//! Stands in for the wallet's network and signing machinery: nonces arrive,
//! signatures complete, broadcasts produce hashes and receipts show up after a
//! configurable number of fetches.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::keccak256;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::store::{InMemoryWalletStore, WalletCommand};
use crate::domain::{
    BroadcastStatus, NotificationKind, RequestStatus, ResolutionRecord, ResolutionTarget,
    SignatureStatus, TransactionData, TransactionReceipt,
};

/// Simulator latencies and outcomes
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub nonce_latency: Duration,
    pub signature_latency: Duration,
    pub broadcast_latency: Duration,
    /// Receipt fetches answered with "not mined yet" before the receipt appears
    pub pending_receipt_fetches: u32,
    /// Delay between a mined receipt and the resolver reflecting it
    pub resolution_latency: Duration,
    /// Reject every broadcast
    pub fail_broadcasts: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            nonce_latency: Duration::from_millis(200),
            signature_latency: Duration::from_millis(500),
            broadcast_latency: Duration::from_millis(800),
            pending_receipt_fetches: 1,
            resolution_latency: Duration::from_millis(1_000),
            fail_broadcasts: false,
        }
    }
}

impl SimulatorConfig {
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
            nonce_latency: millis("SIM_NONCE_LATENCY_MS", defaults.nonce_latency),
            signature_latency: millis("SIM_SIGNATURE_LATENCY_MS", defaults.signature_latency),
            broadcast_latency: millis("SIM_BROADCAST_LATENCY_MS", defaults.broadcast_latency),
            pending_receipt_fetches: env::var("SIM_PENDING_RECEIPT_FETCHES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.pending_receipt_fetches),
            resolution_latency: millis("SIM_RESOLUTION_LATENCY_MS", defaults.resolution_latency),
            fail_broadcasts: env::var("SIM_FAIL_BROADCASTS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

pub struct WalletSimulator {
    store: Arc<InMemoryWalletStore>,
    config: SimulatorConfig,
    /// Resolution written once a transaction is mined
    on_mined: Option<ResolutionTarget>,
    /// Receipt fetches seen per hash
    fetches: Mutex<HashMap<String, u32>>,
    broadcasts: AtomicU64,
}

impl WalletSimulator {
    #[must_use]
    pub fn new(store: Arc<InMemoryWalletStore>, config: SimulatorConfig) -> Self {
        Self {
            store,
            config,
            on_mined: None,
            fetches: Mutex::new(HashMap::new()),
            broadcasts: AtomicU64::new(0),
        }
    }

    /// Make the resolver report `target.expected` once a transaction is mined
    #[must_use]
    pub fn with_resolution_on_mine(mut self, target: ResolutionTarget) -> Self {
        self.on_mined = Some(target);
        self
    }

    /// Start consuming the store's commands.
    ///
    /// Returns the task handle and a shutdown sender, like any other worker.
    pub fn spawn(self) -> (JoinHandle<()>, watch::Sender<bool>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let mut commands = self.store.attach_listener();
        let simulator = Arc::new(self);

        let handle = tokio::spawn(async move {
            info!("Wallet simulator started");
            loop {
                tokio::select! {
                    Ok(()) = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Wallet simulator shutting down");
                            break;
                        }
                    }
                    command = commands.recv() => {
                        let Some(command) = command else {
                            break;
                        };
                        let simulator = Arc::clone(&simulator);
                        tokio::spawn(async move { simulator.complete(command).await });
                    }
                }
            }
        });

        (handle, shutdown_tx)
    }

    async fn complete(&self, command: WalletCommand) {
        match command {
            WalletCommand::RequestNonce => {
                tokio::time::sleep(self.config.nonce_latency).await;
                debug!("Simulated nonce ready");
                self.store.set_nonce_status(RequestStatus::Succeeded);
            }
            WalletCommand::Sign(_) => {
                tokio::time::sleep(self.config.signature_latency).await;
                debug!("Simulated signature ready");
                self.store.set_signature_status(SignatureStatus {
                    pending: false,
                    signed: true,
                });
            }
            WalletCommand::BroadcastSigned => self.broadcast().await,
            WalletCommand::FetchReceipt(hash) => self.fetch_receipt(&hash).await,
            WalletCommand::SetFields(_)
            | WalletCommand::SetAutoGasLimit(_)
            | WalletCommand::RequestResolution { .. }
            | WalletCommand::RefreshBalance => {}
        }
    }

    async fn broadcast(&self) {
        tokio::time::sleep(self.config.broadcast_latency).await;

        if self.config.fail_broadcasts {
            warn!("Simulated broadcast rejected");
            self.store.set_broadcast_status(Some(BroadcastStatus::default()));
            return;
        }

        let n = self.broadcasts.fetch_add(1, Ordering::Relaxed);
        let draft = self.store.draft_snapshot();
        let mut preimage = draft.fields.data.unwrap_or_default().into_bytes();
        preimage.extend_from_slice(&n.to_be_bytes());
        let hash = keccak256(&preimage).to_string();

        info!(hash = %hash, "Simulated broadcast accepted");
        self.store.set_broadcast_status(Some(BroadcastStatus {
            is_broadcasting: false,
            broadcast_successful: true,
            broadcasted_hash: Some(hash.clone()),
        }));
        self.store
            .show_for_transaction(NotificationKind::Info, "Transaction broadcasted", &hash);
    }

    async fn fetch_receipt(&self, hash: &str) {
        let seen = {
            let mut fetches = self.fetches.lock().await;
            let count = fetches.entry(hash.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if seen <= self.config.pending_receipt_fetches {
            debug!(hash = %hash, seen, "Simulated receipt not mined yet");
            self.store
                .set_transaction_data(hash, TransactionData { receipt: None });
            return;
        }

        info!(hash = %hash, "Simulated receipt mined");
        self.store.set_transaction_data(
            hash,
            TransactionData {
                receipt: Some(TransactionReceipt {
                    status: 1,
                    block_number: Some(1_000_000 + u64::from(seen)),
                }),
            },
        );

        if let Some(target) = &self.on_mined {
            tokio::time::sleep(self.config.resolution_latency).await;
            self.store
                .set_resolution(&target.key, ResolutionRecord::success(target.expected.clone()));
        }
    }
}
