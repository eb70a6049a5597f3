//! In-memory wallet store implementing every collaborator port.
//!
//! Holds the transaction draft, signer and broadcaster flags, receipt data,
//! resolution records and notifications. Every mutation bumps a revision on a
//! `watch` channel so observers can react to changes. Requests issued through
//! the ports are only recorded; something else (a [`super::WalletSimulator`],
//! a test) completes them by writing the results back.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use alloy_primitives::U256;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use crate::domain::{
    AppError, BalanceRefresher, BroadcastStatus, Broadcaster, DraftFields, GasEstimateProvider,
    GasEstimates, NameResolutionStore, NonceProvider, Notification, NotificationHandle,
    NotificationKind, Notifier, ReceiptStore, RequestStatus, ResolutionRecord, SignatureStatus,
    Signer, StateChanges, TransactionData, TransactionDraft, TransactionDraftStore,
};

/// A request made through one of the ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletCommand {
    SetFields(DraftFields),
    RequestNonce,
    SetAutoGasLimit(bool),
    Sign(TransactionDraft),
    BroadcastSigned,
    FetchReceipt(String),
    RequestResolution { key: String, force_refresh: bool },
    RefreshBalance,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedCommand {
    pub command: WalletCommand,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct WalletState {
    draft: TransactionDraft,
    estimates: Option<GasEstimates>,
    estimation_status: RequestStatus,
    auto_gas_limit: bool,
    signature: SignatureStatus,
    broadcast: Option<BroadcastStatus>,
    balance: Option<U256>,
    notifications: Vec<Notification>,
}

pub struct InMemoryWalletStore {
    state: Mutex<WalletState>,
    /// Transaction data keyed by hash
    tx_data: DashMap<String, TransactionData>,
    /// Resolution records keyed by address or domain
    resolutions: DashMap<String, ResolutionRecord>,
    issued: Mutex<Vec<IssuedCommand>>,
    listener: Mutex<Option<mpsc::UnboundedSender<WalletCommand>>>,
    revision: watch::Sender<u64>,
}

impl Default for InMemoryWalletStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryWalletStore {
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Mutex::new(WalletState::default()),
            tx_data: DashMap::new(),
            resolutions: DashMap::new(),
            issued: Mutex::new(Vec::new()),
            listener: Mutex::new(None),
            revision,
        }
    }

    /// Receive every command issued from now on. Replaces any previous listener.
    pub fn attach_listener(&self) -> mpsc::UnboundedReceiver<WalletCommand> {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.listener) = Some(tx);
        rx
    }

    /// Commands issued so far, oldest first
    #[must_use]
    pub fn issued(&self) -> Vec<IssuedCommand> {
        lock(&self.issued).clone()
    }

    #[must_use]
    pub fn count_issued(&self, predicate: impl Fn(&WalletCommand) -> bool) -> usize {
        lock(&self.issued)
            .iter()
            .filter(|issued| predicate(&issued.command))
            .count()
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    fn log_command(&self, command: WalletCommand) {
        trace!(?command, "Command issued");
        if let Some(listener) = lock(&self.listener).as_ref() {
            let _ = listener.send(command.clone());
        }
        lock(&self.issued).push(IssuedCommand {
            command,
            issued_at: Utc::now(),
        });
    }

    fn mutate(&self, f: impl FnOnce(&mut WalletState)) {
        f(&mut lock(&self.state));
        self.bump();
    }

    // ------------------------------------------------------------------------
    // Direct writes, used by whatever completes the issued requests
    // ------------------------------------------------------------------------

    pub fn set_nonce_status(&self, status: RequestStatus) {
        self.mutate(|s| s.draft.nonce_status = status);
    }

    pub fn set_estimation_status(&self, status: RequestStatus) {
        self.mutate(|s| s.estimation_status = status);
    }

    pub fn set_estimates(&self, estimates: Option<GasEstimates>) {
        self.mutate(|s| s.estimates = estimates);
    }

    /// Change the auto gas-limit preference without recording a command
    pub fn configure_auto_gas_limit(&self, enabled: bool) {
        self.mutate(|s| s.auto_gas_limit = enabled);
    }

    pub fn set_signature_status(&self, status: SignatureStatus) {
        self.mutate(|s| s.signature = status);
    }

    pub fn set_broadcast_status(&self, status: Option<BroadcastStatus>) {
        self.mutate(|s| s.broadcast = status);
    }

    pub fn set_balance(&self, balance: Option<U256>) {
        self.mutate(|s| s.balance = balance);
    }

    pub fn set_transaction_data(&self, hash: &str, data: TransactionData) {
        self.tx_data.insert(hash.to_string(), data);
        self.bump();
    }

    pub fn set_resolution(&self, key: &str, record: ResolutionRecord) {
        self.resolutions.insert(key.to_string(), record);
        self.bump();
    }

    /// Write draft fields as an external writer would, keeping the signature
    pub fn overwrite_fields(&self, fields: DraftFields) {
        self.mutate(|s| s.draft.fields = fields);
    }

    /// Show a notification tied to a transaction hash
    pub fn show_for_transaction(
        &self,
        kind: NotificationKind,
        message: &str,
        tx_hash: &str,
    ) -> NotificationHandle {
        self.push_notification(kind, message, None, Some(tx_hash.to_string()))
    }

    fn push_notification(
        &self,
        kind: NotificationKind,
        message: &str,
        duration: Option<Duration>,
        tx_hash: Option<String>,
    ) -> NotificationHandle {
        let handle = NotificationHandle::new();
        debug!(?kind, message = %message, "Notification shown");
        self.mutate(|s| {
            s.notifications.push(Notification {
                handle,
                kind,
                message: message.to_string(),
                duration,
                tx_hash,
                created_at: Utc::now(),
            })
        });
        handle
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn draft_snapshot(&self) -> TransactionDraft {
        lock(&self.state).draft.clone()
    }

    #[must_use]
    pub fn notifications_snapshot(&self) -> Vec<Notification> {
        lock(&self.state).notifications.clone()
    }

    #[must_use]
    pub fn auto_gas_limit_enabled(&self) -> bool {
        lock(&self.state).auto_gas_limit
    }

    #[must_use]
    pub fn broadcast_snapshot(&self) -> Option<BroadcastStatus> {
        lock(&self.state).broadcast.clone()
    }
}

#[async_trait]
impl TransactionDraftStore for InMemoryWalletStore {
    fn draft(&self) -> TransactionDraft {
        self.draft_snapshot()
    }

    async fn set_fields(&self, fields: DraftFields) -> Result<(), AppError> {
        self.log_command(WalletCommand::SetFields(fields.clone()));
        // New fields describe a new transaction: earlier signing and broadcast state is stale.
        self.mutate(|s| {
            s.draft.fields = fields;
            s.signature = SignatureStatus::default();
            s.broadcast = None;
        });
        Ok(())
    }
}

#[async_trait]
impl NonceProvider for InMemoryWalletStore {
    fn nonce_status(&self) -> RequestStatus {
        lock(&self.state).draft.nonce_status
    }

    async fn request_nonce(&self) -> Result<(), AppError> {
        self.log_command(WalletCommand::RequestNonce);
        self.mutate(|s| s.draft.nonce_status = RequestStatus::Requested);
        Ok(())
    }
}

#[async_trait]
impl GasEstimateProvider for InMemoryWalletStore {
    fn estimates(&self) -> Option<GasEstimates> {
        lock(&self.state).estimates
    }

    fn estimation_status(&self) -> RequestStatus {
        lock(&self.state).estimation_status
    }

    fn auto_gas_limit(&self) -> bool {
        self.auto_gas_limit_enabled()
    }

    fn set_auto_gas_limit(&self, enabled: bool) {
        self.log_command(WalletCommand::SetAutoGasLimit(enabled));
        self.configure_auto_gas_limit(enabled);
    }
}

#[async_trait]
impl Signer for InMemoryWalletStore {
    fn signature_status(&self) -> SignatureStatus {
        lock(&self.state).signature
    }

    async fn sign(&self, draft: &TransactionDraft) -> Result<(), AppError> {
        self.log_command(WalletCommand::Sign(draft.clone()));
        self.mutate(|s| {
            s.signature = SignatureStatus {
                pending: true,
                signed: false,
            }
        });
        Ok(())
    }
}

#[async_trait]
impl Broadcaster for InMemoryWalletStore {
    fn status(&self) -> Option<BroadcastStatus> {
        self.broadcast_snapshot()
    }

    async fn broadcast_signed(&self) -> Result<(), AppError> {
        self.log_command(WalletCommand::BroadcastSigned);
        self.mutate(|s| {
            s.broadcast = Some(BroadcastStatus {
                is_broadcasting: true,
                broadcast_successful: false,
                broadcasted_hash: None,
            })
        });
        Ok(())
    }
}

#[async_trait]
impl ReceiptStore for InMemoryWalletStore {
    fn transaction_data(&self, hash: &str) -> Option<TransactionData> {
        self.tx_data.get(hash).map(|entry| entry.value().clone())
    }

    async fn fetch_receipt(&self, hash: &str) -> Result<(), AppError> {
        self.log_command(WalletCommand::FetchReceipt(hash.to_string()));
        Ok(())
    }
}

#[async_trait]
impl NameResolutionStore for InMemoryWalletStore {
    fn record(&self, key: &str) -> Option<ResolutionRecord> {
        self.resolutions.get(key).map(|entry| entry.value().clone())
    }

    async fn request_resolution(&self, key: &str, force_refresh: bool) -> Result<(), AppError> {
        self.log_command(WalletCommand::RequestResolution {
            key: key.to_string(),
            force_refresh,
        });
        if !self.resolutions.contains_key(key) {
            self.set_resolution(key, ResolutionRecord::pending());
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for InMemoryWalletStore {
    fn show(
        &self,
        kind: NotificationKind,
        message: &str,
        duration: Option<Duration>,
    ) -> NotificationHandle {
        self.push_notification(kind, message, duration, None)
    }

    fn close(&self, handle: NotificationHandle) {
        self.mutate(|s| s.notifications.retain(|n| n.handle != handle));
    }

    fn notifications(&self) -> Vec<Notification> {
        self.notifications_snapshot()
    }
}

#[async_trait]
impl BalanceRefresher for InMemoryWalletStore {
    fn balance(&self) -> Option<U256> {
        lock(&self.state).balance
    }

    async fn refresh(&self) -> Result<(), AppError> {
        self.log_command(WalletCommand::RefreshBalance);
        Ok(())
    }
}

impl StateChanges for InMemoryWalletStore {
    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_fields_resets_signature_and_broadcast() {
        let store = InMemoryWalletStore::new();
        store.set_signature_status(SignatureStatus {
            pending: false,
            signed: true,
        });
        store.set_broadcast_status(Some(BroadcastStatus {
            is_broadcasting: false,
            broadcast_successful: true,
            broadcasted_hash: Some("0x1".to_string()),
        }));

        store
            .set_fields(DraftFields {
                to: Some("0x00000000000000000000000000000000000000aa".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(store.signature_status(), SignatureStatus::default());
        assert!(store.status().is_none());
        assert_eq!(
            store.count_issued(|c| matches!(c, WalletCommand::SetFields(_))),
            1
        );
    }

    #[tokio::test]
    async fn test_every_mutation_bumps_revision() {
        let store = InMemoryWalletStore::new();
        let mut changes = store.subscribe();
        let before = store.revision();

        store.request_nonce().await.unwrap();
        assert!(changes.has_changed().unwrap());
        changes.borrow_and_update();

        store.set_transaction_data("0xabc", TransactionData::default());
        assert!(changes.has_changed().unwrap());
        assert_eq!(store.revision(), before + 2);
        assert_eq!(store.nonce_status(), RequestStatus::Requested);
    }

    #[tokio::test]
    async fn test_listener_receives_issued_commands() {
        let store = InMemoryWalletStore::new();
        let mut commands = store.attach_listener();

        store.fetch_receipt("0xabc").await.unwrap();
        store.request_resolution("alice.eth", true).await.unwrap();

        assert_eq!(
            commands.recv().await,
            Some(WalletCommand::FetchReceipt("0xabc".to_string()))
        );
        assert_eq!(
            commands.recv().await,
            Some(WalletCommand::RequestResolution {
                key: "alice.eth".to_string(),
                force_refresh: true
            })
        );
        assert_eq!(
            store.record("alice.eth").map(|r| r.state),
            Some(crate::domain::ResolutionState::Pending)
        );
    }

    #[test]
    fn test_close_removes_only_matching_notification() {
        let store = InMemoryWalletStore::new();
        let pending = store.show_for_transaction(NotificationKind::Info, "sent", "0xabc");
        store.show(NotificationKind::Success, "done", Some(Duration::from_secs(10)));

        store.close(pending);

        let remaining = store.notifications();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message, "done");
    }
}
