//! Domain traits defining contracts for external collaborators.
//!
//! Every port is observed through synchronous reads of the externally owned
//! state and driven through fire-and-forget async requests whose results show
//! up later as state changes.

use alloy_primitives::U256;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;

use super::error::AppError;
use super::types::{
    BroadcastStatus, DraftFields, GasEstimates, Notification, NotificationHandle,
    NotificationKind, RequestStatus, ResolutionRecord, SignatureStatus, TransactionData,
    TransactionDraft,
};

/// Read/write port onto the shared transaction draft
#[async_trait]
pub trait TransactionDraftStore: Send + Sync {
    /// Current draft snapshot
    fn draft(&self) -> TransactionDraft;

    /// Push the five transaction fields into the draft
    async fn set_fields(&self, fields: DraftFields) -> Result<(), AppError>;
}

/// Nonce retrieval for the active account
#[async_trait]
pub trait NonceProvider: Send + Sync {
    fn nonce_status(&self) -> RequestStatus;

    /// Request the nonce; the result is observed through `nonce_status`
    async fn request_nonce(&self) -> Result<(), AppError>;
}

/// Gas price estimates and the automatic gas-limit setting
#[async_trait]
pub trait GasEstimateProvider: Send + Sync {
    /// Latest estimates, if any have been fetched
    fn estimates(&self) -> Option<GasEstimates>;

    /// Status of the gas estimation request for the current draft
    fn estimation_status(&self) -> RequestStatus;

    /// Whether the wallet automatically estimates the gas limit
    fn auto_gas_limit(&self) -> bool;

    fn set_auto_gas_limit(&self, enabled: bool);
}

/// Transaction signer
#[async_trait]
pub trait Signer: Send + Sync {
    fn signature_status(&self) -> SignatureStatus;

    /// Request a signature over the full draft
    async fn sign(&self, draft: &TransactionDraft) -> Result<(), AppError>;
}

/// Broadcaster for the signed transaction
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Status of the current transaction, `None` if nothing was broadcast yet
    fn status(&self) -> Option<BroadcastStatus>;

    /// Submit the currently signed transaction to the network
    async fn broadcast_signed(&self) -> Result<(), AppError>;
}

/// Receipt lookups keyed by transaction hash
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    fn transaction_data(&self, hash: &str) -> Option<TransactionData>;

    /// Request fresh data for `hash`
    async fn fetch_receipt(&self, hash: &str) -> Result<(), AppError>;
}

/// Name resolution records keyed by the resolved key
#[async_trait]
pub trait NameResolutionStore: Send + Sync {
    fn record(&self, key: &str) -> Option<ResolutionRecord>;

    /// Request resolution of `key`; `force_refresh` bypasses any cached record
    async fn request_resolution(&self, key: &str, force_refresh: bool) -> Result<(), AppError>;
}

/// User-facing notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    fn show(
        &self,
        kind: NotificationKind,
        message: &str,
        duration: Option<Duration>,
    ) -> NotificationHandle;

    fn close(&self, handle: NotificationHandle);

    /// Notifications currently displayed
    fn notifications(&self) -> Vec<Notification>;
}

/// Account balance
#[async_trait]
pub trait BalanceRefresher: Send + Sync {
    /// Known balance in wei, `None` if not loaded yet
    fn balance(&self) -> Option<U256>;

    /// Fire-and-forget balance refresh
    async fn refresh(&self) -> Result<(), AppError>;
}

/// Change notifications for the externally owned state
pub trait StateChanges: Send + Sync {
    /// Receiver that observes a new revision after every state mutation
    fn subscribe(&self) -> watch::Receiver<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingNotifier {
        shown: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn show(
            &self,
            kind: NotificationKind,
            message: &str,
            duration: Option<Duration>,
        ) -> NotificationHandle {
            let handle = NotificationHandle::new();
            self.shown.lock().unwrap().push(Notification {
                handle,
                kind,
                message: message.to_string(),
                duration,
                tx_hash: None,
                created_at: chrono::Utc::now(),
            });
            handle
        }

        fn close(&self, handle: NotificationHandle) {
            self.shown.lock().unwrap().retain(|n| n.handle != handle);
        }

        fn notifications(&self) -> Vec<Notification> {
            self.shown.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_notifier_trait_object_show_and_close() {
        let notifier: Box<dyn Notifier> = Box::new(RecordingNotifier {
            shown: Mutex::new(Vec::new()),
        });
        let handle = notifier.show(NotificationKind::Warning, "careful", None);
        assert_eq!(notifier.notifications().len(), 1);
        notifier.close(handle);
        assert!(notifier.notifications().is_empty());
    }
}
