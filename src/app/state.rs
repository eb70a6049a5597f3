//! Shared collaborator handles.

use std::sync::Arc;

use crate::domain::{
    BalanceRefresher, Broadcaster, GasEstimateProvider, NameResolutionStore, NonceProvider,
    Notifier, ReceiptStore, Signer, StateChanges, TransactionDraftStore,
};

/// Every external port the coordinator drives, bundled for cheap cloning
#[derive(Clone)]
pub struct Collaborators {
    pub drafts: Arc<dyn TransactionDraftStore>,
    pub nonce: Arc<dyn NonceProvider>,
    pub gas: Arc<dyn GasEstimateProvider>,
    pub signer: Arc<dyn Signer>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub receipts: Arc<dyn ReceiptStore>,
    pub resolutions: Arc<dyn NameResolutionStore>,
    pub notifier: Arc<dyn Notifier>,
    pub balance: Arc<dyn BalanceRefresher>,
    pub changes: Arc<dyn StateChanges>,
}

impl Collaborators {
    /// Use a single store implementing every port
    #[must_use]
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: TransactionDraftStore
            + NonceProvider
            + GasEstimateProvider
            + Signer
            + Broadcaster
            + ReceiptStore
            + NameResolutionStore
            + Notifier
            + BalanceRefresher
            + StateChanges
            + 'static,
    {
        Self {
            drafts: store.clone(),
            nonce: store.clone(),
            gas: store.clone(),
            signer: store.clone(),
            broadcaster: store.clone(),
            receipts: store.clone(),
            resolutions: store.clone(),
            notifier: store.clone(),
            balance: store.clone(),
            changes: store,
        }
    }

    /// Replace the draft store (builder pattern)
    #[must_use]
    pub fn with_drafts(mut self, drafts: Arc<dyn TransactionDraftStore>) -> Self {
        self.drafts = drafts;
        self
    }

    /// Replace the nonce provider (builder pattern)
    #[must_use]
    pub fn with_nonce(mut self, nonce: Arc<dyn NonceProvider>) -> Self {
        self.nonce = nonce;
        self
    }

    /// Replace the signer (builder pattern)
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = signer;
        self
    }

    /// Replace the broadcaster (builder pattern)
    #[must_use]
    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    /// Replace the receipt store (builder pattern)
    #[must_use]
    pub fn with_receipts(mut self, receipts: Arc<dyn ReceiptStore>) -> Self {
        self.receipts = receipts;
        self
    }

    /// Replace the name resolution store (builder pattern)
    #[must_use]
    pub fn with_resolutions(mut self, resolutions: Arc<dyn NameResolutionStore>) -> Self {
        self.resolutions = resolutions;
        self
    }
}
