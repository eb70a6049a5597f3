//! Mock implementations for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::domain::{
    AppError, BroadcastStatus, Broadcaster, CollaboratorError, DraftFields, NameResolutionStore,
    NonceProvider, ReceiptStore, RequestStatus, ResolutionRecord, SignatureStatus, Signer,
    TransactionData, TransactionDraft, TransactionDraftStore,
};

/// Configuration for mock behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error_message: Option<String>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }

    fn message(&self) -> String {
        self.error_message
            .clone()
            .unwrap_or_else(|| "Mock error".to_string())
    }
}

/// Resolution store whose records are set directly by the test
#[derive(Default)]
pub struct ScriptedResolutionStore {
    records: Mutex<HashMap<String, ResolutionRecord>>,
    refreshes: Mutex<HashMap<String, u32>>,
    config: MockConfig,
}

impl ScriptedResolutionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            config: MockConfig::failure(message),
            ..Default::default()
        }
    }

    pub fn set(&self, key: &str, record: ResolutionRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(key.to_string(), record);
    }

    /// Number of forced refreshes requested for `key`
    pub fn refresh_count(&self, key: &str) -> u32 {
        self.refreshes
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl NameResolutionStore for ScriptedResolutionStore {
    fn record(&self, key: &str) -> Option<ResolutionRecord> {
        self.records.lock().unwrap().get(key).cloned()
    }

    async fn request_resolution(&self, key: &str, force_refresh: bool) -> Result<(), AppError> {
        if force_refresh {
            *self
                .refreshes
                .lock()
                .unwrap()
                .entry(key.to_string())
                .or_insert(0) += 1;
        }
        if self.config.should_fail {
            return Err(CollaboratorError::Resolution(self.config.message()).into());
        }
        Ok(())
    }
}

/// Signer that completes every request immediately, or fails
pub struct MockSigner {
    config: MockConfig,
    status: Mutex<SignatureStatus>,
    sign_calls: AtomicU32,
}

impl MockSigner {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            status: Mutex::new(SignatureStatus::default()),
            sign_calls: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    pub fn sign_calls(&self) -> u32 {
        self.sign_calls.load(Ordering::Relaxed)
    }
}

impl Default for MockSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Signer for MockSigner {
    fn signature_status(&self) -> SignatureStatus {
        *self.status.lock().unwrap()
    }

    async fn sign(&self, _draft: &TransactionDraft) -> Result<(), AppError> {
        self.sign_calls.fetch_add(1, Ordering::Relaxed);
        if self.config.should_fail {
            return Err(CollaboratorError::Signer(self.config.message()).into());
        }
        *self.status.lock().unwrap() = SignatureStatus {
            pending: false,
            signed: true,
        };
        Ok(())
    }
}

/// Broadcaster whose status is scripted by the test
pub struct MockBroadcaster {
    config: MockConfig,
    status: Mutex<Option<BroadcastStatus>>,
    broadcast_calls: AtomicU32,
}

impl MockBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            status: Mutex::new(None),
            broadcast_calls: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    pub fn set_status(&self, status: Option<BroadcastStatus>) {
        *self.status.lock().unwrap() = status;
    }

    pub fn broadcast_calls(&self) -> u32 {
        self.broadcast_calls.load(Ordering::Relaxed)
    }
}

impl Default for MockBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broadcaster for MockBroadcaster {
    fn status(&self) -> Option<BroadcastStatus> {
        self.status.lock().unwrap().clone()
    }

    async fn broadcast_signed(&self) -> Result<(), AppError> {
        self.broadcast_calls.fetch_add(1, Ordering::Relaxed);
        if self.config.should_fail {
            return Err(CollaboratorError::Broadcast(self.config.message()).into());
        }
        Ok(())
    }
}

/// Draft store holding fields in memory, or rejecting every write
#[derive(Default)]
pub struct MockDraftStore {
    config: MockConfig,
    draft: Mutex<TransactionDraft>,
}

impl MockDraftStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            config: MockConfig::failure(message),
            ..Default::default()
        }
    }
}

#[async_trait]
impl TransactionDraftStore for MockDraftStore {
    fn draft(&self) -> TransactionDraft {
        self.draft.lock().unwrap().clone()
    }

    async fn set_fields(&self, fields: DraftFields) -> Result<(), AppError> {
        if self.config.should_fail {
            return Err(CollaboratorError::Store(self.config.message()).into());
        }
        self.draft.lock().unwrap().fields = fields;
        Ok(())
    }
}

/// Nonce provider that never resolves a request on its own
#[derive(Default)]
pub struct MockNonceProvider {
    config: MockConfig,
    status: Mutex<RequestStatus>,
}

impl MockNonceProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            config: MockConfig::failure(message),
            ..Default::default()
        }
    }
}

#[async_trait]
impl NonceProvider for MockNonceProvider {
    fn nonce_status(&self) -> RequestStatus {
        *self.status.lock().unwrap()
    }

    async fn request_nonce(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            return Err(CollaboratorError::Nonce(self.config.message()).into());
        }
        *self.status.lock().unwrap() = RequestStatus::Requested;
        Ok(())
    }
}

/// Receipt store that never has data and counts fetches
#[derive(Default)]
pub struct MockReceiptStore {
    config: MockConfig,
    fetch_calls: AtomicU32,
}

impl MockReceiptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            config: MockConfig::failure(message),
            ..Default::default()
        }
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReceiptStore for MockReceiptStore {
    fn transaction_data(&self, _hash: &str) -> Option<TransactionData> {
        None
    }

    async fn fetch_receipt(&self, _hash: &str) -> Result<(), AppError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        if self.config.should_fail {
            return Err(CollaboratorError::Receipt(self.config.message()).into());
        }
        Ok(())
    }
}
