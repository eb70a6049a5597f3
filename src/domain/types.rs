//! Domain types with validation support.

use alloy_primitives::{Address, Bytes, U256, hex};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

// ============================================================================
// NETWORK
// ============================================================================

/// Chain ID of Ethereum mainnet
pub const MAINNET_CHAIN_ID: u64 = 1;

/// Chain ID of the Ropsten test network
pub const ROPSTEN_CHAIN_ID: u64 = 3;

/// Network the wallet is currently connected to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Short network identifier, e.g. "ETH" or "Ropsten"
    pub id: String,
    pub chain_id: u64,
    pub is_testnet: bool,
}

impl NetworkConfig {
    #[must_use]
    pub fn new(id: impl Into<String>, chain_id: u64, is_testnet: bool) -> Self {
        Self {
            id: id.into(),
            chain_id,
            is_testnet,
        }
    }

    #[must_use]
    pub fn mainnet() -> Self {
        Self::new("ETH", MAINNET_CHAIN_ID, false)
    }

    #[must_use]
    pub fn ropsten() -> Self {
        Self::new("Ropsten", ROPSTEN_CHAIN_ID, true)
    }
}

impl std::fmt::Display for NetworkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (chain {})", self.id, self.chain_id)
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// On-chain write operations driven through the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Set the reverse-resolution ("public") name of an address
    SetReverseName,
    /// Purchase a subdomain of the hosted registrar domain
    PurchaseSubdomain,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetReverseName => "set_reverse_name",
            Self::PurchaseSubdomain => "purchase_subdomain",
        }
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set_reverse_name" => Ok(Self::SetReverseName),
            "purchase_subdomain" => Ok(Self::PurchaseSubdomain),
            _ => Err(format!("Invalid operation kind: {}", s)),
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input to begin a lifecycle. Immutable once the lifecycle starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct OperationRequest {
    pub kind: OperationKind,
    /// Address whose name is being set, or the owner of the purchased subdomain
    pub target_address: Address,
    /// Public name for reverse records, subdomain label for purchases
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub payload_name: String,
    pub network: NetworkConfig,
}

impl OperationRequest {
    #[must_use]
    pub fn new(
        kind: OperationKind,
        target_address: Address,
        payload_name: impl Into<String>,
        network: NetworkConfig,
    ) -> Self {
        Self {
            kind,
            target_address,
            payload_name: payload_name.into(),
            network,
        }
    }
}

// ============================================================================
// EXTERNAL REQUEST STATUS
// ============================================================================

/// Status of an asynchronous external request (nonce, gas estimate)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    None,
    Requested,
    Succeeded,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Requested => "requested",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Network gas price estimates, denominated in gwei
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasEstimates {
    pub fast: f64,
}

// ============================================================================
// TRANSACTION FIELDS AND DRAFT
// ============================================================================

/// The five canonical fields of a transaction, as computed by the builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFields {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_price: U256,
    pub gas_limit: U256,
}

impl TransactionFields {
    /// Encode the fields the way the shared draft stores them.
    #[must_use]
    pub fn to_draft_fields(&self) -> DraftFields {
        DraftFields {
            to: Some(self.to.to_checksum(None)),
            value: Some(format!("0x{:x}", self.value)),
            data: Some(hex::encode_prefixed(&self.data)),
            gas_price: Some(clean_hex(self.gas_price)),
            gas_limit: Some(clean_hex(self.gas_limit)),
        }
    }

    /// Returns true if every field of `draft` equals this freshly computed value.
    #[must_use]
    pub fn matches_draft(&self, draft: &DraftFields) -> bool {
        let (Some(to), Some(value), Some(data), Some(gas_price), Some(gas_limit)) = (
            draft.to.as_deref(),
            draft.value.as_deref(),
            draft.data.as_deref(),
            draft.gas_price.as_deref(),
            draft.gas_limit.as_deref(),
        ) else {
            return false;
        };

        let to_matches = to.parse::<Address>().is_ok_and(|addr| addr == self.to);
        let data_matches = data.eq_ignore_ascii_case(&hex::encode_prefixed(&self.data));

        to_matches
            && data_matches
            && legacy_value_matches(value, &clean_hex(self.value))
            && gas_price.eq_ignore_ascii_case(&clean_hex(self.gas_price))
            && gas_limit.eq_ignore_ascii_case(&clean_hex(self.gas_limit))
    }
}

/// Minimal `0x`-prefixed hex with leading zeros stripped. Zero encodes as `0x`.
#[must_use]
pub fn clean_hex(value: U256) -> String {
    if value.is_zero() {
        "0x".to_string()
    } else {
        format!("0x{:x}", value)
    }
}

/// Legacy compatibility shim for the draft's `value` field.
///
/// Upstream encoders disagree on nibble padding, so a stored value is accepted
/// when it equals the expected string, the expected string with its last
/// nibble dropped, or the expected string with one `0` nibble appended.
#[must_use]
pub fn legacy_value_matches(stored: &str, expected: &str) -> bool {
    let stored = stored.to_ascii_lowercase();
    let expected = expected.to_ascii_lowercase();
    if stored == expected {
        return true;
    }
    let truncated = expected
        .char_indices()
        .last()
        .map(|(idx, _)| &expected[..idx])
        .unwrap_or_default();
    stored == truncated || stored == format!("{}0", expected)
}

/// Transaction fields as held by the shared draft (hex strings, possibly unset)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftFields {
    pub to: Option<String>,
    pub value: Option<String>,
    pub data: Option<String>,
    pub gas_price: Option<String>,
    pub gas_limit: Option<String>,
}

impl DraftFields {
    /// True when all five fields are set
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.to.is_some()
            && self.value.is_some()
            && self.data.is_some()
            && self.gas_price.is_some()
            && self.gas_limit.is_some()
    }
}

/// Snapshot of the process-wide transaction draft
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub fields: DraftFields,
    pub nonce_status: RequestStatus,
}

/// Signer flags observed after a sign request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureStatus {
    pub pending: bool,
    pub signed: bool,
}

/// Broadcast status of the current transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastStatus {
    pub is_broadcasting: bool,
    pub broadcast_successful: bool,
    pub broadcasted_hash: Option<String>,
}

impl BroadcastStatus {
    /// Broadcast succeeded and reported a non-empty hash
    #[must_use]
    pub fn successful_hash(&self) -> Option<&str> {
        if !self.broadcast_successful {
            return None;
        }
        self.broadcasted_hash.as_deref().filter(|h| !h.is_empty())
    }

    /// In flight or already accepted by the network
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.is_broadcasting || self.broadcast_successful
    }
}

/// Receipt status code reported for a transaction that executed successfully
pub const RECEIPT_STATUS_SUCCESS: u8 = 1;

/// Post-inclusion record of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub status: u8,
    pub block_number: Option<u64>,
}

impl TransactionReceipt {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == RECEIPT_STATUS_SUCCESS
    }
}

/// Data fetched for a transaction hash
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    pub receipt: Option<TransactionReceipt>,
}

// ============================================================================
// NAME RESOLUTION
// ============================================================================

/// State of a name resolution request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    #[default]
    Pending,
    Success,
    Failed,
}

/// Resolved name data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionData {
    pub name: String,
    pub owner_address: Address,
}

/// Name resolution record, keyed externally by the resolved key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub state: ResolutionState,
    pub data: Option<ResolutionData>,
}

impl ResolutionRecord {
    #[must_use]
    pub fn success(data: ResolutionData) -> Self {
        Self {
            state: ResolutionState::Success,
            data: Some(data),
        }
    }

    #[must_use]
    pub fn pending() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failed() -> Self {
        Self {
            state: ResolutionState::Failed,
            data: None,
        }
    }

    /// Successful and carrying data
    #[must_use]
    pub fn resolved_data(&self) -> Option<&ResolutionData> {
        match self.state {
            ResolutionState::Success => self.data.as_ref(),
            ResolutionState::Pending | ResolutionState::Failed => None,
        }
    }
}

/// What the resolver should report once an operation has taken effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionTarget {
    /// Key into the resolution store (address for reverse records, domain otherwise)
    pub key: String,
    pub expected: ResolutionData,
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Danger,
}

/// Opaque handle to a shown notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationHandle(pub Uuid);

impl NotificationHandle {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NotificationHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A notification currently in the shared notification list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub handle: NotificationHandle,
    pub kind: NotificationKind,
    pub message: String,
    pub duration: Option<Duration>,
    /// Set on "transaction broadcasted" notifications
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// LIFECYCLE PHASE
// ============================================================================

/// Phase of one operation lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    AwaitingFields,
    AwaitingSignature,
    AwaitingBroadcast,
    AwaitingReceipt,
    Complete,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingFields => "awaiting_fields",
            Self::AwaitingSignature => "awaiting_signature",
            Self::AwaitingBroadcast => "awaiting_broadcast",
            Self::AwaitingReceipt => "awaiting_receipt",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// A lifecycle in this phase holds the operation slot
    #[must_use]
    pub fn is_armed(&self) -> bool {
        match self {
            Self::Idle | Self::Complete | Self::Failed => false,
            Self::AwaitingFields
            | Self::AwaitingSignature
            | Self::AwaitingBroadcast
            | Self::AwaitingReceipt => true,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
