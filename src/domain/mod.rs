//! Domain layer containing core types, collaborator traits, and error definitions.

pub mod ens;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{AppError, BuilderError, CollaboratorError, ConfigError, ValidationError};
pub use traits::{
    BalanceRefresher, Broadcaster, GasEstimateProvider, NameResolutionStore, NonceProvider,
    Notifier, ReceiptStore, Signer, StateChanges, TransactionDraftStore,
};
pub use types::{
    BroadcastStatus, DraftFields, GasEstimates, NetworkConfig, Notification, NotificationHandle,
    NotificationKind, OperationKind, OperationRequest, Phase, RequestStatus, ResolutionData,
    ResolutionRecord, ResolutionState, ResolutionTarget, SignatureStatus, TransactionData,
    TransactionDraft, TransactionFields, TransactionReceipt,
};
