//! Application layer: field building, the lifecycle coordinator and its timers.

pub mod builder;
pub mod coordinator;
pub mod debounce;
pub mod gas;
pub mod operation;
pub mod poller;
pub mod reconciler;
pub mod state;
pub mod status;
pub mod worker;

pub use builder::{ContractRegistry, build_fields};
pub use coordinator::{
    BeginOutcome, CoordinatorConfig, CoordinatorEvent, LifecycleState, RefusalReason,
    TransactionLifecycleCoordinator,
};
pub use debounce::LookupDebouncer;
pub use gas::{insufficient_balance, transaction_cost};
pub use operation::{OperationDefinition, PurchaseSubdomain, SetReverseName, definition_for};
pub use poller::ConfirmationPoller;
pub use reconciler::{NameResolutionReconciler, ReconcileOutcome, ReconcilerConfig};
pub use state::Collaborators;
pub use status::{
    DomainAvailability, PublicNameStatus, PurchaseContext, PurchaseStatus, SubdomainInput,
    public_name_status, purchase_disabled, purchase_status,
};
pub use worker::{CoordinatorHandle, spawn_coordinator};
