//! Transaction lifecycle coordinator.
//!
//! Drives one operation at a time from field preparation to receipt
//! confirmation as an explicit phase machine. All reactions are triggered by
//! [`CoordinatorEvent`]s and re-read the externally owned state through the
//! collaborator ports; nothing the coordinator wrote earlier is trusted.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::gas::insufficient_balance;
use crate::app::operation::OperationDefinition;
use crate::app::poller::{ConfirmationPoller, DEFAULT_RECEIPT_POLL_INTERVAL};
use crate::app::reconciler::{NameResolutionReconciler, ReconcileOutcome, ReconcilerConfig};
use crate::app::state::Collaborators;
use crate::domain::{
    AppError, BroadcastStatus, CollaboratorError, NotificationKind, OperationRequest, Phase,
    RequestStatus, TransactionFields, ValidationError,
};

/// Shown instead of the confirmation prompt when the draft's transaction is already out
pub const DOUBLE_BROADCAST_WARNING: &str =
    "The current transaction is already broadcasting or has been successfully broadcasted";

/// Upper bound on transitions taken while handling a single event
const MAX_STEPS_PER_EVENT: usize = 8;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Delay between receipt fetches
    pub receipt_poll_interval: Duration,
    /// Give up on the receipt after this many fetches. `None` polls forever.
    pub max_receipt_polls: Option<u32>,
    /// How long the confirmation notification stays up
    pub success_notification_duration: Duration,
    pub reconciler: ReconcilerConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            max_receipt_polls: None,
            success_notification_duration: Duration::from_secs(10),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let receipt_poll_interval = env::var("RECEIPT_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.receipt_poll_interval);

        let max_receipt_polls = env::var("MAX_RECEIPT_POLLS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| *n > 0);

        let success_notification_duration = env::var("SUCCESS_NOTIFICATION_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.success_notification_duration);

        Self {
            receipt_poll_interval,
            max_receipt_polls,
            success_notification_duration,
            reconciler: ReconcilerConfig::from_env(),
        }
    }
}

// ============================================================================
// EVENTS AND OUTCOMES
// ============================================================================

/// Inputs the coordinator reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// Some externally owned state changed
    StoreChanged,
    /// The receipt poll timer armed for `attempt` expired
    PollDue { attempt: Uuid },
    /// The user accepted the confirmation prompt
    UserConfirmed,
    /// The user dismissed the confirmation prompt
    UserDismissed,
}

/// Why a begin request was turned down before anything was written
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefusalReason {
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("Insufficient funds for gas and value")]
    InsufficientFunds,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result of [`TransactionLifecycleCoordinator::begin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// Fields were pushed and the lifecycle is armed
    Started { attempt: Uuid },
    /// A gas estimate is in flight; the lifecycle starts once it settles
    Deferred,
    /// A lifecycle is already armed or deferred
    Ignored,
    Refused(RefusalReason),
}

// ============================================================================
// LIFECYCLE STATE
// ============================================================================

/// Observable state of the current (or last) attempt
#[derive(Debug, Clone, Default)]
pub struct LifecycleState {
    pub phase: Phase,
    pub attempt: Option<Uuid>,
    pub request: Option<OperationRequest>,
    /// Request waiting for a gas estimate to settle
    pub deferred: Option<OperationRequest>,
    pub broadcasted_hash: Option<String>,
    pub poll_armed: bool,
    /// Whether the confirmation prompt is on screen
    pub prompt_open: bool,
    pub receipt_polls: u32,
    pub broadcast_requested: bool,
}

impl LifecycleState {
    /// True while a lifecycle holds the operation slot
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.phase.is_armed() || self.deferred.is_some()
    }
}

// ============================================================================
// COORDINATOR
// ============================================================================

pub struct TransactionLifecycleCoordinator {
    definition: Arc<dyn OperationDefinition>,
    collaborators: Collaborators,
    config: CoordinatorConfig,
    state: LifecycleState,
    /// Auto gas-limit setting to put back once the prompt closes
    prior_auto_gas_limit: Option<bool>,
    /// Broadcast status seen at the end of the previous event
    last_broadcast: Option<BroadcastStatus>,
    poller: ConfirmationPoller,
    reconciler: Arc<NameResolutionReconciler>,
    reconciliation: Option<JoinHandle<ReconcileOutcome>>,
}

impl TransactionLifecycleCoordinator {
    /// Create a coordinator. Timer ticks are posted to `events`.
    #[must_use]
    pub fn new(
        definition: Arc<dyn OperationDefinition>,
        collaborators: Collaborators,
        config: CoordinatorConfig,
        events: mpsc::UnboundedSender<CoordinatorEvent>,
    ) -> Self {
        let poller = ConfirmationPoller::new(config.receipt_poll_interval, events);
        let reconciler = Arc::new(NameResolutionReconciler::new(
            Arc::clone(&collaborators.resolutions),
            config.reconciler.clone(),
        ));
        Self {
            definition,
            collaborators,
            config,
            state: LifecycleState::default(),
            prior_auto_gas_limit: None,
            last_broadcast: None,
            poller,
            reconciler,
            reconciliation: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Handle of the reconciler spawned by the last completed attempt
    pub fn take_reconciliation(&mut self) -> Option<JoinHandle<ReconcileOutcome>> {
        self.reconciliation.take()
    }

    /// Start a lifecycle for `request`.
    ///
    /// Refusals happen before any field is written. A request arriving while
    /// another lifecycle is armed is ignored.
    #[instrument(skip(self, request), fields(kind = %request.kind, network = %request.network))]
    pub async fn begin(&mut self, request: OperationRequest) -> BeginOutcome {
        if self.state.is_armed() {
            debug!(phase = %self.state.phase, "Lifecycle already armed, ignoring begin");
            return BeginOutcome::Ignored;
        }

        if let Err(reason) = self.preflight(&request) {
            warn!(reason = %reason, "Refusing operation");
            return BeginOutcome::Refused(reason);
        }

        let gas = &self.collaborators.gas;
        if gas.auto_gas_limit() {
            gas.set_auto_gas_limit(false);
            self.prior_auto_gas_limit = Some(true);
        }

        if gas.estimation_status() == RequestStatus::Requested {
            info!("Gas estimate in flight, deferring operation");
            self.state.deferred = Some(request);
            return BeginOutcome::Deferred;
        }

        let outcome = self.start(request).await;
        self.advance().await;
        outcome
    }

    /// React to one event
    pub async fn handle(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::StoreChanged => self.advance().await,
            CoordinatorEvent::PollDue { attempt } => self.on_poll_due(attempt).await,
            CoordinatorEvent::UserConfirmed => self.on_confirmed().await,
            CoordinatorEvent::UserDismissed => self.on_dismissed(),
        }
    }

    fn preflight(&self, request: &OperationRequest) -> Result<TransactionFields, RefusalReason> {
        request
            .validate()
            .map_err(|e| RefusalReason::InvalidRequest(ValidationError::from(e).to_string()))?;

        if request.kind != self.definition.kind() {
            return Err(RefusalReason::InvalidRequest(format!(
                "coordinator handles {}, got {}",
                self.definition.kind(),
                request.kind
            )));
        }

        if !self.definition.is_supported(request) {
            return Err(RefusalReason::UnsupportedNetwork(request.network.id.clone()));
        }

        let estimates = self.collaborators.gas.estimates();
        let fields = self
            .definition
            .build_fields(request, estimates.as_ref())
            .map_err(|e| match e {
                AppError::Config(e) => RefusalReason::UnsupportedNetwork(e.to_string()),
                other => RefusalReason::InvalidRequest(other.to_string()),
            })?;

        if insufficient_balance(
            fields.gas_price,
            fields.gas_limit,
            fields.value,
            self.collaborators.balance.balance(),
        ) {
            return Err(RefusalReason::InsufficientFunds);
        }

        Ok(fields)
    }

    /// Idle -> AwaitingFields: push the fields and make sure a nonce is coming
    async fn start(&mut self, request: OperationRequest) -> BeginOutcome {
        let fields = match self.preflight(&request) {
            Ok(fields) => fields,
            Err(reason) => {
                warn!(reason = %reason, "Refusing deferred operation");
                self.restore_auto_gas_limit();
                return BeginOutcome::Refused(reason);
            }
        };

        let attempt = Uuid::new_v4();
        self.poller.reset();
        self.state = LifecycleState {
            phase: Phase::AwaitingFields,
            attempt: Some(attempt),
            request: Some(request),
            ..Default::default()
        };
        self.last_broadcast = self.collaborators.broadcaster.status();
        info!(%attempt, to = %fields.to, "🚀 Operation started, pushing transaction fields");

        if let Err(e) = self
            .collaborators
            .drafts
            .set_fields(fields.to_draft_fields())
            .await
        {
            self.fail(&e);
            return BeginOutcome::Started { attempt };
        }

        let nonce = self.collaborators.nonce.nonce_status();
        if !matches!(nonce, RequestStatus::Succeeded | RequestStatus::Requested) {
            debug!(status = %nonce.as_str(), "Requesting nonce");
            if let Err(e) = self.collaborators.nonce.request_nonce().await {
                self.fail(&e);
            }
        }

        BeginOutcome::Started { attempt }
    }

    /// Apply every transition the current external state allows
    async fn advance(&mut self) {
        for _ in 0..MAX_STEPS_PER_EVENT {
            let before = self.state.phase;
            self.step().await;
            if self.state.phase == before {
                break;
            }
        }
        if self.state.phase.is_armed() {
            self.last_broadcast = self.collaborators.broadcaster.status();
        }
    }

    async fn step(&mut self) {
        match self.state.phase {
            Phase::Idle => {
                let settled =
                    self.collaborators.gas.estimation_status() != RequestStatus::Requested;
                if settled && let Some(request) = self.state.deferred.take() {
                    info!("Gas estimate settled, starting deferred operation");
                    self.start(request).await;
                }
            }
            Phase::AwaitingFields => {
                if self.signature_gate_open() {
                    self.request_signature().await;
                }
            }
            Phase::AwaitingSignature => {
                let signature = self.collaborators.signer.signature_status();
                if signature.signed && !signature.pending {
                    info!("Transaction signed, awaiting user confirmation");
                    self.state.phase = Phase::AwaitingBroadcast;
                }
            }
            Phase::AwaitingBroadcast => {
                let current = self.collaborators.broadcaster.status();
                let hash = current
                    .as_ref()
                    .and_then(BroadcastStatus::successful_hash)
                    .map(str::to_string);
                if let Some(hash) = hash {
                    if !self.state.poll_armed {
                        self.await_receipt(hash);
                    }
                } else if broadcast_failed(self.last_broadcast.as_ref(), current.as_ref()) {
                    self.fail(&AppError::Collaborator(CollaboratorError::Broadcast(
                        "broadcast stopped without success".to_string(),
                    )));
                }
            }
            Phase::AwaitingReceipt => self.check_receipt().await,
            Phase::Complete | Phase::Failed => {}
        }
    }

    /// Draft equals the recomputed fields, nonce known, nothing signed or in flight
    fn signature_gate_open(&self) -> bool {
        let Some(request) = self.state.request.as_ref() else {
            return false;
        };
        let gas = &self.collaborators.gas;
        if gas.estimation_status() == RequestStatus::Requested {
            return false;
        }
        if self.collaborators.nonce.nonce_status() != RequestStatus::Succeeded {
            return false;
        }
        let signature = self.collaborators.signer.signature_status();
        if signature.pending || signature.signed {
            return false;
        }

        let estimates = gas.estimates();
        let Ok(expected) = self.definition.build_fields(request, estimates.as_ref()) else {
            return false;
        };
        expected.matches_draft(&self.collaborators.drafts.draft().fields)
    }

    /// AwaitingFields -> AwaitingSignature, unless the draft's transaction is already out
    async fn request_signature(&mut self) {
        let busy = self
            .collaborators
            .broadcaster
            .status()
            .is_some_and(|s| s.is_busy());
        if busy {
            warn!("Draft transaction already broadcast, abandoning attempt");
            self.collaborators
                .notifier
                .show(NotificationKind::Warning, DOUBLE_BROADCAST_WARNING, None);
            self.abandon();
            return;
        }

        let draft = self.collaborators.drafts.draft();
        if let Err(e) = self.collaborators.signer.sign(&draft).await {
            self.fail(&e);
            return;
        }
        self.state.phase = Phase::AwaitingSignature;
        self.state.prompt_open = true;
        debug!("Signature requested, confirmation prompt open");
    }

    /// AwaitingBroadcast -> AwaitingReceipt
    fn await_receipt(&mut self, hash: String) {
        info!(hash = %hash, "📡 Transaction broadcast, polling for receipt");
        if let Some(attempt) = self.state.attempt {
            self.poller.schedule(attempt, &hash);
        }
        self.state.broadcasted_hash = Some(hash);
        self.state.poll_armed = true;
        self.state.phase = Phase::AwaitingReceipt;
        self.close_prompt(false);
    }

    async fn check_receipt(&mut self) {
        let (Some(attempt), Some(hash)) = (self.state.attempt, self.state.broadcasted_hash.clone())
        else {
            return;
        };

        let confirmed = self
            .collaborators
            .receipts
            .transaction_data(&hash)
            .and_then(|data| data.receipt)
            .is_some_and(|receipt| receipt.is_success());

        if confirmed {
            self.complete(&hash).await;
        } else if !self.poller.is_pending_for(attempt) {
            self.poller.schedule(attempt, &hash);
        }
    }

    async fn on_poll_due(&mut self, attempt: Uuid) {
        self.poller.fired(attempt);
        if self.state.attempt != Some(attempt) || self.state.phase != Phase::AwaitingReceipt {
            debug!(%attempt, "Stale receipt poll, ignoring");
            return;
        }
        let Some(hash) = self.state.broadcasted_hash.clone() else {
            return;
        };

        if let Some(max) = self.config.max_receipt_polls
            && self.state.receipt_polls >= max
        {
            self.fail(&AppError::Collaborator(CollaboratorError::Receipt(format!(
                "no receipt after {} polls",
                max
            ))));
            return;
        }

        self.state.receipt_polls += 1;
        debug!(hash = %hash, polls = self.state.receipt_polls, "Fetching receipt");
        if let Err(e) = self.collaborators.receipts.fetch_receipt(&hash).await {
            warn!(hash = %hash, error = ?e, "Receipt fetch failed, will retry");
            self.poller.schedule(attempt, &hash);
        }
    }

    async fn on_confirmed(&mut self) {
        if self.state.phase != Phase::AwaitingBroadcast || self.state.broadcast_requested {
            debug!(phase = %self.state.phase, "Confirmation ignored");
            return;
        }
        self.state.broadcast_requested = true;
        info!("User confirmed, broadcasting signed transaction");
        if let Err(e) = self.collaborators.broadcaster.broadcast_signed().await {
            self.fail(&e);
            return;
        }
        // A rejection may land before the next store change is delivered.
        self.last_broadcast = self.collaborators.broadcaster.status();
    }

    fn on_dismissed(&mut self) {
        if !self.state.is_armed() {
            return;
        }
        info!(phase = %self.state.phase, "Prompt dismissed by user");
        self.close_prompt(true);
        self.abandon();
    }

    /// AwaitingReceipt -> Complete
    async fn complete(&mut self, hash: &str) {
        let Some(request) = self.state.request.clone() else {
            return;
        };
        info!(hash = %hash, "✅ Transaction confirmed");

        let notifier = &self.collaborators.notifier;
        if let Some(pending) = notifier
            .notifications()
            .into_iter()
            .find(|n| n.tx_hash.as_deref() == Some(hash))
        {
            notifier.close(pending.handle);
        }
        notifier.show(
            NotificationKind::Success,
            &self.definition.confirmed_message(&request),
            Some(self.config.success_notification_duration),
        );

        self.state.phase = Phase::Complete;
        self.state.poll_armed = false;

        if let Err(e) = self.collaborators.balance.refresh().await {
            warn!(error = ?e, "Balance refresh failed");
        }

        let target = self.definition.resolution_target(&request);
        self.reconciliation = Some(Arc::clone(&self.reconciler).spawn(target));
    }

    /// Close the prompt. A close not initiated by the user keeps the attempt alive.
    fn close_prompt(&mut self, by_user: bool) {
        if self.state.prompt_open {
            debug!(by_user, "Closing confirmation prompt");
        }
        self.state.prompt_open = false;
        self.restore_auto_gas_limit();
    }

    fn restore_auto_gas_limit(&mut self) {
        if let Some(prior) = self.prior_auto_gas_limit.take()
            && prior != self.collaborators.gas.auto_gas_limit()
        {
            self.collaborators.gas.set_auto_gas_limit(prior);
        }
    }

    /// Drop the attempt without a terminal notification
    fn abandon(&mut self) {
        self.restore_auto_gas_limit();
        self.state = LifecycleState::default();
    }

    fn fail(&mut self, error: &AppError) {
        warn!(attempt = ?self.state.attempt, phase = %self.state.phase, error = %error, "❌ Operation failed");
        self.state.prompt_open = false;
        self.state.poll_armed = false;
        self.state.phase = Phase::Failed;
        self.restore_auto_gas_limit();
    }
}

/// Broadcasting stopped without success since the last observation
fn broadcast_failed(previous: Option<&BroadcastStatus>, current: Option<&BroadcastStatus>) -> bool {
    match (previous, current) {
        (Some(prev), Some(cur)) => {
            prev.is_broadcasting
                && !prev.broadcast_successful
                && !cur.is_broadcasting
                && !cur.broadcast_successful
        }
        _ => false,
    }
}
