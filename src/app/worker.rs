//! Background task owning a coordinator.
//!
//! All reactions of one coordinator are serialized on a single tokio task fed
//! by store revisions, internal timer ticks and user commands.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::coordinator::{
    BeginOutcome, CoordinatorConfig, CoordinatorEvent, LifecycleState,
    TransactionLifecycleCoordinator,
};
use crate::app::operation::OperationDefinition;
use crate::app::reconciler::ReconcileOutcome;
use crate::app::state::Collaborators;
use crate::domain::{AppError, CollaboratorError, OperationRequest, Phase};

/// Capacity of the user command queue
const COMMAND_BUFFER: usize = 32;

enum Command {
    Begin {
        request: OperationRequest,
        reply: oneshot::Sender<BeginOutcome>,
    },
    Confirm,
    Dismiss,
    TakeReconciliation {
        reply: oneshot::Sender<Option<JoinHandle<ReconcileOutcome>>>,
    },
}

/// Cloneable handle for driving a spawned coordinator
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<LifecycleState>,
}

impl CoordinatorHandle {
    /// Request a new lifecycle
    pub async fn begin(&self, request: OperationRequest) -> Result<BeginOutcome, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Begin { request, reply }).await?;
        rx.await.map_err(|_| closed())
    }

    /// The user accepted the confirmation prompt
    pub async fn confirm(&self) -> Result<(), AppError> {
        self.send(Command::Confirm).await
    }

    /// The user dismissed the confirmation prompt
    pub async fn dismiss(&self) -> Result<(), AppError> {
        self.send(Command::Dismiss).await
    }

    /// Handle of the reconciler started by the last completed attempt
    pub async fn take_reconciliation(
        &self,
    ) -> Result<Option<JoinHandle<ReconcileOutcome>>, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::TakeReconciliation { reply }).await?;
        rx.await.map_err(|_| closed())
    }

    /// Latest published lifecycle state
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.clone()
    }

    /// Wait until the published phase is `phase`
    pub async fn wait_for_phase(&self, phase: Phase) -> Result<LifecycleState, AppError> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(|s| s.phase == phase)
            .await
            .map_err(|_| closed())?;
        Ok(state.clone())
    }

    async fn send(&self, command: Command) -> Result<(), AppError> {
        self.commands.send(command).await.map_err(|_| closed())
    }
}

fn closed() -> AppError {
    CollaboratorError::ChannelClosed("coordinator worker stopped".to_string()).into()
}

/// Spawn a coordinator for `definition` on its own task.
///
/// Returns the command handle, the task handle and a shutdown sender.
pub fn spawn_coordinator(
    definition: Arc<dyn OperationDefinition>,
    collaborators: Collaborators,
    config: CoordinatorConfig,
) -> (CoordinatorHandle, JoinHandle<()>, watch::Sender<bool>) {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let (command_tx, mut command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(LifecycleState::default());

    let mut revisions = collaborators.changes.subscribe();
    let kind = definition.kind();
    let mut coordinator =
        TransactionLifecycleCoordinator::new(definition, collaborators, config, event_tx);

    let handle = tokio::spawn(async move {
        info!(kind = %kind, "Coordinator worker started");

        loop {
            tokio::select! {
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(kind = %kind, "Coordinator worker shutting down");
                        break;
                    }
                }
                Some(command) = command_rx.recv() => match command {
                    Command::Begin { request, reply } => {
                        let outcome = coordinator.begin(request).await;
                        let _ = reply.send(outcome);
                    }
                    Command::Confirm => coordinator.handle(CoordinatorEvent::UserConfirmed).await,
                    Command::Dismiss => coordinator.handle(CoordinatorEvent::UserDismissed).await,
                    Command::TakeReconciliation { reply } => {
                        let _ = reply.send(coordinator.take_reconciliation());
                    }
                },
                Some(event) = event_rx.recv() => coordinator.handle(event).await,
                changed = revisions.changed() => {
                    if changed.is_err() {
                        warn!(kind = %kind, "State change source dropped, stopping worker");
                        break;
                    }
                    coordinator.handle(CoordinatorEvent::StoreChanged).await;
                }
            }

            state_tx.send_if_modified(|published| {
                let current = coordinator.state();
                let modified = published.phase != current.phase
                    || published.attempt != current.attempt
                    || published.poll_armed != current.poll_armed
                    || published.prompt_open != current.prompt_open
                    || published.deferred.is_some() != current.deferred.is_some()
                    || published.receipt_polls != current.receipt_polls;
                if modified {
                    debug!(phase = %current.phase, "Lifecycle state published");
                    *published = current.clone();
                }
                modified
            });
        }
    });

    let handle_out = CoordinatorHandle {
        commands: command_tx,
        state: state_rx,
    };
    (handle_out, handle, shutdown_tx)
}
