//! End-to-end lifecycle tests: a spawned coordinator worker driving the
//! in-memory wallet while the simulator completes its requests.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256, address};
use tokio_test::assert_ok;

use ens_lifecycle_coordinator::app::builder::MAINNET_REVERSE_REGISTRAR;
use ens_lifecycle_coordinator::app::{
    BeginOutcome, Collaborators, ContractRegistry, CoordinatorConfig, CoordinatorHandle,
    OperationDefinition, RefusalReason, definition_for, spawn_coordinator,
};
use ens_lifecycle_coordinator::domain::types::ROPSTEN_CHAIN_ID;
use ens_lifecycle_coordinator::domain::{
    NetworkConfig, NotificationKind, OperationKind, OperationRequest, Phase, ResolutionData,
    ResolutionRecord,
};
use ens_lifecycle_coordinator::infra::{
    InMemoryWalletStore, SimulatorConfig, WalletCommand, WalletSimulator,
};
use ens_lifecycle_coordinator::test_utils::MockSigner;

const ALICE: Address = address!("0x00000000000000000000000000000000000000aa");
const REGISTRAR: Address = address!("0x0000000000000000000000000000000000000f00");

fn one_eth() -> U256 {
    U256::from(10u64).pow(U256::from(18u64))
}

fn fast_simulator() -> SimulatorConfig {
    SimulatorConfig {
        nonce_latency: Duration::from_millis(20),
        signature_latency: Duration::from_millis(50),
        broadcast_latency: Duration::from_millis(80),
        pending_receipt_fetches: 1,
        resolution_latency: Duration::from_millis(500),
        fail_broadcasts: false,
    }
}

fn funded_store() -> Arc<InMemoryWalletStore> {
    let store = Arc::new(InMemoryWalletStore::new());
    store.set_balance(Some(one_eth()));
    store.configure_auto_gas_limit(true);
    store
}

fn reverse_request() -> OperationRequest {
    OperationRequest::new(
        OperationKind::SetReverseName,
        ALICE,
        "alice",
        NetworkConfig::mainnet(),
    )
}

struct Running {
    store: Arc<InMemoryWalletStore>,
    coordinator: CoordinatorHandle,
    definition: Arc<dyn OperationDefinition>,
}

/// Spawn the simulator and a coordinator for `kind` over `store`
fn run(
    store: Arc<InMemoryWalletStore>,
    kind: OperationKind,
    registry: ContractRegistry,
    simulator: SimulatorConfig,
    request: &OperationRequest,
) -> Running {
    let definition = definition_for(kind, Arc::new(registry));
    let (_sim, _sim_shutdown) = WalletSimulator::new(Arc::clone(&store), simulator)
        .with_resolution_on_mine(definition.resolution_target(request))
        .spawn();
    let (coordinator, _worker, _shutdown) = spawn_coordinator(
        Arc::clone(&definition),
        Collaborators::from_store(Arc::clone(&store)),
        CoordinatorConfig::default(),
    );
    Running {
        store,
        coordinator,
        definition,
    }
}

#[tokio::test(start_paused = true)]
async fn test_set_reverse_name_end_to_end() {
    let request = reverse_request();
    let r = run(
        funded_store(),
        OperationKind::SetReverseName,
        ContractRegistry::default(),
        fast_simulator(),
        &request,
    );

    let outcome = assert_ok!(r.coordinator.begin(request.clone()).await);
    assert!(matches!(outcome, BeginOutcome::Started { .. }));
    assert!(!r.store.auto_gas_limit_enabled());

    let state = assert_ok!(r.coordinator.wait_for_phase(Phase::AwaitingBroadcast).await);
    assert!(state.prompt_open);

    let draft = r.store.draft_snapshot();
    assert_eq!(
        draft.fields.to.as_deref(),
        Some(MAINNET_REVERSE_REGISTRAR.to_checksum(None).as_str())
    );
    assert_eq!(draft.fields.value.as_deref(), Some("0x0"));

    assert_ok!(r.coordinator.confirm().await);
    let state = assert_ok!(r.coordinator.wait_for_phase(Phase::Complete).await);
    assert!(state.broadcasted_hash.is_some());
    assert!(!state.poll_armed);
    assert!(state.receipt_polls >= 2);

    assert_eq!(r.store.count_issued(|c| matches!(c, WalletCommand::Sign(_))), 1);
    assert_eq!(
        r.store.count_issued(|c| matches!(c, WalletCommand::BroadcastSigned)),
        1
    );
    assert_eq!(
        r.store.count_issued(|c| matches!(c, WalletCommand::RefreshBalance)),
        1
    );
    assert!(r.store.auto_gas_limit_enabled());

    let notifications = r.store.notifications_snapshot();
    assert!(notifications.iter().all(|n| n.tx_hash.is_none()));
    assert!(
        notifications
            .iter()
            .any(|n| n.kind == NotificationKind::Success && n.message.contains("alice"))
    );

    let reconciliation = assert_ok!(r.coordinator.take_reconciliation().await)
        .expect("completion starts the reconciler");
    let outcome = assert_ok!(reconciliation.await);
    assert!(outcome.converged());
    assert!(outcome.reschedules() > 0);
}

#[tokio::test(start_paused = true)]
async fn test_dismissal_mid_signature_restores_auto_gas() {
    let request = reverse_request();
    let simulator = SimulatorConfig {
        signature_latency: Duration::from_secs(3_600),
        ..fast_simulator()
    };
    let r = run(
        funded_store(),
        OperationKind::SetReverseName,
        ContractRegistry::default(),
        simulator,
        &request,
    );

    assert_ok!(r.coordinator.begin(request).await);
    let state = assert_ok!(r.coordinator.wait_for_phase(Phase::AwaitingSignature).await);
    assert!(state.prompt_open);
    assert!(!r.store.auto_gas_limit_enabled());

    assert_ok!(r.coordinator.dismiss().await);
    let state = assert_ok!(r.coordinator.wait_for_phase(Phase::Idle).await);
    assert!(!state.is_armed());
    assert!(!state.prompt_open);
    assert!(r.store.auto_gas_limit_enabled());

    // The late signature must not revive the dismissed attempt.
    tokio::time::sleep(Duration::from_secs(7_200)).await;
    assert_eq!(r.coordinator.state().phase, Phase::Idle);
    assert_eq!(
        r.store.count_issued(|c| matches!(c, WalletCommand::BroadcastSigned)),
        0
    );
    assert_eq!(
        r.store.count_issued(|c| matches!(c, WalletCommand::FetchReceipt(_))),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_already_resolved_name_converges_without_reschedule() {
    let request = reverse_request();
    let store = funded_store();
    let definition = definition_for(
        OperationKind::SetReverseName,
        Arc::new(ContractRegistry::default()),
    );
    let target = definition.resolution_target(&request);
    store.set_resolution(&target.key, ResolutionRecord::success(target.expected.clone()));

    let r = run(
        store,
        OperationKind::SetReverseName,
        ContractRegistry::default(),
        fast_simulator(),
        &request,
    );

    assert_ok!(r.coordinator.begin(request).await);
    assert_ok!(r.coordinator.wait_for_phase(Phase::AwaitingBroadcast).await);
    assert_ok!(r.coordinator.confirm().await);
    assert_ok!(r.coordinator.wait_for_phase(Phase::Complete).await);

    let reconciliation = assert_ok!(r.coordinator.take_reconciliation().await)
        .expect("completion starts the reconciler");
    let outcome = assert_ok!(reconciliation.await);
    assert!(outcome.converged());
    assert_eq!(outcome.reschedules(), 0);
    assert_eq!(
        r.store.count_issued(|c| matches!(c, WalletCommand::RequestResolution { .. })),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_subdomain_purchase_on_ropsten() {
    let request = OperationRequest::new(
        OperationKind::PurchaseSubdomain,
        ALICE,
        "alice",
        NetworkConfig::ropsten(),
    );
    let registry = ContractRegistry::default().with_subdomain_registrar(ROPSTEN_CHAIN_ID, REGISTRAR);
    let price = registry.subdomain_price_wei;
    let r = run(
        funded_store(),
        OperationKind::PurchaseSubdomain,
        registry,
        fast_simulator(),
        &request,
    );

    assert_ok!(r.coordinator.begin(request.clone()).await);
    assert_ok!(r.coordinator.wait_for_phase(Phase::AwaitingBroadcast).await);

    let draft = r.store.draft_snapshot();
    assert_eq!(
        draft.fields.to.as_deref(),
        Some(REGISTRAR.to_checksum(None).as_str())
    );
    assert_eq!(
        draft.fields.value.as_deref(),
        Some(format!("{price:#x}").as_str())
    );

    assert_ok!(r.coordinator.confirm().await);
    assert_ok!(r.coordinator.wait_for_phase(Phase::Complete).await);

    let target = r.definition.resolution_target(&request);
    assert_eq!(target.key, "alice.ethsimple.eth");
    assert_eq!(
        target.expected,
        ResolutionData {
            name: "alice.ethsimple.eth".to_string(),
            owner_address: ALICE,
        }
    );

    let reconciliation = assert_ok!(r.coordinator.take_reconciliation().await)
        .expect("subdomain completion reconciles too");
    assert!(assert_ok!(reconciliation.await).converged());
    assert!(
        r.store
            .notifications_snapshot()
            .iter()
            .any(|n| n.message.contains("alice.ethsimple.eth"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_subdomain_purchase_refused_without_registrar() {
    let request = OperationRequest::new(
        OperationKind::PurchaseSubdomain,
        ALICE,
        "alice",
        NetworkConfig::ropsten(),
    );
    let r = run(
        funded_store(),
        OperationKind::PurchaseSubdomain,
        ContractRegistry::default(),
        fast_simulator(),
        &request,
    );

    let outcome = assert_ok!(r.coordinator.begin(request).await);
    assert!(matches!(
        outcome,
        BeginOutcome::Refused(RefusalReason::UnsupportedNetwork(_))
    ));
    assert_eq!(
        r.store.count_issued(|c| matches!(c, WalletCommand::SetFields(_))),
        0
    );
    assert!(r.store.auto_gas_limit_enabled());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_broadcast_fails_and_allows_retry() {
    let request = reverse_request();
    let simulator = SimulatorConfig {
        fail_broadcasts: true,
        ..fast_simulator()
    };
    let r = run(
        funded_store(),
        OperationKind::SetReverseName,
        ContractRegistry::default(),
        simulator,
        &request,
    );

    assert_ok!(r.coordinator.begin(request.clone()).await);
    assert_ok!(r.coordinator.wait_for_phase(Phase::AwaitingBroadcast).await);
    assert_ok!(r.coordinator.confirm().await);

    let state = assert_ok!(r.coordinator.wait_for_phase(Phase::Failed).await);
    assert!(!state.poll_armed);
    assert!(!state.prompt_open);
    assert!(r.store.auto_gas_limit_enabled());

    let outcome = assert_ok!(r.coordinator.begin(request).await);
    assert!(matches!(outcome, BeginOutcome::Started { .. }));
    assert_ok!(r.coordinator.wait_for_phase(Phase::AwaitingBroadcast).await);
    assert_eq!(r.store.count_issued(|c| matches!(c, WalletCommand::Sign(_))), 2);
}

#[tokio::test(start_paused = true)]
async fn test_signer_failure_fails_lifecycle() {
    let store = funded_store();
    let (_sim, _sim_shutdown) = WalletSimulator::new(Arc::clone(&store), fast_simulator()).spawn();
    let signer = Arc::new(MockSigner::failing("hardware wallet locked"));
    let collaborators = Collaborators::from_store(Arc::clone(&store)).with_signer(signer.clone());
    let (coordinator, _worker, _shutdown) = spawn_coordinator(
        definition_for(
            OperationKind::SetReverseName,
            Arc::new(ContractRegistry::default()),
        ),
        collaborators,
        CoordinatorConfig::default(),
    );

    assert_ok!(coordinator.begin(reverse_request()).await);
    let state = assert_ok!(coordinator.wait_for_phase(Phase::Failed).await);
    assert!(!state.prompt_open);
    assert_eq!(signer.sign_calls(), 1);
    assert!(store.auto_gas_limit_enabled());
    assert_eq!(
        store.count_issued(|c| matches!(c, WalletCommand::BroadcastSigned)),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_worker_stops_on_shutdown() {
    let store = funded_store();
    let (coordinator, worker, shutdown) = spawn_coordinator(
        definition_for(
            OperationKind::SetReverseName,
            Arc::new(ContractRegistry::default()),
        ),
        Collaborators::from_store(Arc::clone(&store)),
        CoordinatorConfig::default(),
    );

    assert_ok!(shutdown.send(true));
    assert_ok!(worker.await);
    assert!(coordinator.begin(reverse_request()).await.is_err());
}
