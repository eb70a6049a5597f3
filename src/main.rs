//! Application entry point.
//!
//! Runs one operation against the in-memory wallet and its latency simulator,
//! confirming the prompt on the user's behalf.

use std::env;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ens_lifecycle_coordinator::app::{
    BeginOutcome, Collaborators, ContractRegistry, CoordinatorConfig, definition_for,
    spawn_coordinator,
};
use ens_lifecycle_coordinator::domain::{NetworkConfig, OperationKind, OperationRequest, Phase};
use ens_lifecycle_coordinator::infra::{InMemoryWalletStore, SimulatorConfig, WalletSimulator};

/// Application configuration
struct Config {
    kind: OperationKind,
    name: String,
    target_address: Address,
    network: NetworkConfig,
    /// Starting balance of the simulated account (default: 1 ETH)
    balance_wei: U256,
    /// Confirm the prompt automatically once the transaction is signed
    auto_confirm: bool,
}

impl Config {
    fn from_env() -> Result<Self> {
        let kind = env::var("OPERATION_KIND")
            .unwrap_or_else(|_| "set_reverse_name".to_string())
            .parse::<OperationKind>()
            .map_err(anyhow::Error::msg)?;
        let name = env::var("OPERATION_NAME").unwrap_or_else(|_| "alice".to_string());
        let target_address = env::var("TARGET_ADDRESS")
            .unwrap_or_else(|_| "0x00000000000000000000000000000000000000aa".to_string())
            .parse::<Address>()
            .context("TARGET_ADDRESS is not a valid address")?;
        let network = match env::var("NETWORK").as_deref() {
            Ok("ropsten") => NetworkConfig::ropsten(),
            _ => NetworkConfig::mainnet(),
        };
        let balance_wei = env::var("INITIAL_BALANCE_WEI")
            .ok()
            .and_then(|v| v.parse::<U256>().ok())
            .unwrap_or(U256::from(1_000_000_000_000_000_000u64));
        let auto_confirm = env::var("AUTO_CONFIRM")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Ok(Self {
            kind,
            name,
            target_address,
            network,
            balance_wei,
            auto_confirm,
        })
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!(
        "🏗️  ENS lifecycle coordinator v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    let registry =
        Arc::new(ContractRegistry::from_env().context("Invalid registry configuration")?);

    info!("📦 Initializing wallet...");
    let store = Arc::new(InMemoryWalletStore::new());
    store.set_balance(Some(config.balance_wei));
    store.configure_auto_gas_limit(true);
    info!("   ✓ In-memory wallet store ready (balance: {} wei)", config.balance_wei);

    let definition = definition_for(config.kind, Arc::clone(&registry));
    let request = OperationRequest::new(
        config.kind,
        config.target_address,
        config.name.clone(),
        config.network.clone(),
    );

    let (_sim_handle, sim_shutdown) =
        WalletSimulator::new(Arc::clone(&store), SimulatorConfig::from_env())
            .with_resolution_on_mine(definition.resolution_target(&request))
            .spawn();
    info!("   ✓ Wallet simulator started");

    let (coordinator, worker_handle, worker_shutdown) = spawn_coordinator(
        definition,
        Collaborators::from_store(Arc::clone(&store)),
        CoordinatorConfig::from_env(),
    );
    info!("   ✓ Coordinator worker started");

    info!(kind = %config.kind, name = %config.name, network = %config.network, "🚀 Beginning operation");
    match coordinator.begin(request).await? {
        BeginOutcome::Started { attempt } => info!(%attempt, "Lifecycle armed"),
        BeginOutcome::Deferred => info!("Waiting for gas estimate before starting"),
        BeginOutcome::Ignored => warn!("Another lifecycle is already armed"),
        BeginOutcome::Refused(reason) => {
            warn!(reason = %reason, "Operation refused");
            let _ = worker_shutdown.send(true);
            let _ = sim_shutdown.send(true);
            return Ok(());
        }
    }

    let run = async {
        if config.auto_confirm {
            coordinator.wait_for_phase(Phase::AwaitingBroadcast).await?;
            info!("Prompt open, confirming on the user's behalf");
            coordinator.confirm().await?;
        }

        let mut states = coordinator.subscribe();
        let state = states
            .wait_for(|s| matches!(s.phase, Phase::Complete | Phase::Failed))
            .await
            .context("Coordinator stopped unexpectedly")?
            .clone();

        if state.phase == Phase::Complete
            && let Some(reconciliation) = coordinator.take_reconciliation().await?
        {
            let outcome = reconciliation.await.context("Reconciler task panicked")?;
            info!(?outcome, "Name resolution reconciled");
        }
        anyhow::Ok(state.phase)
    };

    tokio::select! {
        result = run => {
            let phase = result?;
            info!(phase = %phase, "Operation finished");
        }
        _ = shutdown_signal() => {}
    }

    let _ = worker_shutdown.send(true);
    let _ = sim_shutdown.send(true);
    worker_handle.await.context("Coordinator worker panicked")?;

    info!("Shutdown complete");
    Ok(())
}
