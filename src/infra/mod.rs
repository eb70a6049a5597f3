//! Infrastructure layer implementations.

pub mod simulator;
pub mod store;

pub use simulator::{SimulatorConfig, WalletSimulator};
pub use store::{InMemoryWalletStore, IssuedCommand, WalletCommand};
