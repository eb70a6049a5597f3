//! Test utilities and mock implementations.

pub mod mocks;

pub use mocks::{
    MockBroadcaster, MockConfig, MockDraftStore, MockNonceProvider, MockReceiptStore, MockSigner,
    ScriptedResolutionStore,
};
