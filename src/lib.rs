//! Transaction lifecycle coordination for ENS name operations.
//!
//! Drives reverse-name and subdomain-purchase transactions through a shared
//! wallet draft, from field preparation to receipt confirmation, and waits for
//! name resolution to reflect the change.

pub mod app;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
