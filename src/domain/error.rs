//! Error types for the coordinator and its collaborators.

use thiserror::Error;

/// Top-level application error
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Field builder error: {0}")]
    Builder(#[from] BuilderError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),
}

/// Configuration errors (environment, registry, network support)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Operation {operation} is not supported on network {network}")]
    UnsupportedNetwork { operation: String, network: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Input validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("{0}")]
    Multiple(String),
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields: Vec<_> = errors.field_errors().into_iter().collect();
        match fields.as_slice() {
            [(field, errs)] => Self::InvalidField {
                field: field.to_string(),
                message: errs
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(ToString::to_string))
                    .next()
                    .unwrap_or_else(|| "invalid value".to_string()),
            },
            _ => Self::Multiple(errors.to_string()),
        }
    }
}

/// Errors raised while computing transaction fields
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuilderError {
    #[error("Invalid subdomain label: {0}")]
    InvalidLabel(String),

    #[error("Operation kind mismatch: expected {expected}, got {actual}")]
    KindMismatch { expected: String, actual: String },
}

/// Errors reported by external collaborators (store, signer, broadcaster, ...)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("Nonce request failed: {0}")]
    Nonce(String),

    #[error("Signer unavailable: {0}")]
    Signer(String),

    #[error("Broadcast request failed: {0}")]
    Broadcast(String),

    #[error("Store update failed: {0}")]
    Store(String),

    #[error("Receipt unavailable: {0}")]
    Receipt(String),

    #[error("Resolution request failed: {0}")]
    Resolution(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}
