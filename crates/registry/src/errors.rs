//! Error types for the name registry

use crate::treasury::PaymentError;
use crate::validation::NameError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: NameError },

    #[error("Name already registered: {name}")]
    AlreadyRegistered { name: String },

    #[error("Name not found: {name}")]
    NotFound { name: String },

    #[error("Unauthorized: caller does not own {name}")]
    Unauthorized { name: String },

    #[error("Fee payment failed: {0}")]
    PaymentFailed(#[from] PaymentError),

    #[error("Expiry of {name} would overflow the timestamp range")]
    ExpiryOverflow { name: String },

    #[error("Registry storage error: {0}")]
    StorageError(#[from] anyhow::Error),
}

impl RegistryError {
    /// Whether retrying the same request unchanged could succeed.
    ///
    /// Only storage failures qualify; every domain error is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::StorageError(_))
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
