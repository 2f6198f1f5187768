//! Error types for the search module.
//!
//! Every fallible entry point of the crate returns [`SearchError`]. Callers
//! that own a retry policy use [`SearchError::category`] to decide whether an
//! event or query is worth retrying:
//!
//! - **Configuration**: the schema or deployment is wrong, retrying cannot help
//! - **Transient**: storage or the remote query collaborator failed, retry may succeed
//! - **Invalid**: the payload or selection itself is malformed

use crate::query_builder::QueryBuildError;
use searchcore_types::{CatalogStoreError, ConfigurationError, RemoteQueryError};
use thiserror::Error;

/// Coarse classification of a [`SearchError`] for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Schema or deployment defect. Never retried.
    Configuration,
    /// Infrastructure failure surfaced to the caller's retry policy.
    Transient,
    /// Malformed input that will fail the same way on every attempt.
    Invalid,
}

/// Errors returned by the event consumer, projector and query facade.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The schema configuration does not support the requested operation.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The catalog store failed to prepare, write or query.
    #[error(transparent)]
    Store(#[from] CatalogStoreError),

    /// Refetching authoritative entity data failed.
    #[error(transparent)]
    RemoteQuery(#[from] RemoteQueryError),

    /// The selection or options could not be compiled into a query.
    #[error(transparent)]
    QueryBuild(#[from] QueryBuildError),

    /// An event payload entry could not be projected.
    #[error("invalid payload for {entity}: {detail}")]
    InvalidPayload { entity: String, detail: String },

    /// Startup storage preparation failed; every call fails until restart.
    #[error("search module is not ready: {reason}")]
    NotReady { reason: String },
}

impl SearchError {
    /// Classify the error for retry decisions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::NotReady { .. } => ErrorCategory::Configuration,
            Self::Store(CatalogStoreError::StoreFailure { .. }) | Self::RemoteQuery(_) => {
                ErrorCategory::Transient
            }
            Self::Store(CatalogStoreError::DecodeFailed { .. })
            | Self::Store(CatalogStoreError::DataRejected { .. })
            | Self::QueryBuild(_)
            | Self::InvalidPayload { .. } => ErrorCategory::Invalid,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}
