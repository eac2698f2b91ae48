//! Error types.
//!
//! Two layers:
//!
//! | Type | Raised by | Meaning |
//! |------|-----------|---------|
//! | [`ServiceError`] | [`QuantumService`] implementations | What the remote service reported |
//! | [`BraketError`] | every core component | Typed failure of a core operation |
//!
//! [`BraketError`] variants are categorized by what the caller should do:
//!
//! | Category | Variants | Recovery |
//! |----------|----------|----------|
//! | **Input** | `Validation`, `InvalidDevice`, `NotFound` | Fix input |
//! | **Not yet** | `Pending` | Re-invoke later |
//! | **Local** | `Persistence`, `Capability` | Fix environment / build |
//! | **Remote** | `Backend` | Depends on the wrapped [`ServiceError`] |
//!
//! Errors only become data at the tool boundary (see [`crate::tools`]).
//!
//! [`QuantumService`]: crate::service::QuantumService

use std::path::PathBuf;

use thiserror::Error;

use crate::task::TaskStatus;

/// Failures reported by the remote execution service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ServiceError {
    /// The requested task or device does not exist on the service.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The service cannot be reached (transient).
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Credentials were rejected or have expired.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Request rate exceeded (transient).
    #[error("request throttled: {0}")]
    Throttled(String),

    /// The service refused the request as submitted.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Anything else the service surfaced.
    #[error("internal service error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns `true` if the same request may succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Throttled(_))
    }
}

/// Result type returned by [`QuantumService`](crate::service::QuantumService).
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors raised by the core components.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BraketError {
    /// Malformed input: unparseable program text, non-positive shots, bad filter.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown task or device identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// Result requested before the task reached a terminal state.
    #[error("task {task_id} is not finished yet (status: {status})")]
    Pending {
        /// Task that was asked for.
        task_id: String,
        /// Status observed at call time.
        status: TaskStatus,
    },

    /// The device identifier is not in the catalog.
    #[error("invalid device: {0}")]
    InvalidDevice(String),

    /// Writing an artifact to disk failed.
    #[error("could not write {}: {source}", path.display())]
    Persistence {
        /// Target that could not be written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// An optional feature is not available in this build.
    #[error("capability unavailable: {0}")]
    Capability(String),

    /// Failure surfaced by the remote execution service.
    #[error("backend error: {0}")]
    Backend(ServiceError),
}

impl BraketError {
    /// Stable name of the error category, used as `error_type` in tool responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::NotFound(_) => "NotFoundError",
            Self::Pending { .. } => "PendingError",
            Self::InvalidDevice(_) => "InvalidDeviceError",
            Self::Persistence { .. } => "PersistenceError",
            Self::Capability(_) => "CapabilityError",
            Self::Backend(_) => "BackendError",
        }
    }

    /// Returns `true` if re-invoking the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Pending { .. } => true,
            Self::Backend(err) => err.is_transient(),
            _ => false,
        }
    }
}

impl From<ServiceError> for BraketError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => Self::NotFound(what),
            other => Self::Backend(other),
        }
    }
}

/// Result type for core operations.
pub type BraketResult<T> = Result<T, BraketError>;
