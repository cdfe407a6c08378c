//! Pool error types.

use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to acquire a connection within the timeout.
    ///
    /// Every connection was leased and the pool was at its maximum size for
    /// the whole wait.
    #[error("connection acquisition timeout after {0:?}")]
    AcquisitionTimeout(std::time::Duration),

    /// Pool is closed.
    #[error("pool is closed")]
    PoolClosed,

    /// Connection creation failed.
    #[error("failed to create connection: {0}")]
    ConnectionCreation(#[source] dbconns_client::Error),

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),
}

impl PoolError {
    /// Whether waiting and retrying the acquisition may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AcquisitionTimeout(_) => true,
            Self::ConnectionCreation(e) => e.is_transient(),
            Self::PoolClosed | Self::Configuration(_) => false,
        }
    }
}

/// Errors returned by the stored-procedure facade.
#[derive(Debug, Error)]
pub enum ProcedureError {
    /// No connection could be leased.
    #[error(transparent)]
    Acquire(#[from] PoolError),

    /// The call itself (or its commit) failed.
    #[error("procedure {procedure} failed: {source}")]
    Execution {
        /// Name of the procedure that failed.
        procedure: String,
        /// Underlying client error.
        #[source]
        source: dbconns_client::Error,
    },
}

impl ProcedureError {
    /// Name of the failed procedure, if the failure happened during execution.
    #[must_use]
    pub fn procedure(&self) -> Option<&str> {
        match self {
            Self::Execution { procedure, .. } => Some(procedure),
            Self::Acquire(_) => None,
        }
    }
}
