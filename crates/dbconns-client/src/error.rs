//! Client error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while talking to the database.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Connection was not established within the configured timeout.
    #[error("connection timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server returned an error.
    ///
    /// Business-rule violations signaled by a procedure (`SIGNAL SQLSTATE
    /// '45000'`) arrive here as well.
    #[error("server error {code}: {message}")]
    Server {
        /// SQLSTATE or vendor error code reported by the server.
        code: String,
        /// Error message.
        message: String,
    },

    /// Statement execution failed on the client side.
    #[error("query error: {0}")]
    Query(String),

    /// Type conversion error.
    #[error("type error: {0}")]
    Type(#[from] dbconns_types::TypeError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid identifier (potential SQL injection attempt).
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl Error {
    /// Check if this error is transient and may succeed on retry.
    ///
    /// Transient errors are connection-level failures. Server errors are
    /// never considered transient here because a procedure may already have
    /// had side effects.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::ConnectTimeout(_) | Self::ConnectionClosed | Self::Io(_)
        )
    }

    /// Check if this is a server error with the given code.
    #[must_use]
    pub fn is_server_error(&self, code: &str) -> bool {
        matches!(self, Self::Server { code: c, .. } if c == code)
    }
}

#[cfg(feature = "mysql")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => Self::Server {
                code: db.code().map(|c| c.into_owned()).unwrap_or_default(),
                message: db.message().to_string(),
            },
            sqlx::Error::Io(io) => Self::Io(io),
            sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => Self::ConnectionClosed,
            sqlx::Error::Tls(e) => Self::Connection(e.to_string()),
            sqlx::Error::Protocol(msg) => Self::Connection(msg),
            other => Self::Query(other.to_string()),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::ConnectionClosed.is_transient());
        assert!(Error::Connection("refused".into()).is_transient());
        assert!(
            !Error::Server {
                code: "45000".into(),
                message: "duplicate email".into()
            }
            .is_transient()
        );
        assert!(!Error::InvalidIdentifier("x;y".into()).is_transient());
    }

    #[test]
    fn test_is_server_error() {
        let err = Error::Server {
            code: "40001".into(),
            message: "Deadlock found".into(),
        };
        assert!(err.is_server_error("40001"));
        assert!(!err.is_server_error("45000"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: Error = ConfigError::MissingVariable {
            name: "PROD_DB_USER".into(),
        }
        .into();
        assert!(err.to_string().contains("PROD_DB_USER"));
    }
}
