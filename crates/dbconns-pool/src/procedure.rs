//! Stored-procedure invocation facade.
//!
//! [`Procedures`] is the entry point application code uses to run
//! procedures. Each call leases a connection through [`Pool::scoped`], sends
//! `CALL <name>(?, ...)` with the arguments bound in order, commits, and
//! returns the connection. Three result shapes are offered:
//!
//! | Method | Result |
//! |--------|--------|
//! | [`execute_without_result`](Procedures::execute_without_result) | `()` |
//! | [`execute_single`](Procedures::execute_single) | `Option<Row>`; `None` when no row came back |
//! | [`execute_list`](Procedures::execute_list) | `Vec<Row>`; empty when no rows came back |
//!
//! Failures are logged with the procedure name and the number of arguments.
//! Argument values are never logged.

use dbconns_client::{CallStatement, Connection, Connector, Row, SqlValue};

use crate::error::{PoolError, ProcedureError};
use crate::pool::Pool;

/// Runs stored procedures on pooled connections.
pub struct Procedures<C: Connector> {
    pool: Pool<C>,
}

impl<C: Connector> Clone for Procedures<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<C: Connector> std::fmt::Debug for Procedures<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Procedures").field("pool", &self.pool).finish()
    }
}

impl<C: Connector> Procedures<C> {
    /// Create a facade over a shared pool.
    #[must_use]
    pub fn new(pool: Pool<C>) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<C> {
        &self.pool
    }

    /// Run a procedure for its side effects.
    pub async fn execute_without_result(
        &self,
        name: &str,
        params: &[SqlValue],
    ) -> Result<(), ProcedureError> {
        self.run(name, params).await.map(|_| ())
    }

    /// Run a procedure and return its first row, if any.
    pub async fn execute_single(
        &self,
        name: &str,
        params: &[SqlValue],
    ) -> Result<Option<Row>, ProcedureError> {
        Ok(self.run(name, params).await?.into_iter().next())
    }

    /// Run a procedure and return all of its rows.
    pub async fn execute_list(
        &self,
        name: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Row>, ProcedureError> {
        self.run(name, params).await
    }

    async fn run(&self, name: &str, params: &[SqlValue]) -> Result<Vec<Row>, ProcedureError> {
        let result: Result<Vec<Row>, CallFailure> = match CallStatement::new(name, params.to_vec()) {
            Ok(statement) => {
                self.pool
                    .scoped(move |conn| {
                        Box::pin(async move {
                            let rows = conn.call(&statement).await.map_err(CallFailure::Execution)?;
                            conn.commit().await.map_err(CallFailure::Execution)?;
                            Ok::<_, CallFailure>(rows)
                        })
                    })
                    .await
            }
            Err(e) => Err(CallFailure::Execution(e)),
        };

        match result {
            Ok(rows) => {
                tracing::debug!(
                    procedure = name,
                    param_count = params.len(),
                    rows = rows.len(),
                    "procedure call completed"
                );
                Ok(rows)
            }
            Err(failure) => {
                let err = failure.into_error(name);
                tracing::error!(
                    procedure = name,
                    param_count = params.len(),
                    error = %err,
                    "procedure call failed"
                );
                Err(err)
            }
        }
    }
}

/// Failure inside the scoped unit of work, before the procedure name is attached.
enum CallFailure {
    Acquire(PoolError),
    Execution(dbconns_client::Error),
}

impl From<PoolError> for CallFailure {
    fn from(e: PoolError) -> Self {
        Self::Acquire(e)
    }
}

impl CallFailure {
    fn into_error(self, procedure: &str) -> ProcedureError {
        match self {
            Self::Acquire(e) => ProcedureError::Acquire(e),
            Self::Execution(source) => ProcedureError::Execution {
                procedure: procedure.to_string(),
                source,
            },
        }
    }
}
