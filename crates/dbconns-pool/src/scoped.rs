//! Scoped acquisition.
//!
//! [`Pool::scoped`] leases one connection for a unit of work and always gives
//! it back. If the unit of work fails, its uncommitted changes are rolled back
//! first. A panic or cancellation inside the unit of work drops the
//! [`PooledConnection`](crate::PooledConnection), whose drop path performs the
//! same release in the background.

use std::time::Duration;

use dbconns_client::{Connection, Connector};
use futures_util::future::BoxFuture;

use crate::error::PoolError;
use crate::pool::Pool;

impl<C: Connector> Pool<C> {
    /// Run `f` with a leased connection, using the configured timeout.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let rows = pool
    ///     .scoped(|conn| Box::pin(async move {
    ///         let rows = conn.call(&stmt).await?;
    ///         conn.commit().await?;
    ///         Ok::<_, MyError>(rows)
    ///     }))
    ///     .await?;
    /// ```
    pub async fn scoped<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut C::Connection) -> BoxFuture<'c, Result<T, E>>,
        E: From<PoolError>,
    {
        self.scoped_timeout(self.config().connection_timeout, f)
            .await
    }

    /// Run `f` with a leased connection, waiting at most `timeout` for it.
    pub async fn scoped_timeout<F, T, E>(&self, timeout: Duration, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut C::Connection) -> BoxFuture<'c, Result<T, E>>,
        E: From<PoolError>,
    {
        let mut conn = self.get_timeout(timeout).await?;
        let result = f(&mut *conn).await;

        if result.is_err() {
            if let Err(e) = conn.rollback().await {
                tracing::debug!(
                    connection_id = conn.id(),
                    error = %e,
                    "rollback after failed unit of work failed"
                );
            }
        }

        conn.release().await;
        result
    }
}
