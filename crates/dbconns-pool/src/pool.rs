//! Connection pool implementation.
//!
//! The pool keeps two disjoint collections: idle connections, and in-use
//! records keyed by a pool-assigned connection id. Both live behind one
//! `parking_lot::Mutex` that is only held for in-memory bookkeeping and never
//! across an `.await`. The mutex is never re-entered while held.
//!
//! Network I/O (connect, ping, rollback, close) runs outside the lock. Before
//! any such I/O the affected connection's id is reserved in the in-use map,
//! so `idle + in_use` never exceeds `max_connections`, and a connection is
//! never in both collections at once. While a connection is being acquired
//! its reservation is held by a [`Slot`] guard; while it is being returned,
//! by a [`Lease`]. Both give the id back if their future is dropped mid-I/O.

use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dbconns_client::{Connection, Connector};
use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::lifecycle::{ConnectionMetadata, ConnectionState};

/// A connection pool.
///
/// The pool manages a bounded set of database sessions, providing
/// connection reuse, health checking and replacement of broken sessions.
/// Cloning a `Pool` is cheap and yields another handle to the same pool.
pub struct Pool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> std::fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("target", &self.inner.connector.describe())
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct PoolInner<C: Connector> {
    connector: C,
    config: PoolConfig,
    state: Mutex<PoolState<C::Connection>>,
    next_connection_id: AtomicU64,
    created_at: Instant,
    metrics: Mutex<PoolMetricsInner>,
}

struct PoolState<T> {
    idle: VecDeque<IdleConnection<T>>,
    in_use: HashMap<u64, ConnectionMetadata>,
    closed: bool,
}

impl<T> PoolState<T> {
    fn total(&self) -> usize {
        self.idle.len() + self.in_use.len()
    }
}

struct IdleConnection<T> {
    conn: T,
    metadata: ConnectionMetadata,
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
struct PoolMetricsInner {
    connections_created: u64,
    connections_closed: u64,
    checkouts_successful: u64,
    checkouts_failed: u64,
    health_checks_performed: u64,
    health_checks_failed: u64,
    rollbacks_performed: u64,
    rollbacks_failed: u64,
    replacements_attempted: u64,
}

/// An in-use reservation that is released on drop unless disarmed.
struct Slot<'a, C: Connector> {
    inner: &'a PoolInner<C>,
    id: u64,
    armed: bool,
}

impl<'a, C: Connector> Slot<'a, C> {
    fn new(inner: &'a PoolInner<C>, id: u64) -> Self {
        Self {
            inner,
            id,
            armed: true,
        }
    }

    /// Move the reservation to a fresh connection id.
    fn rekey(&mut self) {
        let new_id = self.inner.next_connection_id();
        let mut state = self.inner.state.lock();
        state.in_use.remove(&self.id);
        state.in_use.insert(new_id, ConnectionMetadata::new(new_id));
        self.id = new_id;
    }

    /// Keep the reservation. The caller now owns the in-use entry.
    fn disarm(mut self) -> u64 {
        self.armed = false;
        self.id
    }
}

impl<C: Connector> Drop for Slot<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.state.lock().in_use.remove(&self.id);
        }
    }
}

/// The in-use entry of a connection on its way back to the pool.
///
/// Owned, so it can move into a spawned check-in task. If the check-in is
/// cancelled or never runs, dropping the lease forgets the entry.
struct Lease<C: Connector> {
    inner: Arc<PoolInner<C>>,
    id: u64,
    armed: bool,
}

impl<C: Connector> Lease<C> {
    fn new(inner: Arc<PoolInner<C>>, id: u64) -> Self {
        Self {
            inner,
            id,
            armed: true,
        }
    }
}

impl<C: Connector> Drop for Lease<C> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(connection_id = self.id, "connection check-in abandoned");
            self.inner.forget(self.id);
        }
    }
}

enum Checkout<T> {
    Idle(IdleConnection<T>),
    Create(u64),
    Exhausted,
}

impl<C: Connector> Pool<C> {
    /// Create a new pool builder around a connector.
    #[must_use]
    pub fn builder(connector: C) -> PoolBuilder<C> {
        PoolBuilder::new(connector)
    }

    /// Create a pool and eagerly open `min_connections` connections.
    ///
    /// Initial connection failures are logged and tolerated; the pool fills
    /// up on demand. For more control use [`Pool::builder()`].
    pub async fn new(connector: C, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let pool = Self {
            inner: Arc::new(PoolInner {
                connector,
                config,
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    in_use: HashMap::new(),
                    closed: false,
                }),
                next_connection_id: AtomicU64::new(1),
                created_at: Instant::now(),
                metrics: Mutex::new(PoolMetricsInner::default()),
            }),
        };

        tracing::info!(
            min = pool.inner.config.min_connections,
            max = pool.inner.config.max_connections,
            target = %pool.inner.connector.describe(),
            "connection pool created"
        );

        pool.initialize().await;
        Ok(pool)
    }

    /// Open connections until the pool holds `min_connections`.
    ///
    /// Best-effort: a failed connection attempt is logged and does not stop
    /// the others. Returns the number of connections created.
    pub async fn initialize(&self) -> usize {
        let ids: Vec<u64> = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return 0;
            }
            let missing =
                (self.inner.config.min_connections as usize).saturating_sub(state.total());
            (0..missing)
                .map(|_| {
                    let id = self.inner.next_connection_id();
                    state.in_use.insert(id, ConnectionMetadata::new(id));
                    id
                })
                .collect()
        };

        let results =
            futures_util::future::join_all(ids.into_iter().map(|id| self.inner.add_idle(id)))
                .await;
        let created = results.into_iter().filter(|added| *added).count();

        tracing::debug!(
            created,
            min = self.inner.config.min_connections,
            "pool initialized"
        );
        created
    }

    /// Get a connection from the pool using the configured timeout.
    pub async fn get(&self) -> Result<PooledConnection<C>, PoolError> {
        self.get_timeout(self.inner.config.connection_timeout).await
    }

    /// Get a connection from the pool.
    ///
    /// An idle connection is reused if one is available and passes its
    /// checkout checks; otherwise a new one is created if the pool is below
    /// capacity. If all connections are in use and the pool is at capacity,
    /// this retries every `retry_interval` until `timeout` has elapsed since
    /// the call, then fails with [`PoolError::AcquisitionTimeout`].
    pub async fn get_timeout(&self, timeout: Duration) -> Result<PooledConnection<C>, PoolError> {
        tracing::trace!("acquiring connection from pool");

        let deadline = tokio::time::Instant::now() + timeout;
        let result = self.acquire(deadline, timeout).await;

        match &result {
            Ok(_) => self.inner.record(|m| m.checkouts_successful += 1),
            Err(e) => {
                self.inner.record(|m| m.checkouts_failed += 1);
                tracing::debug!(error = %e, "connection acquisition failed");
            }
        }
        result
    }

    async fn acquire(
        &self,
        deadline: tokio::time::Instant,
        timeout: Duration,
    ) -> Result<PooledConnection<C>, PoolError> {
        let inner = &*self.inner;
        loop {
            let next = {
                let mut state = inner.state.lock();
                if state.closed {
                    return Err(PoolError::PoolClosed);
                }
                if let Some(mut idle) = state.idle.pop_front() {
                    idle.metadata.state = ConnectionState::Checking;
                    state.in_use.insert(idle.metadata.id, idle.metadata.clone());
                    Checkout::Idle(idle)
                } else if state.total() < inner.config.max_connections as usize {
                    let id = inner.next_connection_id();
                    state.in_use.insert(id, ConnectionMetadata::new(id));
                    Checkout::Create(id)
                } else {
                    Checkout::Exhausted
                }
            };

            match next {
                Checkout::Idle(idle) => {
                    let mut slot = Slot::new(inner, idle.metadata.id);
                    if let Some(idle) = inner.check_out(idle).await {
                        return self.lease(slot, idle.conn, idle.metadata).await;
                    }

                    slot.rekey();
                    match inner.open(slot.id).await {
                        Ok((conn, metadata)) => return self.lease(slot, conn, metadata).await,
                        Err(e) => {
                            drop(slot);
                            let below_min = inner.state.lock().total()
                                < inner.config.min_connections as usize;
                            if below_min && tokio::time::Instant::now() < deadline {
                                tracing::warn!(
                                    error = %e,
                                    "replacement connection failed while below minimum; retrying"
                                );
                                inner.pause(deadline).await;
                                continue;
                            }
                            return Err(PoolError::ConnectionCreation(e));
                        }
                    }
                }
                Checkout::Create(id) => {
                    let slot = Slot::new(inner, id);
                    let (conn, metadata) =
                        inner.open(id).await.map_err(PoolError::ConnectionCreation)?;
                    return self.lease(slot, conn, metadata).await;
                }
                Checkout::Exhausted => {
                    if tokio::time::Instant::now() >= deadline {
                        tracing::warn!(
                            timeout_ms = timeout.as_millis() as u64,
                            max = inner.config.max_connections,
                            "connection pool exhausted"
                        );
                        return Err(PoolError::AcquisitionTimeout(timeout));
                    }
                    inner.pause(deadline).await;
                }
            }
        }
    }

    async fn lease(
        &self,
        slot: Slot<'_, C>,
        conn: C::Connection,
        mut metadata: ConnectionMetadata,
    ) -> Result<PooledConnection<C>, PoolError> {
        metadata.mark_checkout();
        let leased = {
            let mut state = self.inner.state.lock();
            if state.closed {
                false
            } else {
                state.in_use.insert(slot.disarm(), metadata.clone());
                true
            }
        };

        if !leased {
            self.inner.discard(conn, metadata.id).await;
            return Err(PoolError::PoolClosed);
        }

        tracing::trace!(
            connection_id = metadata.id,
            checkout_count = metadata.checkout_count,
            "connection checked out"
        );
        Ok(PooledConnection {
            conn: Some(conn),
            metadata,
            pool: self.clone(),
        })
    }

    /// Return a connection to the pool.
    ///
    /// Equivalent to [`PooledConnection::release`]; the connection always
    /// goes back to the pool it was leased from.
    pub async fn release(&self, conn: PooledConnection<C>) {
        conn.release().await;
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            available: state.idle.len() as u32,
            in_use: state.in_use.len() as u32,
            total: state.total() as u32,
            min: self.inner.config.min_connections,
            max: self.inner.config.max_connections,
        }
    }

    /// Snapshot of the metadata of every connection the pool tracks.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionMetadata> {
        let state = self.inner.state.lock();
        state
            .idle
            .iter()
            .map(|c| c.metadata.clone())
            .chain(state.in_use.values().cloned())
            .collect()
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.inner.metrics.lock();
        PoolMetrics {
            connections_created: inner.connections_created,
            connections_closed: inner.connections_closed,
            checkouts_successful: inner.checkouts_successful,
            checkouts_failed: inner.checkouts_failed,
            health_checks_performed: inner.health_checks_performed,
            health_checks_failed: inner.health_checks_failed,
            rollbacks_performed: inner.rollbacks_performed,
            rollbacks_failed: inner.rollbacks_failed,
            replacements_attempted: inner.replacements_attempted,
            uptime: self.inner.created_at.elapsed(),
        }
    }

    /// Close the pool.
    ///
    /// Idle connections are closed immediately. Leased connections are closed
    /// when their holders release them. Later acquisitions fail with
    /// [`PoolError::PoolClosed`]. Calling this more than once is harmless.
    pub async fn close(&self) {
        let (idle, leased) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let leased = state.in_use.len();
            state.in_use.clear();
            (state.idle.drain(..).collect::<Vec<_>>(), leased)
        };

        let closed_idle = idle.len();
        for c in idle {
            self.inner.discard(c.conn, c.metadata.id).await;
        }
        tracing::info!(closed_idle, leased, "connection pool closed");
    }

    /// Close the pool when the process receives Ctrl-C.
    ///
    /// Spawns a task on the current Tokio runtime and returns its handle.
    pub fn close_on_shutdown(&self) -> tokio::task::JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("shutdown signal received, closing connection pool");
                    pool.close().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "unable to listen for shutdown signal");
                }
            }
        })
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Get the connector used to open new connections.
    #[must_use]
    pub fn connector(&self) -> &C {
        &self.inner.connector
    }
}

impl<C: Connector> PoolInner<C> {
    fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    fn record(&self, f: impl FnOnce(&mut PoolMetricsInner)) {
        f(&mut self.metrics.lock());
    }

    fn set_state(&self, id: u64, new_state: ConnectionState) {
        if let Some(meta) = self.state.lock().in_use.get_mut(&id) {
            meta.state = new_state;
        }
    }

    async fn pause(&self, deadline: tokio::time::Instant) {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        tokio::time::sleep(self.config.retry_interval.min(remaining)).await;
    }

    async fn open(&self, id: u64) -> dbconns_client::Result<(C::Connection, ConnectionMetadata)> {
        match self.connector.connect().await {
            Ok(conn) => {
                self.record(|m| m.connections_created += 1);
                tracing::debug!(connection_id = id, "created new connection");
                Ok((conn, ConnectionMetadata::new(id)))
            }
            Err(e) => {
                tracing::error!(
                    connection_id = id,
                    target = %self.connector.describe(),
                    error = %e,
                    "failed to create connection"
                );
                Err(e)
            }
        }
    }

    async fn discard(&self, conn: C::Connection, id: u64) {
        if let Err(e) = conn.close().await {
            tracing::debug!(connection_id = id, error = %e, "error while closing connection");
        }
        self.record(|m| m.connections_closed += 1);
        tracing::trace!(connection_id = id, "connection closed");
    }

    /// Open a connection for a reserved id and park it in idle.
    async fn add_idle(&self, id: u64) -> bool {
        let slot = Slot::new(self, id);
        let Ok((conn, mut metadata)) = self.open(id).await else {
            return false;
        };

        metadata.mark_checkin();
        let rejected = {
            let mut state = self.state.lock();
            slot.disarm();
            state.in_use.remove(&id);
            if state.closed {
                Some(conn)
            } else {
                state.idle.push_back(IdleConnection { conn, metadata });
                None
            }
        };

        match rejected {
            Some(conn) => {
                self.discard(conn, id).await;
                false
            }
            None => true,
        }
    }

    /// Checkout checks for an idle connection. Bad connections are closed.
    async fn check_out(
        &self,
        mut idle: IdleConnection<C::Connection>,
    ) -> Option<IdleConnection<C::Connection>> {
        let id = idle.metadata.id;

        if let Some(max_lifetime) = self.config.max_lifetime {
            if idle.metadata.is_expired(max_lifetime) {
                tracing::debug!(connection_id = id, "connection exceeded max lifetime");
                self.discard(idle.conn, id).await;
                return None;
            }
        }

        if self.config.test_on_checkout {
            self.record(|m| m.health_checks_performed += 1);
            if let Err(e) = idle.conn.ping().await {
                self.record(|m| m.health_checks_failed += 1);
                tracing::warn!(connection_id = id, error = %e, "health check failed on checkout");
                self.discard(idle.conn, id).await;
                return None;
            }
            idle.metadata.mark_health_check();
        }

        Some(idle)
    }

    /// Take back a leased connection.
    async fn check_in(
        mut lease: Lease<C>,
        mut conn: C::Connection,
        mut metadata: ConnectionMetadata,
    ) {
        let this = Arc::clone(&lease.inner);
        let id = metadata.id;
        let mut healthy = true;

        if this.config.rollback_on_return && conn.is_dirty() {
            this.set_state(id, ConnectionState::Resetting);
            match conn.rollback().await {
                Ok(()) => {
                    this.record(|m| m.rollbacks_performed += 1);
                    tracing::trace!(connection_id = id, "rolled back uncommitted work on return");
                }
                Err(e) => {
                    this.record(|m| m.rollbacks_failed += 1);
                    tracing::warn!(connection_id = id, error = %e, "rollback on return failed");
                    healthy = false;
                }
            }
        }

        if healthy && this.config.test_on_checkin {
            this.set_state(id, ConnectionState::Checking);
            this.record(|m| m.health_checks_performed += 1);
            match conn.ping().await {
                Ok(()) => metadata.mark_health_check(),
                Err(e) => {
                    this.record(|m| m.health_checks_failed += 1);
                    tracing::warn!(connection_id = id, error = %e, "health check failed on checkin");
                    healthy = false;
                }
            }
        }

        let min = this.config.min_connections as usize;
        let replacement = {
            let mut state = this.state.lock();
            lease.armed = false;
            state.in_use.remove(&id);
            if !state.closed && healthy && state.idle.len() < min {
                metadata.mark_checkin();
                state.idle.push_back(IdleConnection { conn, metadata });
                tracing::trace!(connection_id = id, "connection returned to idle");
                return;
            }
            if !state.closed && !healthy && state.total() < min {
                let new_id = this.next_connection_id();
                state.in_use.insert(new_id, ConnectionMetadata::new(new_id));
                Some(new_id)
            } else {
                None
            }
        };

        this.discard(conn, id).await;

        if let Some(new_id) = replacement {
            this.record(|m| m.replacements_attempted += 1);
            if this.add_idle(new_id).await {
                tracing::info!(
                    replaced = id,
                    connection_id = new_id,
                    "replaced broken connection"
                );
            } else {
                tracing::warn!(replaced = id, "could not replace broken connection");
            }
        }
    }

    /// Drop bookkeeping for a connection that cannot be returned gracefully.
    fn forget(&self, id: u64) {
        self.state.lock().in_use.remove(&id);
        self.record(|m| m.connections_closed += 1);
    }
}

/// Builder for creating a connection pool.
///
/// # Example
///
/// ```rust,ignore
/// let pool = Pool::builder(connector)
///     .min_connections(2)
///     .max_connections(10)
///     .build()
///     .await?;
/// ```
#[derive(Debug)]
pub struct PoolBuilder<C> {
    connector: C,
    pool_config: PoolConfig,
}

impl<C: Connector> PoolBuilder<C> {
    /// Create a new pool builder with default settings.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            pool_config: PoolConfig::default(),
        }
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Set the minimum number of connections.
    #[must_use]
    pub fn min_connections(mut self, count: u32) -> Self {
        self.pool_config.min_connections = count;
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.pool_config.max_connections = count;
        self
    }

    /// Set the connection acquisition timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.connection_timeout = timeout;
        self
    }

    /// Set the pause between acquisition attempts.
    #[must_use]
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.pool_config.retry_interval = interval;
        self
    }

    /// Set the maximum connection lifetime.
    #[must_use]
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.pool_config.max_lifetime = Some(lifetime);
        self
    }

    /// Build the pool and open its minimum connections.
    pub async fn build(self) -> Result<Pool<C>, PoolError> {
        Pool::new(self.connector, self.pool_config).await
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: u32,
    /// Number of connections currently in use (including slots being opened).
    pub in_use: u32,
    /// Total number of connections.
    pub total: u32,
    /// Minimum connections the pool tries to keep.
    pub min: u32,
    /// Maximum allowed connections.
    pub max: u32,
}

impl PoolStatus {
    /// Calculate the utilization percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (self.in_use as f64 / self.max as f64) * 100.0
    }

    /// Check if the pool is at capacity.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.total >= self.max
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Total connections created since pool start.
    pub connections_created: u64,
    /// Total connections closed since pool start.
    pub connections_closed: u64,
    /// Successful connection checkouts.
    pub checkouts_successful: u64,
    /// Failed connection checkouts (timeouts, pool closed, creation errors).
    pub checkouts_failed: u64,
    /// Health checks performed.
    pub health_checks_performed: u64,
    /// Health checks that failed.
    pub health_checks_failed: u64,
    /// Rollbacks of uncommitted work on return.
    pub rollbacks_performed: u64,
    /// Rollbacks on return that failed.
    pub rollbacks_failed: u64,
    /// Replacements attempted for connections found broken on return.
    pub replacements_attempted: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate checkout success rate (0.0 to 1.0).
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            return 1.0;
        }
        self.checkouts_successful as f64 / total as f64
    }

    /// Calculate health check success rate (0.0 to 1.0).
    #[must_use]
    pub fn health_check_success_rate(&self) -> f64 {
        if self.health_checks_performed == 0 {
            return 1.0;
        }
        let successful = self.health_checks_performed - self.health_checks_failed;
        successful as f64 / self.health_checks_performed as f64
    }
}

/// A connection leased from the pool.
///
/// Dereferences to the underlying connection. Give it back with
/// [`PooledConnection::release`]; if it is dropped instead, the release runs
/// on a spawned task of the current Tokio runtime.
pub struct PooledConnection<C: Connector> {
    conn: Option<C::Connection>,
    metadata: ConnectionMetadata,
    pool: Pool<C>,
}

impl<C: Connector> PooledConnection<C> {
    /// Get the connection metadata.
    #[must_use]
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.metadata
    }

    /// Pool-assigned id of this connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.metadata.id
    }

    /// Return the connection to its pool.
    ///
    /// Uncommitted work is rolled back and the connection is health-checked
    /// as configured. Broken connections are closed (and replaced if the pool
    /// would drop below its minimum); errors are logged, never returned.
    pub async fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::trace!(connection_id = self.metadata.id, "returning connection to pool");
            let lease = Lease::new(Arc::clone(&self.pool.inner), self.metadata.id);
            PoolInner::check_in(lease, conn, self.metadata.clone()).await;
        }
    }
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    #[allow(clippy::expect_used)]
    fn deref(&self) -> &C::Connection {
        // Only `release` and `drop` take the connection out.
        self.conn.as_ref().expect("pooled connection used after release")
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    #[allow(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut C::Connection {
        self.conn.as_mut().expect("pooled connection used after release")
    }
}

impl<C: Connector> std::fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        let metadata = self.metadata.clone();
        let lease = Lease::new(Arc::clone(&self.pool.inner), metadata.id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::trace!(connection_id = metadata.id, "returning dropped connection to pool");
                // A runtime that is shutting down drops the task unpolled,
                // which drops the lease with it.
                handle.spawn(PoolInner::check_in(lease, conn, metadata));
            }
            Err(_) => {
                tracing::warn!(
                    connection_id = metadata.id,
                    "connection dropped outside a Tokio runtime; discarded without a graceful close"
                );
                drop(conn);
                drop(lease);
            }
        }
    }
}
