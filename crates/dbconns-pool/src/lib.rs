//! # dbconns-pool
//!
//! Connection pool and stored-procedure facade for the dbconns data-access
//! layer.
//!
//! All business logic lives in stored procedures. This crate gives the web
//! tier a bounded pool of MySQL sessions and three ways to call a procedure:
//! for its side effects, for a single row, or for a list of rows.
//!
//! ## Features
//!
//! - Configurable min/max pool sizes with a single acquisition deadline
//! - Health checks (`ping`) on checkout and checkin
//! - Rollback of uncommitted work when a connection is returned
//! - Eager replacement of broken connections to keep the minimum size
//! - Scoped acquisition with rollback on error and guaranteed release
//! - Pool status and metrics
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbconns_client::{ConnectionParameters, MySqlConnector};
//! use dbconns_pool::{Pool, PoolConfig, Procedures};
//!
//! let params = ConnectionParameters::from_env()?;
//! let pool_config = PoolConfig::from_env(params.environment)?;
//! let pool = Pool::new(MySqlConnector::new(params)?, pool_config).await?;
//! pool.close_on_shutdown();
//!
//! let procs = Procedures::new(pool.clone());
//! let user = procs
//!     .execute_single("get_user_login", &["a@b.com".into(), "pw".into()])
//!     .await?;
//! let users = procs.execute_list("get_user_list", &[]).await?;
//! procs
//!     .execute_without_result("set_user_insert", &["a@b.com".into(), "pw".into(), "Kim".into()])
//!     .await?;
//!
//! pool.close().await;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pool;
pub mod procedure;
mod scoped;

pub use config::PoolConfig;
pub use error::{PoolError, ProcedureError};
pub use lifecycle::{ConnectionMetadata, ConnectionState};
pub use pool::{Pool, PoolBuilder, PoolMetrics, PoolStatus, PooledConnection};
pub use procedure::Procedures;
