//! # dbconns-client
//!
//! Connection parameters, stored-procedure call statements and database
//! sessions for the dbconns data-access layer.
//!
//! This crate holds everything needed to talk to one database session. The
//! pool in `dbconns-pool` builds on top of the [`Connector`] and
//! [`Connection`] traits defined here.
//!
//! ## Features
//!
//! - **Environment profiles**: `local`, `remote` and `production` parameter
//!   sets resolved from environment variables (and a `.env` file)
//! - **Safe procedure calls**: names are validated, arguments are always
//!   bound, never formatted into SQL text
//! - **MySQL backend** (feature `mysql`, on by default): sqlx sessions with
//!   `utf8mb4`, a fixed session time zone and auto-commit disabled
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbconns_client::{CallStatement, Connection, Connector, ConnectionParameters, MySqlConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let params = ConnectionParameters::from_env()?;
//!     let connector = MySqlConnector::new(params)?;
//!
//!     let mut session = connector.connect().await?;
//!     let stmt = CallStatement::new("get_user_login", vec!["a@b.com".into()])?;
//!     let rows = session.call(&stmt).await?;
//!     session.commit().await?;
//!
//!     for row in rows {
//!         let name: String = row.get_by_name("UserName")?;
//!         println!("User: {name}");
//!     }
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod call;
pub mod config;
pub mod connection;
pub mod error;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod row;

// Re-export commonly used types
pub use call::{CallStatement, ParamStyle};
pub use config::{
    AuthPluginMapping, ConfigError, ConnectionParameters, Credentials, DeploymentEnvironment,
};
pub use connection::{Connection, Connector};
pub use dbconns_types::{FromSql, SqlValue, TypeError};
pub use error::{Error, Result};
#[cfg(feature = "mysql")]
pub use mysql::{MySqlConnector, MySqlSession};
pub use row::{Column, Row};
