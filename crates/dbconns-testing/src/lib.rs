//! # dbconns-testing
//!
//! Test infrastructure for the dbconns data-access layer.
//!
//! ## Features
//!
//! - Scriptable mock connector for pool and facade tests (no server required)
//! - MySQL container management via testcontainers
//! - Sample result rows shaped like the application's procedures
//!
//! ## Mock Example
//!
//! ```rust,ignore
//! use dbconns_testing::{MockConnector, MockResponse, fixtures};
//!
//! #[tokio::test]
//! async fn test_with_mock() {
//!     let connector = MockConnector::new();
//!     let control = connector.control();
//!     control.respond("get_user_login", MockResponse::rows(vec![fixtures::user_row(7, "Kim")]));
//!     control.fail_next_connects(1);
//!
//!     // Build a pool over `connector` and exercise it...
//!     assert_eq!(control.calls_to("get_user_login").len(), 0);
//! }
//! ```
//!
//! ## Container Example
//!
//! ```rust,ignore
//! use dbconns_testing::MySqlContainer;
//! use testcontainers::runners::AsyncRunner;
//!
//! #[tokio::test]
//! async fn test_with_real_server() {
//!     let container = MySqlContainer::default().start().await.unwrap();
//!     let port = container.get_host_port_ipv4(3306).await.unwrap();
//!     // Connect to localhost:port...
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod container;
pub mod fixtures;
pub mod mock;

pub use container::MySqlContainer;
pub use mock::{MockConnection, MockConnector, MockControl, MockResponse, RecordedCall};
