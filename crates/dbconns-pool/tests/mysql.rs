//! End-to-end tests against a real MySQL server.
//!
//! These tests start a MySQL container and need Docker. They are ignored by
//! default and can be run with:
//!
//! ```bash
//! cargo test -p dbconns-pool --test mysql -- --ignored
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use dbconns_client::{CallStatement, Connection, MySqlConnector, SqlValue};
use dbconns_pool::{Pool, PoolConfig, PoolError, Procedures};
use dbconns_testing::{MySqlContainer, fixtures};
use sqlx::Connection as _;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;

const SCHEMA: &[&str] = &[
    "CREATE TABLE users (
        UserId BIGINT AUTO_INCREMENT PRIMARY KEY,
        UserEmail VARCHAR(100) NOT NULL UNIQUE,
        UserPw VARCHAR(100) NOT NULL,
        UserName VARCHAR(50) NOT NULL
    )",
    "CREATE PROCEDURE set_user_insert(IN p_email VARCHAR(100), IN p_pw VARCHAR(100), IN p_name VARCHAR(50))
     BEGIN
         INSERT INTO users (UserEmail, UserPw, UserName) VALUES (p_email, p_pw, p_name);
     END",
    "CREATE PROCEDURE get_user_login(IN p_email VARCHAR(100), IN p_pw VARCHAR(100))
     BEGIN
         SELECT UserId, UserName FROM users WHERE UserEmail = p_email AND UserPw = p_pw;
     END",
    "CREATE PROCEDURE get_user_list()
     BEGIN
         SELECT UserId, UserName FROM users ORDER BY UserId;
     END",
    "CREATE PROCEDURE get_user_lookup(IN p_email VARCHAR(100))
     BEGIN
         SELECT UserId, UserName FROM users WHERE UserEmail = p_email;
         SELECT UserId, UserName FROM users ORDER BY UserId;
     END",
    "CREATE TABLE events (
        EventId BIGINT AUTO_INCREMENT PRIMARY KEY,
        OccurredAt TIMESTAMP NOT NULL
    )",
    "CREATE PROCEDURE set_event_insert(IN p_at TIMESTAMP)
     BEGIN
         INSERT INTO events (OccurredAt) VALUES (p_at);
     END",
    "CREATE PROCEDURE get_event_list()
     BEGIN
         SELECT EventId, OccurredAt, CAST(UNIX_TIMESTAMP(OccurredAt) AS SIGNED) AS Epoch
         FROM events ORDER BY EventId;
     END",
];

async fn start() -> (ContainerAsync<MySqlContainer>, Procedures<MySqlConnector>) {
    let image = MySqlContainer::default();
    let (password, database) = (image.root_password.clone(), image.database.clone());
    let container = image.start().await.expect("MySQL container should start");
    let host = container.get_host().await.unwrap().to_string();
    let port = container
        .get_host_port_ipv4(MySqlContainer::PORT)
        .await
        .unwrap();

    let url = format!("mysql://root:{password}@{host}:{port}/{database}");
    let mut setup = sqlx::MySqlConnection::connect(&url).await.unwrap();
    for statement in SCHEMA {
        sqlx::raw_sql(*statement).execute(&mut setup).await.unwrap();
    }
    setup.close().await.unwrap();

    let params = fixtures::test_parameters(&host, port, &password, &database);
    let connector = MySqlConnector::new(params).unwrap();
    let pool = Pool::new(
        connector,
        PoolConfig::new()
            .min_connections(2)
            .max_connections(4)
            .connection_timeout(Duration::from_secs(10)),
    )
    .await
    .unwrap();
    assert_eq!(pool.status().available, 2);

    (container, Procedures::new(pool))
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn test_procedure_round_trip() {
    let (_container, procs) = start().await;

    procs
        .execute_without_result(
            "set_user_insert",
            &["a@b.com".into(), "pw".into(), "Kim".into()],
        )
        .await
        .unwrap();

    let row = procs
        .execute_single("get_user_login", &["a@b.com".into(), "pw".into()])
        .await
        .unwrap()
        .expect("user should log in");
    assert_eq!(row.get_by_name::<String>("UserName").unwrap(), "Kim");
    assert!(row.get_by_name::<i64>("UserId").unwrap() > 0);

    let missing = procs
        .execute_single("get_user_login", &["a@b.com".into(), "bad_pw".into()])
        .await
        .unwrap();
    assert!(missing.is_none());

    let rows = procs.execute_list("get_user_list", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);

    procs.pool().close().await;
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn test_uncommitted_work_is_rolled_back() {
    let (_container, procs) = start().await;

    procs
        .pool()
        .scoped(|conn| {
            Box::pin(async move {
                let stmt = CallStatement::new(
                    "set_user_insert",
                    vec![
                        SqlValue::from("tmp@b.com"),
                        SqlValue::from("pw"),
                        SqlValue::from("Tmp"),
                    ],
                )?;
                conn.call(&stmt).await?;
                // No commit: the pool rolls the insert back on return.
                Ok::<_, Box<dyn std::error::Error + Send + Sync>>(())
            })
        })
        .await
        .unwrap();

    let rows = procs.execute_list("get_user_list", &[]).await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(procs.pool().metrics().rollbacks_performed, 1);
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn test_duplicate_insert_is_server_error() {
    let (_container, procs) = start().await;
    let args: [SqlValue; 3] = ["dup@b.com".into(), "pw".into(), "Dup".into()];

    procs
        .execute_without_result("set_user_insert", &args)
        .await
        .unwrap();
    let err = procs
        .execute_without_result("set_user_insert", &args)
        .await
        .unwrap_err();
    assert_eq!(err.procedure(), Some("set_user_insert"));

    // The pool is still usable after the failure.
    assert_eq!(procs.execute_list("get_user_list", &[]).await.unwrap().len(), 1);
    assert!(!matches!(
        procs.pool().get_timeout(Duration::from_secs(1)).await,
        Err(PoolError::AcquisitionTimeout(_))
    ));
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn test_only_first_result_set_is_returned() {
    let (_container, procs) = start().await;
    for (email, name) in [("a@b.com", "Kim"), ("c@d.com", "Lee"), ("e@f.com", "Park")] {
        procs
            .execute_without_result("set_user_insert", &[email.into(), "pw".into(), name.into()])
            .await
            .unwrap();
    }

    // An empty first set is not replaced by the second one.
    let missing = procs
        .execute_single("get_user_lookup", &["nobody@b.com".into()])
        .await
        .unwrap();
    assert!(missing.is_none());
    let rows = procs
        .execute_list("get_user_lookup", &["nobody@b.com".into()])
        .await
        .unwrap();
    assert!(rows.is_empty());

    // A same-shaped second set is not appended to the first.
    let rows = procs
        .execute_list("get_user_lookup", &["c@d.com".into()])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_by_name::<String>("UserName").unwrap(), "Lee");

    // The session is still in sync for the next call.
    assert_eq!(procs.execute_list("get_user_list", &[]).await.unwrap().len(), 3);
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn test_timestamp_round_trips_through_session_time_zone() {
    let (_container, procs) = start().await;
    assert_eq!(
        procs.pool().connector().params().time_zone,
        dbconns_client::config::DEFAULT_TIME_ZONE
    );

    let instant = DateTime::<Utc>::from_timestamp(1_709_294_400, 0).unwrap();
    procs
        .execute_without_result("set_event_insert", &[instant.into()])
        .await
        .unwrap();

    let row = procs
        .execute_single("get_event_list", &[])
        .await
        .unwrap()
        .expect("event should be stored");
    assert_eq!(row.get_by_name::<DateTime<Utc>>("OccurredAt").unwrap(), instant);
    assert_eq!(row.get_by_name::<i64>("Epoch").unwrap(), instant.timestamp());
}
