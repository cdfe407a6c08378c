//! Procedure facade tests against the in-memory mock connector.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use dbconns_client::{Row, SqlValue};
use dbconns_pool::{Pool, PoolConfig, PoolError, ProcedureError, Procedures};
use dbconns_testing::{MockConnector, MockControl, MockResponse, fixtures};

async fn setup() -> (Procedures<MockConnector>, MockControl) {
    let connector = MockConnector::new();
    let control = connector.control();
    let pool = Pool::new(
        connector,
        PoolConfig::new()
            .min_connections(2)
            .max_connections(4)
            .connection_timeout(Duration::from_millis(200))
            .retry_interval(Duration::from_millis(10)),
    )
    .await
    .unwrap();
    (Procedures::new(pool), control)
}

#[tokio::test]
async fn test_list_with_no_rows_is_empty() {
    let (procs, control) = setup().await;
    control.respond("get_user_list", MockResponse::empty());

    let rows = tokio_test::assert_ok!(procs.execute_list("get_user_list", &[]).await);
    assert!(rows.is_empty());
    assert_eq!(control.calls_to("get_user_list").len(), 1);
}

#[tokio::test]
async fn test_list_returns_rows_in_order() {
    let (procs, control) = setup().await;
    control.respond("get_task_list", MockResponse::rows(fixtures::task_rows(3)));

    let rows = procs
        .execute_list("get_task_list", &[SqlValue::from(7_i64)])
        .await
        .unwrap();
    let ids: Vec<i64> = rows.iter().map(|r| r.get_by_name("TaskId").unwrap()).collect();
    assert_eq!(ids, [1, 2, 3]);
}

#[tokio::test]
async fn test_single_with_no_match_is_none() {
    let (procs, control) = setup().await;
    control.respond("get_user_login", MockResponse::empty());

    let row = procs
        .execute_single("get_user_login", &["a@b.com".into(), "bad_pw".into()])
        .await
        .unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn test_single_with_falsy_fields_is_some() {
    let (procs, control) = setup().await;
    control.respond(
        "get_user_stats",
        MockResponse::rows(vec![Row::from_pairs([
            ("TotalUsers", SqlValue::from(0_i64)),
            ("Note", SqlValue::from("")),
            ("DeletedAt", SqlValue::Null),
        ])]),
    );

    let row = procs
        .execute_single("get_user_stats", &[])
        .await
        .unwrap()
        .expect("a row with falsy fields is still a row");
    assert_eq!(row.get_by_name::<i64>("TotalUsers").unwrap(), 0);
}

#[tokio::test]
async fn test_arguments_bound_in_order() {
    let (procs, control) = setup().await;

    procs
        .execute_without_result(
            "set_user_insert",
            &["a@b.com".into(), "pw".into(), "Kim".into()],
        )
        .await
        .unwrap();
    procs
        .execute_without_result("get_user_stats", &[])
        .await
        .unwrap();

    let calls = control.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].procedure, "set_user_insert");
    assert_eq!(
        calls[0].params,
        vec![SqlValue::from("a@b.com"), SqlValue::from("pw"), SqlValue::from("Kim")]
    );
    assert_eq!(calls[1].procedure, "get_user_stats");
    assert!(calls[1].params.is_empty());
}

#[tokio::test]
async fn test_every_shape_commits() {
    let (procs, control) = setup().await;

    procs.execute_without_result("set_notice_insert", &["hi".into()]).await.unwrap();
    procs.execute_single("get_notice_detail", &[1_i64.into()]).await.unwrap();
    procs.execute_list("get_notice_list", &[]).await.unwrap();

    assert_eq!(control.commits(), 3);
    assert_eq!(control.rollbacks(), 0);
}

#[tokio::test]
async fn test_server_error_propagates_and_connection_returns() {
    let (procs, control) = setup().await;
    control.respond(
        "set_user_insert",
        MockResponse::server_error("45000", "email already registered"),
    );

    let err = procs
        .execute_without_result("set_user_insert", &["a@b.com".into(), "pw".into(), "Kim".into()])
        .await
        .unwrap_err();

    match &err {
        ProcedureError::Execution { procedure, source } => {
            assert_eq!(procedure, "set_user_insert");
            assert!(source.is_server_error("45000"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(control.rollbacks(), 1);

    let status = procs.pool().status();
    assert_eq!(status.in_use, 0);
    assert_eq!(status.total, 2);
}

#[tokio::test]
async fn test_exhausted_pool_surfaces_acquire_error() {
    let (procs, _control) = setup().await;
    let held: Vec<_> = futures_util::future::join_all((0..4).map(|_| procs.pool().get()))
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let err = tokio_test::assert_err!(procs.execute_list("get_user_list", &[]).await);
    assert!(matches!(
        err,
        ProcedureError::Acquire(PoolError::AcquisitionTimeout(_))
    ));

    for conn in held {
        conn.release().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_share_pool() {
    let (procs, control) = setup().await;
    control.respond("get_user_login", MockResponse::rows(vec![fixtures::user_row(1, "Kim")]));

    let mut handles = Vec::new();
    for i in 0..20_i64 {
        let procs = procs.clone();
        handles.push(tokio::spawn(async move {
            procs
                .execute_single("get_user_login", &[format!("user{i}@example.com").into()])
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_some());
    }

    assert_eq!(control.calls_to("get_user_login").len(), 20);
    assert!(control.connects() <= 4);
    assert_eq!(procs.pool().status().in_use, 0);
}
