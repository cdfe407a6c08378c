//! Test fixture utilities.
//!
//! Rows here mirror the shapes returned by the application's procedures so
//! tests read like real call sites.

use dbconns_client::{ConnectionParameters, Credentials, Row, SqlValue};

/// A `get_user_login`-style row.
#[must_use]
pub fn user_row(user_id: i64, user_name: &str) -> Row {
    Row::from_pairs([
        ("UserId", SqlValue::from(user_id)),
        ("UserName", SqlValue::from(user_name)),
        ("UserEmail", SqlValue::from(format!("{}@example.com", user_name.to_lowercase()))),
        ("UserYn", SqlValue::from("Y")),
    ])
}

/// A `get_user_stats`-style aggregate row.
#[must_use]
pub fn user_stats_row(total: i64, active: i64) -> Row {
    Row::from_pairs([
        ("TotalUsers", SqlValue::from(total)),
        ("ActiveUsers", SqlValue::from(active)),
    ])
}

/// `count` rows shaped like `get_task_list` output.
#[must_use]
pub fn task_rows(count: usize) -> Vec<Row> {
    (1..=count)
        .map(|i| {
            Row::from_pairs([
                ("TaskId", SqlValue::from(i as i64)),
                ("TaskTitle", SqlValue::from(format!("task {i}"))),
                ("TaskDone", SqlValue::from(i % 2 == 0)),
            ])
        })
        .collect()
}

/// Connection parameters for a MySQL server started by a test.
#[must_use]
pub fn test_parameters(host: &str, port: u16, root_password: &str, database: &str) -> ConnectionParameters {
    ConnectionParameters::new(
        host,
        port,
        Credentials::new("root", root_password.to_string()),
        database,
    )
    .connect_timeout(std::time::Duration::from_secs(30))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_row_shape() {
        let row = user_row(3, "Kim");
        assert_eq!(row.get_by_name::<i64>("UserId").unwrap(), 3);
        assert_eq!(row.get_by_name::<String>("UserEmail").unwrap(), "kim@example.com");
    }

    #[test]
    fn test_task_rows() {
        let rows = task_rows(3);
        assert_eq!(rows.len(), 3);
        assert!(rows[1].get_by_name::<bool>("TaskDone").unwrap());
    }
}
