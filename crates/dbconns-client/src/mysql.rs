//! MySQL sessions backed by sqlx.
//!
//! Every session is initialized the same way: `utf8mb4` charset, the
//! configured session time zone, and auto-commit disabled unless the
//! parameters ask otherwise. Calls are sent as prepared statements with `?`
//! placeholders; argument values are only ever bound, never formatted into
//! the SQL text.
//!
//! MySQL converts `TIMESTAMP` values to and from the session time zone, so
//! [`SqlValue::Timestamp`] is shifted by the session offset on the way out
//! and back to UTC on the way in.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone as _, Utc};
use dbconns_types::{SqlValue, TypeError};
use futures_util::TryStreamExt as _;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{
    Column as _, Connection as SqlxConnection, Either, Executor as _, MySql, Row as _,
    TypeInfo as _,
};

use crate::call::{CallStatement, ParamStyle};
use crate::config::{ConfigError, ConnectionParameters};
use crate::connection::{Connection, Connector};
use crate::error::{Error, Result};
use crate::row::{Column, Row};

/// Opens [`MySqlSession`]s for one set of connection parameters.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    params: ConnectionParameters,
    options: MySqlConnectOptions,
    offset: FixedOffset,
}

impl MySqlConnector {
    /// Create a connector for the given parameters.
    ///
    /// The session time zone must be a UTC offset such as `+09:00` (or
    /// `UTC`); named zones are rejected.
    pub fn new(params: ConnectionParameters) -> Result<Self> {
        params.validate()?;
        let offset = parse_utc_offset(&params.time_zone)?;

        let options = MySqlConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.credentials.username)
            .password(&params.credentials.password)
            .database(&params.database)
            .charset(&params.charset)
            .timezone(Some(offset.to_string()));

        if !params.auth_plugin_map.is_empty() {
            tracing::debug!(
                mappings = ?params.auth_plugin_map,
                "auth plugin substitutions requested; sqlx answers auth switches with its native plugins"
            );
        }

        Ok(Self {
            params,
            options,
            offset,
        })
    }

    /// The parameters this connector was built from.
    #[must_use]
    pub fn params(&self) -> &ConnectionParameters {
        &self.params
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    type Connection = MySqlSession;

    async fn connect(&self) -> Result<MySqlSession> {
        let timeout = self.params.connect_timeout;
        let mut conn = tokio::time::timeout(timeout, MySqlConnection::connect_with(&self.options))
            .await
            .map_err(|_| Error::ConnectTimeout(timeout))?
            .map_err(|e| Error::Connection(e.to_string()))?;

        if !self.params.autocommit {
            (&mut conn)
                .execute(sqlx::raw_sql("SET autocommit = 0"))
                .await
                .map_err(|e| Error::Connection(format!("session setup failed: {e}")))?;
        }

        tracing::debug!(target = %self.params.redacted_url(), "opened MySQL session");
        Ok(MySqlSession {
            conn,
            offset: self.offset,
            dirty: false,
        })
    }

    fn describe(&self) -> String {
        self.params.redacted_url()
    }
}

/// A live MySQL session.
#[derive(Debug)]
pub struct MySqlSession {
    conn: MySqlConnection,
    offset: FixedOffset,
    dirty: bool,
}

#[async_trait]
impl Connection for MySqlSession {
    async fn ping(&mut self) -> Result<()> {
        SqlxConnection::ping(&mut self.conn).await?;
        Ok(())
    }

    async fn call(&mut self, statement: &CallStatement) -> Result<Vec<Row>> {
        let sql = statement.sql_with(ParamStyle::QuestionMark);
        let mut query = sqlx::query(&sql);
        for value in statement.params() {
            query = bind_value(query, value, self.offset)?;
        }

        self.dirty = true;

        // Only the first result set is returned, but the stream is drained so
        // the session is ready for the next command.
        let mut results = (&mut self.conn).fetch_many(query);
        let mut rows = Vec::new();
        let mut first_set_done = false;
        while let Some(step) = results.try_next().await? {
            match step {
                Either::Left(_) => first_set_done = true,
                Either::Right(row) if !first_set_done => rows.push(row),
                Either::Right(_) => {}
            }
        }
        drop(results);

        decode_result_set(&rows, self.offset)
    }

    async fn commit(&mut self) -> Result<()> {
        (&mut self.conn).execute(sqlx::raw_sql("COMMIT")).await?;
        self.dirty = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        (&mut self.conn).execute(sqlx::raw_sql("ROLLBACK")).await?;
        self.dirty = false;
        Ok(())
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    async fn close(self) -> Result<()> {
        SqlxConnection::close(self.conn).await?;
        Ok(())
    }
}

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

/// Parse a session time zone of the form `+HH:MM`, `-HH:MM` or `UTC`.
fn parse_utc_offset(zone: &str) -> Result<FixedOffset> {
    let invalid = |reason: &str| {
        Error::Config(ConfigError::InvalidValue {
            name: "time_zone".to_string(),
            value: zone.to_string(),
            reason: reason.to_string(),
        })
    };

    let trimmed = zone.trim();
    let trimmed = if trimmed.eq_ignore_ascii_case("UTC") || trimmed == "Z" {
        "+00:00"
    } else {
        trimmed
    };

    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => return Err(invalid("expected a UTC offset such as +09:00")),
    };
    let (hours, minutes) = rest
        .split_once(':')
        .ok_or_else(|| invalid("expected a UTC offset such as +09:00"))?;
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(hours) || !all_digits(minutes) {
        return Err(invalid("expected a UTC offset such as +09:00"));
    }
    let hours: i32 = hours.parse().map_err(|_| invalid("hours out of range"))?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid("minutes out of range"))?;
    if hours > 14 || minutes >= 60 {
        return Err(invalid("offset out of range"));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| invalid("offset out of range"))
}

fn to_session_time(value: &DateTime<Utc>, offset: FixedOffset) -> NaiveDateTime {
    value.with_timezone(&offset).naive_local()
}

fn from_session_time(value: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&value)
        .single()
        .map(|t| t.with_timezone(&Utc))
}

fn bind_value<'q>(
    query: MySqlQuery<'q>,
    value: &SqlValue,
    offset: FixedOffset,
) -> Result<MySqlQuery<'q>> {
    let query = match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::TinyInt(v) => query.bind(*v),
        SqlValue::SmallInt(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::BigInt(v) => query.bind(*v),
        SqlValue::UnsignedInt(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Double(v) => query.bind(*v),
        SqlValue::String(v) => query.bind(v.clone()),
        SqlValue::Binary(v) => query.bind(v.to_vec()),
        SqlValue::Decimal(v) => query.bind(*v),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(to_session_time(v, offset)),
        #[cfg(feature = "json")]
        SqlValue::Json(v) => query.bind(sqlx::types::Json(v.clone())),
        #[allow(unreachable_patterns)]
        other => {
            return Err(Error::Type(TypeError::TypeMismatch {
                expected: "bindable MySQL parameter",
                actual: other.type_name().to_string(),
            }));
        }
    };
    Ok(query)
}

/// Decode the rows of one result set.
fn decode_result_set(rows: &[MySqlRow], offset: FixedOffset) -> Result<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };

    let columns: Arc<[Column]> = first
        .columns()
        .iter()
        .map(|c| Column::new(c.name(), c.ordinal(), c.type_info().name()))
        .collect();

    rows.iter()
        .map(|row| {
            let values = columns
                .iter()
                .map(|column| decode_value(row, column, offset))
                .collect::<Result<Vec<_>>>()?;
            Row::new(columns.clone(), values)
                .ok_or_else(|| Error::Query("result row arity does not match its columns".into()))
        })
        .collect()
}

fn column_value<'r, T>(row: &'r MySqlRow, column: &Column) -> Result<Option<T>>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get(column.index)
        .map_err(|e| decode_error(column, e))
}

fn decode_error(column: &Column, err: sqlx::Error) -> Error {
    Error::Type(TypeError::Decode {
        column: column.name.clone(),
        type_name: column.type_name.clone(),
        reason: err.to_string(),
    })
}

fn decode_value(row: &MySqlRow, column: &Column, offset: FixedOffset) -> Result<SqlValue> {
    fn wrap<T>(value: Option<T>, f: impl FnOnce(T) -> SqlValue) -> SqlValue {
        value.map_or(SqlValue::Null, f)
    }

    let ty = column.type_name.as_str();
    let value = match ty {
        "BOOLEAN" => wrap(column_value::<bool>(row, column)?, SqlValue::Bool),
        "TINYINT" => wrap(column_value::<i8>(row, column)?, SqlValue::TinyInt),
        "SMALLINT" => wrap(column_value::<i16>(row, column)?, SqlValue::SmallInt),
        "INT" | "MEDIUMINT" => wrap(column_value::<i32>(row, column)?, SqlValue::Int),
        "BIGINT" => wrap(column_value::<i64>(row, column)?, SqlValue::BigInt),
        t if t.ends_with(" UNSIGNED") => {
            wrap(column_value::<u64>(row, column)?, SqlValue::UnsignedInt)
        }
        "FLOAT" => wrap(column_value::<f32>(row, column)?, SqlValue::Float),
        "DOUBLE" => wrap(column_value::<f64>(row, column)?, SqlValue::Double),
        "DECIMAL" => wrap(
            column_value::<rust_decimal::Decimal>(row, column)?,
            SqlValue::Decimal,
        ),
        "DATE" => wrap(column_value::<chrono::NaiveDate>(row, column)?, SqlValue::Date),
        "TIME" => wrap(column_value::<chrono::NaiveTime>(row, column)?, SqlValue::Time),
        "DATETIME" => wrap(
            column_value::<NaiveDateTime>(row, column)?,
            SqlValue::DateTime,
        ),
        "TIMESTAMP" => match column_value::<NaiveDateTime>(row, column)? {
            Some(local) => from_session_time(local, offset)
                .map(SqlValue::Timestamp)
                .ok_or_else(|| {
                    Error::Type(TypeError::Decode {
                        column: column.name.clone(),
                        type_name: column.type_name.clone(),
                        reason: format!("{local} does not exist at offset {offset}"),
                    })
                })?,
            None => SqlValue::Null,
        },
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            wrap(column_value::<String>(row, column)?, SqlValue::String)
        }
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => wrap(
            column_value::<Vec<u8>>(row, column)?,
            |b| SqlValue::Binary(b.into()),
        ),
        #[cfg(feature = "json")]
        "JSON" => wrap(
            column_value::<sqlx::types::Json<serde_json::Value>>(row, column)?,
            |j| SqlValue::Json(j.0),
        ),
        "NULL" => SqlValue::Null,
        _ => {
            // Unknown or driver-specific types: text if it decodes, bytes otherwise.
            match row.try_get_unchecked::<Option<String>, _>(column.index) {
                Ok(v) => wrap(v, SqlValue::String),
                Err(_) => wrap(
                    row.try_get_unchecked::<Option<Vec<u8>>, _>(column.index)
                        .map_err(|e| decode_error(column, e))?,
                    |b| SqlValue::Binary(b.into()),
                ),
            }
        }
    };
    Ok(value)
}
