//! # dbconns-types
//!
//! MySQL value model for stored-procedure parameters and result rows.
//!
//! Procedure parameters are passed as an ordered list of [`SqlValue`]s and
//! every column of a result row is decoded into one. [`FromSql`] converts a
//! value back into a concrete Rust type.
//!
//! ## Features
//!
//! - `chrono` (default): `DATE`, `TIME`, `DATETIME` and `TIMESTAMP` support
//! - `decimal` (default): `DECIMAL`/`NUMERIC` support via rust_decimal
//! - `json`: `JSON` column support via serde_json
//!
//! ## Type Mappings
//!
//! | MySQL Type | Rust Type |
//! |------------|-----------|
//! | `BOOLEAN` / `TINYINT(1)` | `bool` |
//! | `TINYINT` | `i8` |
//! | `SMALLINT` | `i16` |
//! | `INT` / `MEDIUMINT` | `i32` |
//! | `BIGINT` | `i64` |
//! | `... UNSIGNED` | `u64` |
//! | `FLOAT` | `f32` |
//! | `DOUBLE` | `f64` |
//! | `DECIMAL` | `rust_decimal::Decimal` |
//! | `CHAR` / `VARCHAR` / `TEXT` / `ENUM` | `String` |
//! | `BINARY` / `VARBINARY` / `BLOB` | `Vec<u8>` |
//! | `DATE` | `chrono::NaiveDate` |
//! | `TIME` | `chrono::NaiveTime` |
//! | `DATETIME` | `chrono::NaiveDateTime` |
//! | `TIMESTAMP` | `chrono::DateTime<Utc>` |

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod from_sql;
pub mod value;

pub use error::TypeError;
pub use from_sql::FromSql;
pub use value::SqlValue;
