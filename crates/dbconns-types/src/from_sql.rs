//! Trait for converting from SQL values to Rust types.

use crate::error::TypeError;
use crate::value::SqlValue;

/// Trait for types that can be converted from SQL values.
///
/// This trait is implemented for common Rust types to enable
/// type-safe extraction of values from procedure results.
pub trait FromSql: Sized {
    /// Convert from a SQL value to this type.
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError>;

    /// Convert from an optional SQL value.
    ///
    /// Returns `None` if the value is NULL.
    fn from_sql_nullable(value: &SqlValue) -> Result<Option<Self>, TypeError> {
        if value.is_null() {
            Ok(None)
        } else {
            Self::from_sql(value).map(Some)
        }
    }
}

fn mismatch(expected: &'static str, value: &SqlValue) -> TypeError {
    match value {
        SqlValue::Null => TypeError::UnexpectedNull,
        _ => TypeError::TypeMismatch {
            expected,
            actual: value.type_name().to_string(),
        },
    }
}

impl FromSql for bool {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl FromSql for i64 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::UnsignedInt(_) => value
                .as_i64()
                .ok_or(TypeError::OutOfRange { target_type: "i64" }),
            _ => value.as_i64().ok_or_else(|| mismatch("i64", value)),
        }
    }
}

impl FromSql for i32 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        let wide = i64::from_sql(value).map_err(|e| match e {
            TypeError::TypeMismatch { actual, .. } => TypeError::TypeMismatch {
                expected: "i32",
                actual,
            },
            other => other,
        })?;
        i32::try_from(wide).map_err(|_| TypeError::OutOfRange { target_type: "i32" })
    }
}

impl FromSql for i16 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::SmallInt(v) => Ok(*v),
            SqlValue::TinyInt(v) => Ok(i16::from(*v)),
            SqlValue::Int(_) | SqlValue::BigInt(_) | SqlValue::UnsignedInt(_) => {
                let wide = i64::from_sql(value)?;
                i16::try_from(wide).map_err(|_| TypeError::OutOfRange { target_type: "i16" })
            }
            _ => Err(mismatch("i16", value)),
        }
    }
}

impl FromSql for u64 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::UnsignedInt(v) => Ok(*v),
            SqlValue::BigInt(_) | SqlValue::Int(_) | SqlValue::SmallInt(_) | SqlValue::TinyInt(_) => {
                let wide = value.as_i64().ok_or_else(|| mismatch("u64", value))?;
                u64::try_from(wide).map_err(|_| TypeError::OutOfRange { target_type: "u64" })
            }
            _ => Err(mismatch("u64", value)),
        }
    }
}

impl FromSql for f32 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Float(v) => Ok(*v),
            _ => Err(mismatch("f32", value)),
        }
    }
}

impl FromSql for f64 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        value.as_f64().ok_or_else(|| mismatch("f64", value))
    }
}

impl FromSql for String {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::String(v) => Ok(v.clone()),
            // Some collations come back as binary strings.
            SqlValue::Binary(b) => String::from_utf8(b.to_vec()).map_err(|_| TypeError::TypeMismatch {
                expected: "String",
                actual: "non-UTF-8 VARBINARY".to_string(),
            }),
            _ => Err(mismatch("String", value)),
        }
    }
}

impl FromSql for Vec<u8> {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Binary(v) => Ok(v.to_vec()),
            SqlValue::String(s) => Ok(s.as_bytes().to_vec()),
            _ => Err(mismatch("Vec<u8>", value)),
        }
    }
}

impl<T: FromSql> FromSql for Option<T> {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        T::from_sql_nullable(value)
    }
}

#[cfg(feature = "decimal")]
impl FromSql for rust_decimal::Decimal {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Decimal(v) => Ok(*v),
            SqlValue::Int(v) => Ok(rust_decimal::Decimal::from(*v)),
            SqlValue::BigInt(v) => Ok(rust_decimal::Decimal::from(*v)),
            SqlValue::UnsignedInt(v) => Ok(rust_decimal::Decimal::from(*v)),
            SqlValue::String(s) => s
                .parse()
                .map_err(|e| TypeError::InvalidDecimal(format!("{e}"))),
            _ => Err(mismatch("Decimal", value)),
        }
    }
}

#[cfg(feature = "chrono")]
impl FromSql for chrono::NaiveDate {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Date(v) => Ok(*v),
            SqlValue::DateTime(v) => Ok(v.date()),
            _ => Err(mismatch("NaiveDate", value)),
        }
    }
}

#[cfg(feature = "chrono")]
impl FromSql for chrono::NaiveTime {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Time(v) => Ok(*v),
            SqlValue::DateTime(v) => Ok(v.time()),
            _ => Err(mismatch("NaiveTime", value)),
        }
    }
}

#[cfg(feature = "chrono")]
impl FromSql for chrono::NaiveDateTime {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::DateTime(v) => Ok(*v),
            SqlValue::Timestamp(v) => Ok(v.naive_utc()),
            SqlValue::Date(v) => v
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| TypeError::InvalidDateTime(v.to_string())),
            _ => Err(mismatch("NaiveDateTime", value)),
        }
    }
}

#[cfg(feature = "chrono")]
impl FromSql for chrono::DateTime<chrono::Utc> {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Timestamp(v) => Ok(*v),
            SqlValue::DateTime(v) => Ok(chrono::DateTime::from_naive_utc_and_offset(*v, chrono::Utc)),
            _ => Err(mismatch("DateTime<Utc>", value)),
        }
    }
}

#[cfg(feature = "json")]
impl FromSql for serde_json::Value {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Json(v) => Ok(v.clone()),
            SqlValue::String(s) => serde_json::from_str(s).map_err(|e| TypeError::TypeMismatch {
                expected: "JSON",
                actual: format!("invalid JSON: {e}"),
            }),
            SqlValue::Null => Ok(serde_json::Value::Null),
            _ => Err(mismatch("JSON", value)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_from_sql_i32() {
        let value = SqlValue::Int(42);
        assert_eq!(i32::from_sql(&value).unwrap(), 42);
    }

    #[test]
    fn test_from_sql_i32_out_of_range() {
        let value = SqlValue::BigInt(i64::from(i32::MAX) + 1);
        assert!(matches!(
            i32::from_sql(&value),
            Err(TypeError::OutOfRange { target_type: "i32" })
        ));
    }

    #[test]
    fn test_from_sql_string() {
        let value = SqlValue::String("hello".to_string());
        assert_eq!(String::from_sql(&value).unwrap(), "hello");
    }

    #[test]
    fn test_from_sql_null() {
        let value = SqlValue::Null;
        assert!(matches!(i32::from_sql(&value), Err(TypeError::UnexpectedNull)));
    }

    #[test]
    fn test_from_sql_option() {
        let value = SqlValue::Int(42);
        assert_eq!(Option::<i32>::from_sql(&value).unwrap(), Some(42));

        let null = SqlValue::Null;
        assert_eq!(Option::<i32>::from_sql(&null).unwrap(), None);
    }

    #[test]
    fn test_from_sql_bool_from_tinyint() {
        assert!(bool::from_sql(&SqlValue::TinyInt(1)).unwrap());
        assert!(!bool::from_sql(&SqlValue::TinyInt(0)).unwrap());
    }

    #[test]
    fn test_from_sql_type_mismatch() {
        let err = i64::from_sql(&SqlValue::String("12".into())).unwrap_err();
        assert_eq!(err.to_string(), "type mismatch: expected i64, got VARCHAR");
    }

    #[cfg(feature = "decimal")]
    #[test]
    fn test_from_sql_decimal_from_string() {
        let value = SqlValue::String("12.50".into());
        let d = rust_decimal::Decimal::from_sql(&value).unwrap();
        assert_eq!(d.to_string(), "12.50");
    }

    proptest! {
        #[test]
        fn prop_i64_survives_value_conversion(n in any::<i64>()) {
            prop_assert_eq!(i64::from_sql(&SqlValue::from(n)).unwrap(), n);
        }

        #[test]
        fn prop_negative_never_becomes_u64(n in i64::MIN..0) {
            let is_out_of_range = matches!(
                u64::from_sql(&SqlValue::BigInt(n)),
                Err(TypeError::OutOfRange { .. })
            );
            prop_assert!(is_out_of_range);
        }
    }
}
