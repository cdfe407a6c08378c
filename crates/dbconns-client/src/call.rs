//! Stored-procedure call statements.
//!
//! A [`CallStatement`] pairs a validated procedure name with its ordered
//! positional arguments. The name is the only part ever written into the SQL
//! text; arguments are always sent through the driver's parameter binding.
//!
//! ```
//! use dbconns_client::{CallStatement, ParamStyle, SqlValue};
//!
//! let stmt = CallStatement::new(
//!     "set_user_insert",
//!     vec![SqlValue::from("a@b.com"), SqlValue::from("pw"), SqlValue::from("Kim")],
//! )
//! .unwrap();
//! assert_eq!(stmt.sql(), "CALL set_user_insert(%s, %s, %s)");
//! assert_eq!(stmt.sql_with(ParamStyle::QuestionMark), "CALL set_user_insert(?, ?, ?)");
//! assert_eq!(stmt.params().len(), 3);
//! ```

use std::fmt;

use dbconns_types::SqlValue;

use crate::error::{Error, Result};

/// Placeholder syntax understood by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamStyle {
    /// `%s` placeholders (format style).
    #[default]
    Format,
    /// `?` placeholders, as used by MySQL prepared statements.
    QuestionMark,
}

impl ParamStyle {
    /// The placeholder token for this style.
    #[must_use]
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::Format => "%s",
            Self::QuestionMark => "?",
        }
    }
}

/// A `CALL` statement for one procedure invocation.
#[derive(Clone, PartialEq)]
pub struct CallStatement {
    procedure: String,
    params: Vec<SqlValue>,
}

impl CallStatement {
    /// Build a call for `procedure` with the given positional arguments.
    ///
    /// Fails with [`Error::InvalidIdentifier`] if the name is not a plain
    /// (optionally schema-qualified) MySQL identifier.
    pub fn new(procedure: impl Into<String>, params: impl Into<Vec<SqlValue>>) -> Result<Self> {
        let procedure = procedure.into();
        validate_procedure_name(&procedure)?;
        Ok(Self {
            procedure,
            params: params.into(),
        })
    }

    /// Build a call that takes no arguments.
    pub fn without_params(procedure: impl Into<String>) -> Result<Self> {
        Self::new(procedure, Vec::new())
    }

    /// The procedure name.
    #[must_use]
    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    /// The bound arguments, in call order.
    #[must_use]
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// Render the statement with `%s` placeholders.
    #[must_use]
    pub fn sql(&self) -> String {
        self.sql_with(ParamStyle::Format)
    }

    /// Render the statement with the given placeholder style.
    #[must_use]
    pub fn sql_with(&self, style: ParamStyle) -> String {
        let placeholders = vec![style.placeholder(); self.params.len()].join(", ");
        format!("CALL {}({})", self.procedure, placeholders)
    }
}

impl fmt::Debug for CallStatement {
    // Argument values may hold passwords; only their count is printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallStatement")
            .field("procedure", &self.procedure)
            .field("param_count", &self.params.len())
            .finish()
    }
}

impl fmt::Display for CallStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())
    }
}

/// Validate a procedure name to prevent SQL injection.
#[allow(clippy::unwrap_used)]
fn validate_procedure_name(name: &str) -> Result<()> {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static PROCEDURE_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]{0,63}(\.[A-Za-z_][A-Za-z0-9_$]{0,63})?$").unwrap()
    });

    if name.is_empty() {
        return Err(Error::InvalidIdentifier(
            "procedure name cannot be empty".into(),
        ));
    }

    if !PROCEDURE_RE.is_match(name) {
        return Err(Error::InvalidIdentifier(format!(
            "invalid procedure name '{name}': must start with letter/underscore, \
             contain only alphanumerics/_/$, optionally be schema-qualified, \
             and be at most 64 characters per part"
        )));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_three_params() {
        let stmt = CallStatement::new(
            "set_user_insert",
            vec![SqlValue::from("a"), SqlValue::from("b"), SqlValue::from("c")],
        )
        .unwrap();

        assert_eq!(stmt.sql(), "CALL set_user_insert(%s, %s, %s)");
        assert_eq!(
            stmt.params(),
            &[SqlValue::from("a"), SqlValue::from("b"), SqlValue::from("c")]
        );
    }

    #[test]
    fn test_no_params() {
        let stmt = CallStatement::without_params("get_user_stats").unwrap();
        assert_eq!(stmt.sql(), "CALL get_user_stats()");
        assert!(stmt.params().is_empty());

        let stmt = CallStatement::new("get_user_stats", Vec::new()).unwrap();
        assert_eq!(stmt.to_string(), "CALL get_user_stats()");
    }

    #[test]
    fn test_question_mark_style() {
        let stmt = CallStatement::new("get_user_login", vec![SqlValue::from("x"), SqlValue::Null]).unwrap();
        assert_eq!(stmt.sql_with(ParamStyle::QuestionMark), "CALL get_user_login(?, ?)");
    }

    #[test]
    fn test_schema_qualified_name() {
        assert!(CallStatement::without_params("broffice.get_user_list").is_ok());
    }

    #[test]
    fn test_rejects_injection() {
        for name in [
            "",
            "get_user(); DROP TABLE users; --",
            "get user",
            "1get_user",
            "a.b.c",
            "get_user`",
        ] {
            let err = CallStatement::without_params(name).unwrap_err();
            assert!(matches!(err, Error::InvalidIdentifier(_)), "accepted {name:?}");
        }
    }

    #[test]
    fn test_debug_hides_values() {
        let stmt = CallStatement::new("get_user_login", vec![SqlValue::from("secret-pw")]).unwrap();
        let debug = format!("{stmt:?}");
        assert!(!debug.contains("secret-pw"));
        assert!(debug.contains("param_count: 1"));
    }

    proptest! {
        #[test]
        fn prop_placeholder_count_matches_params(n in 0usize..40) {
            let params: Vec<SqlValue> = (0..n as i64).map(SqlValue::from).collect();
            let stmt = CallStatement::new("get_task_list", params).unwrap();
            let sql = stmt.sql();
            prop_assert_eq!(sql.matches("%s").count(), n);
            prop_assert_eq!(stmt.params().len(), n);
            prop_assert!(sql.starts_with("CALL get_task_list("));
            prop_assert!(sql.ends_with(')'));
        }

        #[test]
        fn prop_values_never_reach_sql_text(s in "[a-z';() -]{1,24}") {
            let stmt = CallStatement::new("set_notice_insert", vec![SqlValue::from(s.clone())]).unwrap();
            prop_assert_eq!(stmt.sql(), "CALL set_notice_insert(%s)");
        }
    }
}
