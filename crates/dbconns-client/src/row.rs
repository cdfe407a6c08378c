//! Row representation for procedure results.
//!
//! A [`Row`] is an ordered field→value mapping. Column metadata is shared
//! between all rows of one result set, so cloning a row only clones its
//! values.

use std::sync::Arc;

use dbconns_types::{FromSql, SqlValue, TypeError};

/// Column metadata describing a result set column.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future versions without breaking semver compatibility. Use
/// [`Column::new()`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Column {
    /// Column name (or alias) as reported by the server.
    pub name: String,
    /// Column index (0-based).
    pub index: usize,
    /// Database type name (e.g., "BIGINT", "VARCHAR").
    pub type_name: String,
}

impl Column {
    /// Create a new column.
    pub fn new(name: impl Into<String>, index: usize, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index,
            type_name: type_name.into(),
        }
    }
}

/// A row from a procedure result set.
#[derive(Clone, PartialEq)]
pub struct Row {
    columns: Arc<[Column]>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Create a row from shared column metadata and values.
    ///
    /// Returns `None` if the number of values does not match the columns.
    #[must_use]
    pub fn new(columns: Arc<[Column]>, values: Vec<SqlValue>) -> Option<Self> {
        (columns.len() == values.len()).then_some(Self { columns, values })
    }

    /// Create a row from `(name, value)` pairs.
    ///
    /// Column type names are taken from the values themselves.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        let (columns, values): (Vec<Column>, Vec<SqlValue>) = pairs
            .into_iter()
            .enumerate()
            .map(|(index, (name, value))| {
                let value = value.into();
                (Column::new(name, index, value.type_name()), value)
            })
            .unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    /// Get a typed value by column index.
    pub fn get<T: FromSql>(&self, index: usize) -> Result<T, TypeError> {
        let value = self.values.get(index).ok_or(TypeError::OutOfRange {
            target_type: "column index",
        })?;
        T::from_sql(value)
    }

    /// Get a typed value by column name.
    ///
    /// Names are matched exactly first, then case-insensitively.
    pub fn get_by_name<T: FromSql>(&self, name: &str) -> Result<T, TypeError> {
        let index = self.find_column(name).ok_or_else(|| TypeError::TypeMismatch {
            expected: "existing column",
            actual: format!("no column named {name}"),
        })?;
        self.get(index)
    }

    /// Get a typed value by index, returning `None` on NULL or conversion failure.
    #[must_use]
    pub fn try_get<T: FromSql>(&self, index: usize) -> Option<T> {
        self.values
            .get(index)
            .and_then(|v| T::from_sql_nullable(v).ok().flatten())
    }

    /// Get a typed value by name, returning `None` on NULL, missing column or
    /// conversion failure.
    #[must_use]
    pub fn try_get_by_name<T: FromSql>(&self, name: &str) -> Option<T> {
        self.find_column(name).and_then(|i| self.try_get(i))
    }

    /// Get the raw value by index.
    #[must_use]
    pub fn get_raw(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Get the raw value by column name.
    #[must_use]
    pub fn get_raw_by_name(&self, name: &str) -> Option<&SqlValue> {
        self.find_column(name).and_then(|i| self.values.get(i))
    }

    /// Check whether a column with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.find_column(name).is_some()
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column metadata.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Iterate over `(column name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .zip(self.values.iter())
    }

    /// Consume the row, returning its values in column order.
    #[must_use]
    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    fn find_column(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name)))
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
