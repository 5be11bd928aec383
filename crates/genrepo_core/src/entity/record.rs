//! Provider-neutral row representation.
//!
//! # Responsibility
//! - Carry column values between entities and the persistence provider.
//! - Report mapping failures with the offending column name.
//!
//! # Invariants
//! - Column order in a `Record` is insertion order and is preserved when
//!   rendered into SQL.
//! - Lookups are by exact column name.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// One cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Short type label used in mapping errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Error raised while converting between `Record` and an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingError {
    MissingColumn(String),
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
    InvalidValue {
        column: String,
        message: String,
    },
}

impl Display for MappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingColumn(column) => write!(f, "column `{column}` missing from record"),
            Self::TypeMismatch {
                column,
                expected,
                found,
            } => write!(f, "column `{column}` expected {expected}, found {found}"),
            Self::InvalidValue { column, message } => {
                write!(f, "invalid value in column `{column}`: {message}")
            }
        }
    }
}

impl Error for MappingError {}

/// Ordered set of named column values for one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Sets a column value, replacing an existing value with the same name.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    fn required(&self, column: &str) -> Result<&Value, MappingError> {
        self.get(column)
            .ok_or_else(|| MappingError::MissingColumn(column.to_string()))
    }

    pub fn integer(&self, column: &str) -> Result<i64, MappingError> {
        match self.required(column)? {
            Value::Integer(value) => Ok(*value),
            other => Err(mismatch(column, "integer", other)),
        }
    }

    pub fn opt_integer(&self, column: &str) -> Result<Option<i64>, MappingError> {
        match self.required(column)? {
            Value::Null => Ok(None),
            Value::Integer(value) => Ok(Some(*value)),
            other => Err(mismatch(column, "integer", other)),
        }
    }

    /// Reads a real column; integer cells are widened.
    pub fn real(&self, column: &str) -> Result<f64, MappingError> {
        match self.required(column)? {
            Value::Real(value) => Ok(*value),
            Value::Integer(value) => Ok(*value as f64),
            other => Err(mismatch(column, "real", other)),
        }
    }

    pub fn text(&self, column: &str) -> Result<String, MappingError> {
        match self.required(column)? {
            Value::Text(value) => Ok(value.clone()),
            other => Err(mismatch(column, "text", other)),
        }
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>, MappingError> {
        match self.required(column)? {
            Value::Null => Ok(None),
            Value::Text(value) => Ok(Some(value.clone())),
            other => Err(mismatch(column, "text", other)),
        }
    }

    /// Reads a `0`/`1` integer column as a flag.
    pub fn boolean(&self, column: &str) -> Result<bool, MappingError> {
        match self.integer(column)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(MappingError::InvalidValue {
                column: column.to_string(),
                message: format!("expected 0 or 1, found {other}"),
            }),
        }
    }
}

fn mismatch(column: &str, expected: &'static str, found: &Value) -> MappingError {
    MappingError::TypeMismatch {
        column: column.to_string(),
        expected,
        found: found.type_name(),
    }
}
