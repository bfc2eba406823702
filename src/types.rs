use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde_json::Value as JsonValue;

use crate::error::SqlMapperError;

/// Values that can be stored in a database row or bound to a named placeholder.
///
/// Every backend converts to and from this one enum, so facade code never branches on driver
/// types:
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let values = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = values;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Booleans come back from `SQLite` as `0`/`1`, so integers are accepted too.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RowValues::Bool(value) => Some(*value),
            RowValues::Int(1) => Some(true),
            RowValues::Int(0) => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(dt);
                }
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Convert into a JSON value for row-to-model mapping.
    ///
    /// Timestamps become ISO-8601 strings (what chrono's serde impl expects), blobs become
    /// arrays of bytes, and non-finite floats become `null`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            RowValues::Int(i) => JsonValue::from(*i),
            RowValues::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(JsonValue::Null, JsonValue::Number),
            RowValues::Text(s) => JsonValue::String(s.clone()),
            RowValues::Bool(b) => JsonValue::Bool(*b),
            RowValues::Timestamp(dt) => {
                JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            RowValues::Null => JsonValue::Null,
            RowValues::JSON(value) => value.clone(),
            RowValues::Blob(bytes) => {
                JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect())
            }
        }
    }

    /// Build a parameter value from a JSON value.
    ///
    /// Scalars map onto their natural variant; arrays and objects are bound as `JSON`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ParameterError` for numbers that fit neither `i64` nor `f64`.
    pub fn from_json(value: JsonValue) -> Result<Self, SqlMapperError> {
        Ok(match value {
            JsonValue::Null => RowValues::Null,
            JsonValue::Bool(b) => RowValues::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RowValues::Int(i)
                } else if let Some(f) = n.as_f64() {
                    RowValues::Float(f)
                } else {
                    return Err(SqlMapperError::ParameterError(format!(
                        "number {n} cannot be represented as i64 or f64"
                    )));
                }
            }
            JsonValue::String(s) => RowValues::Text(s),
            other @ (JsonValue::Array(_) | JsonValue::Object(_)) => RowValues::JSON(other),
        })
    }
}

macro_rules! row_value_from {
    ($($ty:ty => |$v:ident| $conv:expr),+ $(,)?) => {
        $(
            impl From<$ty> for RowValues {
                fn from($v: $ty) -> Self {
                    $conv
                }
            }
        )+
    };
}

row_value_from! {
    i64 => |v| RowValues::Int(v),
    i32 => |v| RowValues::Int(i64::from(v)),
    i16 => |v| RowValues::Int(i64::from(v)),
    u32 => |v| RowValues::Int(i64::from(v)),
    f64 => |v| RowValues::Float(v),
    f32 => |v| RowValues::Float(f64::from(v)),
    bool => |v| RowValues::Bool(v),
    String => |v| RowValues::Text(v),
    &str => |v| RowValues::Text(v.to_owned()),
    NaiveDateTime => |v| RowValues::Timestamp(v),
    JsonValue => |v| RowValues::JSON(v),
    Vec<u8> => |v| RowValues::Blob(v),
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// The database type supported by this mapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum DatabaseType {
    /// `PostgreSQL` database
    #[cfg(feature = "postgres")]
    Postgres,
    /// `SQLite` database
    #[cfg(feature = "sqlite")]
    Sqlite,
}

/// Result of a mutating statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Rows inserted, updated or deleted.
    pub rows_affected: u64,
    /// Rowid generated by an `INSERT` on `SQLite`. Postgres callers should use
    /// `RETURNING id` with `fetch_val` instead.
    pub last_insert_id: Option<i64>,
}
