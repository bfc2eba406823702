use std::error::Error;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::{Row, Statement};

use crate::error::SqlMapperError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Build a result set from the rows of a prepared statement.
///
/// Column names come from the statement, so an empty result still reports its projection.
///
/// # Errors
/// Returns errors from result processing.
pub fn build_result_set(stmt: &Statement, rows: &[Row]) -> Result<ResultSet, SqlMapperError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let col_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(rows.len());
    result_set.set_column_names(Arc::new(column_names));

    for row in rows {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(postgres_extract_value(row, i)?);
        }
        result_set.add_row_values(row_values)?;
    }

    Ok(result_set)
}

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// `numeric` is read as a float. Other types without a dedicated variant are read as text when
/// their wire bytes are UTF-8 (`uuid` is formatted), and as a blob otherwise.
///
/// # Errors
/// Returns `SqlMapperError::PostgresError` if the column cannot be retrieved.
pub fn postgres_extract_value(row: &Row, idx: usize) -> Result<RowValues, SqlMapperError> {
    let type_info = row.columns()[idx].type_();

    let value = match type_info.name() {
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(RowValues::Int),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| RowValues::Float(f64::from(v))),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(RowValues::Float),
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(RowValues::Bool),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(RowValues::Timestamp),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| RowValues::Timestamp(v.naive_utc())),
        "date" => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|v| RowValues::Timestamp(v.and_time(chrono::NaiveTime::MIN))),
        "json" | "jsonb" => row.try_get::<_, Option<Value>>(idx)?.map(RowValues::JSON),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(RowValues::Blob),
        "numeric" => row
            .try_get::<_, Option<Numeric>>(idx)?
            .map(|n| RowValues::Float(n.0)),
        "oid" => row
            .try_get::<_, Option<u32>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        _ => row.try_get::<_, Option<Fallback>>(idx)?.map(|f| f.0),
    };
    Ok(value.unwrap_or(RowValues::Null))
}

type WireError = Box<dyn Error + Sync + Send>;

/// `numeric` in the binary wire format, converted to `f64`.
struct Numeric(f64);

impl<'a> FromSql<'a> for Numeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, WireError> {
        decode_numeric(raw).map(Numeric)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

// header: ndigits, weight, sign, dscale; then ndigits base-10000 digits, all big-endian 16 bit
fn decode_numeric(raw: &[u8]) -> Result<f64, WireError> {
    let word = |i: usize| -> Result<u16, WireError> {
        raw.get(i * 2..i * 2 + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated numeric value".into())
    };
    let ndigits = i32::from(word(0)?);
    let weight = i32::from(word(1)? as i16);
    let digit = |pos: i32| -> Result<u16, WireError> {
        if pos < 0 || pos >= ndigits {
            Ok(0)
        } else {
            word(4 + pos as usize)
        }
    };

    let mut text = String::new();
    match word(2)? {
        0x0000 => {}
        0x4000 => text.push('-'),
        0xC000 => return Ok(f64::NAN),
        0xD000 => return Ok(f64::INFINITY),
        0xF000 => return Ok(f64::NEG_INFINITY),
        other => return Err(format!("unknown numeric sign {other:#06x}").into()),
    }
    if weight < 0 {
        text.push('0');
    }
    for pos in 0..=weight {
        if pos == 0 {
            write!(text, "{}", digit(pos)?)?;
        } else {
            write!(text, "{:04}", digit(pos)?)?;
        }
    }
    if ndigits > weight + 1 {
        text.push('.');
        for pos in weight + 1..ndigits {
            write!(text, "{:04}", digit(pos)?)?;
        }
    }
    Ok(text.parse::<f64>()?)
}

/// Any other column: its wire bytes as text when they are UTF-8, else as a blob.
struct Fallback(RowValues);

impl<'a> FromSql<'a> for Fallback {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, WireError> {
        if *ty == Type::UUID && raw.len() == 16 {
            let mut text = String::with_capacity(36);
            for (i, b) in raw.iter().enumerate() {
                if matches!(i, 4 | 6 | 8 | 10) {
                    text.push('-');
                }
                write!(text, "{b:02x}")?;
            }
            return Ok(Fallback(RowValues::Text(text)));
        }
        Ok(Fallback(match std::str::from_utf8(raw) {
            Ok(text) => RowValues::Text(text.to_owned()),
            Err(_) => RowValues::Blob(raw.to_vec()),
        }))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}
