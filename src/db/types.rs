//! Result rows and MySQL type mappings.
//!
//! Rows are decoded eagerly into [`ResultRow`] so that a cursor can be
//! drained without holding a borrow on the driver connection.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. The MySQL decoder handles the actual value extraction

use crate::error::{DbError, DbResult};
use crate::models::SqlValue;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo};
use std::sync::Arc;

// =============================================================================
// Result Rows
// =============================================================================

/// One row of a result cursor, addressed by column label.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl ResultRow {
    /// Create a row. `values` must line up with `columns`.
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> DbResult<Self> {
        if columns.len() != values.len() {
            return Err(DbError::internal(format!(
                "Row has {} values for {} columns",
                values.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, values })
    }

    /// Build a row from `(label, value)` pairs.
    pub fn from_pairs<I, S, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<SqlValue>,
    {
        let (columns, values): (Vec<String>, Vec<SqlValue>) = pairs
            .into_iter()
            .map(|(label, value)| (label.into(), value.into()))
            .unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the column with this label (case-insensitive, first match).
    pub fn get(&self, label: &str) -> DbResult<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(label))
            .map(|idx| &self.values[idx])
            .ok_or_else(|| DbError::schema(format!("Column not found: {}", label), label))
    }

    /// Integer column. NULL reads as 0.
    pub fn get_i32(&self, label: &str) -> DbResult<i32> {
        let value = self.get(label)?;
        if value.is_null() {
            return Ok(0);
        }
        value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| mismatch(label, "integer", value))
    }

    /// Flag column. NULL reads as `false`.
    pub fn get_bool(&self, label: &str) -> DbResult<bool> {
        let value = self.get(label)?;
        if value.is_null() {
            return Ok(false);
        }
        value
            .as_bool()
            .ok_or_else(|| mismatch(label, "boolean", value))
    }

    /// Text column. Integers and dates are rendered as text.
    pub fn get_string(&self, label: &str) -> DbResult<Option<String>> {
        Ok(match self.get(label)? {
            SqlValue::Null => None,
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Int(v) => Some(v.to_string()),
            SqlValue::Bool(v) => Some(v.to_string()),
            SqlValue::Date(d) => Some(d.to_string()),
        })
    }

    pub fn get_date(&self, label: &str) -> DbResult<Option<NaiveDate>> {
        let value = self.get(label)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_date()
            .map(Some)
            .ok_or_else(|| mismatch(label, "date", value))
    }
}

fn mismatch(label: &str, expected: &str, found: &SqlValue) -> DbError {
    DbError::schema(
        format!(
            "Column '{}' holds {} where {} was expected",
            label,
            found.type_name(),
            expected
        ),
        label,
    )
}

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for MySQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Boolean,
    Date,
    DateTime,
    Binary,
    Text,
}

/// Classify a MySQL type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Boolean first: sqlx reports TINYINT(1) as BOOLEAN
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") {
        return TypeCategory::Integer;
    }

    if lower == "date" {
        return TypeCategory::Date;
    }

    if lower == "datetime" || lower == "timestamp" {
        return TypeCategory::DateTime;
    }

    if lower.contains("blob") || lower.contains("binary") {
        return TypeCategory::Binary;
    }

    // varchar, char, text, decimal, enum, and session variables
    TypeCategory::Text
}

// =============================================================================
// MySQL Decoder
// =============================================================================

/// Decode a whole MySQL row, sharing `columns` across rows of one cursor.
pub fn decode_mysql_row(row: &MySqlRow, columns: &Arc<[String]>) -> DbResult<ResultRow> {
    let values = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| decode_column(row, idx, categorize_type(col.type_info().name())))
        .collect::<DbResult<Vec<_>>>()?;
    ResultRow::new(Arc::clone(columns), values)
}

/// Column labels of a MySQL row.
pub fn column_labels(row: &MySqlRow) -> Arc<[String]> {
    row.columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect::<Vec<_>>()
        .into()
}

fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> DbResult<SqlValue> {
    let value = match category {
        TypeCategory::Boolean => row.try_get::<Option<bool>, _>(idx)?.map(SqlValue::Bool),
        TypeCategory::Integer => decode_integer(row, idx)?,
        TypeCategory::Date => row.try_get::<Option<NaiveDate>, _>(idx)?.map(SqlValue::Date),
        TypeCategory::DateTime => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(|dt| SqlValue::Date(dt.date())),
        TypeCategory::Binary => row
            .try_get::<Option<Vec<u8>>, _>(idx)?
            .map(|bytes| SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned())),
        TypeCategory::Text => decode_text(row, idx)?,
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

fn decode_integer(row: &MySqlRow, idx: usize) -> DbResult<Option<SqlValue>> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return Ok(v.map(SqlValue::Int));
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return Ok(v.map(SqlValue::from));
    }
    if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
        return Ok(v.map(|v| SqlValue::Int(i64::from(v))));
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
        return Ok(v.map(|v| SqlValue::Int(i64::from(v))));
    }
    let v = row.try_get::<Option<u64>, _>(idx)?;
    v.map(|v| {
        i64::try_from(v)
            .map(SqlValue::Int)
            .map_err(|_| DbError::internal(format!("Unsigned value {} overflows i64", v)))
    })
    .transpose()
}

fn decode_text(row: &MySqlRow, idx: usize) -> DbResult<Option<SqlValue>> {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return Ok(v.map(SqlValue::Text));
    }
    // Session variables may come back as LONGBLOB
    let bytes = row.try_get::<Option<Vec<u8>>, _>(idx)?;
    Ok(bytes.map(|b| SqlValue::Text(String::from_utf8_lossy(&b).into_owned())))
}
