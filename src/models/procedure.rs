//! Procedure call data models.
//!
//! This module defines the values bound to a stored procedure call, the
//! declared output slots, and the call itself.

use crate::error::{DbError, DbResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A value bound to, or read back from, a procedure parameter or result column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// NULL value
    Null,
    /// Boolean value (TINYINT(1) / BOOLEAN)
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Calendar date
    Date(NaiveDate),
    /// String value
    Text(String),
}

impl SqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Date(_) => "date",
            Self::Text(_) => "text",
        }
    }

    /// Read the value as an integer.
    ///
    /// Session variables come back from MySQL as text or as integers
    /// depending on the server version, so numeric text is accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(v) => Some(i64::from(*v)),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Null | Self::Date(_) => None,
        }
    }

    /// Read the value as a boolean flag. Any non-zero integer is `true`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            other => other.as_i64().map(|v| v != 0),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// SQL type of a declared output parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    Integer,
    TinyInt,
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::TinyInt => write!(f, "TINYINT"),
        }
    }
}

/// An output parameter slot, declared by 1-based position and SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutParam {
    pub position: usize,
    pub sql_type: SqlType,
}

/// One positional parameter of a call, after inputs and outputs are merged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamSlot<'a> {
    In(&'a SqlValue),
    Out(OutParam),
}

/// A stored procedure invocation: name, ordered inputs, declared outputs.
///
/// Inputs fill every position not declared as an output, in order.
///
/// ```ignore
/// let call = ProcedureCall::new("getCallList")
///     .arg(clinic_id)
///     .arg(subject)
///     .arg(reference_chars)
///     .out(4, SqlType::Integer);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureCall {
    name: String,
    inputs: Vec<SqlValue>,
    outputs: Vec<OutParam>,
}

impl ProcedureCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Append the next input value.
    pub fn arg(mut self, value: impl Into<SqlValue>) -> Self {
        self.inputs.push(value.into());
        self
    }

    /// Declare an output parameter at a 1-based position.
    pub fn out(mut self, position: usize, sql_type: SqlType) -> Self {
        self.outputs.push(OutParam { position, sql_type });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[SqlValue] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutParam] {
        &self.outputs
    }

    /// Total number of parameters in the call.
    pub fn arity(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }

    /// Whether `position` is a declared output.
    pub fn declares_output(&self, position: usize) -> bool {
        self.outputs.iter().any(|o| o.position == position)
    }

    /// Check the call before anything is sent to the server.
    pub fn validate(&self) -> DbResult<()> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(DbError::invalid_input(format!(
                "Invalid procedure name '{}': only ASCII letters, digits and '_' are allowed",
                self.name
            )));
        }

        let arity = self.arity();
        for (idx, out) in self.outputs.iter().enumerate() {
            if out.position == 0 || out.position > arity {
                return Err(DbError::invalid_input(format!(
                    "Output position {} of {} is outside 1..={}",
                    out.position, self.name, arity
                )));
            }
            if self.outputs[..idx].iter().any(|o| o.position == out.position) {
                return Err(DbError::invalid_input(format!(
                    "Output position {} of {} is declared twice",
                    out.position, self.name
                )));
            }
        }
        Ok(())
    }

    /// Parameters in positional order, inputs interleaved around outputs.
    pub fn slots(&self) -> Vec<ParamSlot<'_>> {
        let mut inputs = self.inputs.iter();
        (1..=self.arity())
            .filter_map(|position| {
                match self.outputs.iter().find(|o| o.position == position) {
                    Some(out) => Some(ParamSlot::Out(*out)),
                    None => inputs.next().map(ParamSlot::In),
                }
            })
            .collect()
    }
}
