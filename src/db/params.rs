//! Parameter binding utilities for procedure calls.
//!
//! This module renders the `CALL` statement for a [`ProcedureCall`] and binds
//! its input values, in declared order, to a MySQL query object.

use crate::models::{ParamSlot, ProcedureCall, SqlValue};
use sqlx::MySql;
use sqlx::mysql::MySqlArguments;

/// Session variable that receives the output parameter at `position`.
pub(crate) fn output_variable(position: usize) -> String {
    format!("@out_{}", position)
}

/// Render `CALL name(?, ?, @out_N)` for a validated call.
pub(crate) fn call_sql(call: &ProcedureCall) -> String {
    let params = call
        .slots()
        .into_iter()
        .map(|slot| match slot {
            ParamSlot::In(_) => "?".to_string(),
            ParamSlot::Out(out) => output_variable(out.position),
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("CALL {}({})", call.name(), params)
}

/// Column label under which the output at `position` is read back.
pub(crate) fn output_column(position: usize) -> String {
    format!("out_{}", position)
}

/// Render `SELECT @out_N AS out_N, ...` reading back every declared output.
pub(crate) fn outputs_sql(call: &ProcedureCall) -> Option<String> {
    if call.outputs().is_empty() {
        return None;
    }
    let columns = call
        .outputs()
        .iter()
        .map(|out| {
            format!(
                "{} AS {}",
                output_variable(out.position),
                output_column(out.position)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("SELECT {}", columns))
}

/// Bind a value to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q SqlValue,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
    }
}

/// Bind all inputs of a call, in order.
pub(crate) fn bind_inputs<'q>(
    mut query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    call: &'q ProcedureCall,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    for param in call.inputs() {
        query = bind_mysql_param(query, param);
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SqlType;

    #[test]
    fn test_call_sql_inputs_only() {
        let call = ProcedureCall::new("addTreatment")
            .arg(7)
            .arg("Insulin")
            .arg("Glargine");
        assert_eq!(call_sql(&call), "CALL addTreatment(?, ?, ?)");
        assert_eq!(outputs_sql(&call), None);
    }

    #[test]
    fn test_call_sql_with_outputs() {
        let call = ProcedureCall::new("getCallList")
            .arg(1)
            .arg("Lab Work Reminder")
            .arg("A")
            .out(4, SqlType::Integer);
        assert_eq!(call_sql(&call), "CALL getCallList(?, ?, ?, @out_4)");
        assert_eq!(outputs_sql(&call).as_deref(), Some("SELECT @out_4 AS out_4"));
    }

    #[test]
    fn test_outputs_sql_lists_every_flag() {
        let call = ProcedureCall::new("authenticateUser")
            .arg("alice")
            .arg("hash")
            .out(3, SqlType::Integer)
            .out(4, SqlType::Integer)
            .out(5, SqlType::Integer);
        assert_eq!(
            outputs_sql(&call).as_deref(),
            Some("SELECT @out_3 AS out_3, @out_4 AS out_4, @out_5 AS out_5")
        );
    }
}
