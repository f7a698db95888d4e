//! Atomic batched writes.
//!
//! A [`BatchTemplate`] describes a procedure whose parameters are all fixed
//! except one. [`execute_atomic`] binds the template once per value, runs
//! the resulting calls as one batch inside an explicit transaction, and
//! either commits every row or rolls back every row.

use crate::db::connection::ProcedureConnection;
use crate::error::{DbError, DbResult};
use crate::models::{ProcedureCall, SqlValue};
use tracing::{debug, error, warn};

/// A procedure call with one varying input.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTemplate {
    procedure: String,
    fixed: Vec<SqlValue>,
    /// 1-based position of the varying input.
    varying_position: usize,
}

impl BatchTemplate {
    /// `fixed` holds every input except the varying one, in order.
    pub fn new(
        procedure: impl Into<String>,
        fixed: Vec<SqlValue>,
        varying_position: usize,
    ) -> DbResult<Self> {
        let procedure = procedure.into();
        if varying_position == 0 || varying_position > fixed.len() + 1 {
            return Err(DbError::invalid_input(format!(
                "Varying position {} of {} is outside 1..={}",
                varying_position,
                procedure,
                fixed.len() + 1
            )));
        }
        Ok(Self {
            procedure,
            fixed,
            varying_position,
        })
    }

    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    /// Full call with `value` at the varying position.
    pub fn bind(&self, value: impl Into<SqlValue>) -> DbResult<ProcedureCall> {
        let mut value = Some(value.into());
        let mut fixed = self.fixed.iter().cloned();
        let mut call = ProcedureCall::new(self.procedure.as_str());
        for position in 1..=self.fixed.len() + 1 {
            let next = if position == self.varying_position {
                value.take()
            } else {
                fixed.next()
            };
            match next {
                Some(v) => call = call.arg(v),
                None => {
                    return Err(DbError::internal(format!(
                        "Template for {} ran out of inputs at position {}",
                        self.procedure, position
                    )));
                }
            }
        }
        call.validate()?;
        Ok(call)
    }
}

/// Run one call per value as a single transaction.
///
/// Returns the number of rows affected. On failure the batch is rolled back
/// and the original error is returned, even if the rollback also fails.
pub async fn execute_atomic<V>(
    conn: &mut dyn ProcedureConnection,
    template: &BatchTemplate,
    values: impl IntoIterator<Item = V>,
) -> DbResult<u64>
where
    V: Into<SqlValue>,
{
    let values: Vec<SqlValue> = values.into_iter().map(Into::into).collect();
    if values.is_empty() {
        return Err(DbError::invalid_input(format!(
            "Batch against {} needs at least one value",
            template.procedure()
        )));
    }

    conn.set_auto_commit(false).await?;

    match run_batch(conn, template, values).await {
        Ok(rows) => {
            if let Err(e) = conn.set_auto_commit(true).await {
                warn!(
                    procedure = %template.procedure(),
                    error = %e,
                    "Batch committed but autocommit could not be re-enabled"
                );
            }
            Ok(rows)
        }
        Err(err) => {
            if let Err(rollback_err) = conn.rollback().await {
                error!(
                    procedure = %template.procedure(),
                    error = %rollback_err,
                    "Rollback failed"
                );
            }
            if let Err(e) = conn.set_auto_commit(true).await {
                warn!(
                    procedure = %template.procedure(),
                    error = %e,
                    "Failed to re-enable autocommit after rollback"
                );
            }
            Err(err)
        }
    }
}

async fn run_batch(
    conn: &mut dyn ProcedureConnection,
    template: &BatchTemplate,
    values: Vec<SqlValue>,
) -> DbResult<u64> {
    let batch = values
        .into_iter()
        .map(|value| template.bind(value))
        .collect::<DbResult<Vec<_>>>()?;

    let rows = conn.execute_batch(&batch).await.map_err(|e| {
        DbError::transaction(format!("Batch failed: {}", e), template.procedure())
    })?;
    conn.commit().await.map_err(|e| {
        DbError::transaction(format!("Commit failed: {}", e), template.procedure())
    })?;

    debug!(
        procedure = %template.procedure(),
        batch_size = batch.len(),
        rows,
        "Batch committed"
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn treatment_template() -> BatchTemplate {
        BatchTemplate::new(
            "addTreatment",
            vec![
                SqlValue::from(7),
                SqlValue::from("Insulin"),
                SqlValue::from("2017-03-16"),
                SqlValue::from("alice"),
                SqlValue::from(2),
            ],
            3,
        )
        .unwrap()
    }

    #[test]
    fn test_bind_places_varying_value() {
        let call = treatment_template().bind("Glargine").unwrap();
        assert_eq!(call.name(), "addTreatment");
        assert_eq!(
            call.inputs(),
            &[
                SqlValue::from(7),
                SqlValue::from("Insulin"),
                SqlValue::from("Glargine"),
                SqlValue::from("2017-03-16"),
                SqlValue::from("alice"),
                SqlValue::from(2),
            ]
        );
    }

    #[test]
    fn test_bind_varying_last() {
        let template =
            BatchTemplate::new("addTreatment", vec![SqlValue::from(1)], 2).unwrap();
        let call = template.bind("x").unwrap();
        assert_eq!(call.inputs(), &[SqlValue::from(1), SqlValue::from("x")]);
    }

    #[test]
    fn test_varying_position_out_of_range() {
        assert!(BatchTemplate::new("addTreatment", vec![SqlValue::from(1)], 0).is_err());
        assert!(BatchTemplate::new("addTreatment", vec![SqlValue::from(1)], 3).is_err());
    }

    #[test]
    fn test_bind_rejects_bad_procedure_name() {
        let template = BatchTemplate::new("add treatment", Vec::new(), 1).unwrap();
        assert!(matches!(
            template.bind("x"),
            Err(DbError::InvalidInput { .. })
        ));
    }
}
