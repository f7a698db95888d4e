//! Treatment recording and history.

use crate::db::connection::{ConnectionPool, ProcedureConnection};
use crate::db::invoker::PreparedCall;
use crate::db::mapper::{drain_first, drain_next};
use crate::db::transaction::{BatchTemplate, execute_atomic};
use crate::db::types::ResultRow;
use crate::error::DbResult;
use crate::leased;
use crate::models::{
    Medication, Outcome, ProcedureCall, SqlType, SqlValue, Therapy, TreatmentHistory,
    TreatmentRecord,
};
use std::sync::Arc;
use tracing::info;

/// Position of the medication name among the `addTreatment` inputs.
const MEDICATION_POSITION: usize = 3;

#[derive(Clone)]
pub struct TreatmentGateway {
    pool: Arc<dyn ConnectionPool>,
}

impl TreatmentGateway {
    pub fn new(pool: Arc<dyn ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Record one treatment row per medication. All rows persist or none do.
    pub async fn record_treatment(&self, record: &TreatmentRecord) -> Outcome<()> {
        let result = leased!(&self.pool, "record_treatment", |conn| {
            record_treatment(conn, record)
        });
        match result {
            Ok(rows) => {
                info!(
                    patient_id = record.patient_id,
                    medications = record.medications.len(),
                    rows,
                    "Treatment recorded"
                );
                Outcome::Success(())
            }
            Err(e) => Outcome::Failure(e),
        }
    }

    /// Therapies and medications of `patient_id`.
    ///
    /// `NotFound` when either cursor is missing, even if therapies were read.
    /// When both cursors are present, an empty one becomes a `None` field.
    pub async fn fetch_treatments(&self, patient_id: i32) -> Outcome<TreatmentHistory> {
        let result = leased!(&self.pool, "fetch_treatments", |conn| {
            fetch_treatments(conn, patient_id)
        });
        Outcome::from_lookup(result)
    }
}

async fn record_treatment(
    conn: &mut dyn ProcedureConnection,
    record: &TreatmentRecord,
) -> DbResult<u64> {
    let template = BatchTemplate::new(
        "addTreatment",
        vec![
            SqlValue::from(record.patient_id),
            SqlValue::from(record.prescription_class.as_str()),
            SqlValue::from(record.date),
            SqlValue::from(record.user_name.as_str()),
            SqlValue::from(record.clinic_id),
        ],
        MEDICATION_POSITION,
    )?;
    execute_atomic(
        conn,
        &template,
        record.medications.iter().map(String::as_str),
    )
    .await
}

async fn fetch_treatments(
    conn: &mut dyn ProcedureConnection,
    patient_id: i32,
) -> DbResult<Option<TreatmentHistory>> {
    let call = ProcedureCall::new("getTreatment")
        .arg(patient_id)
        .out(2, SqlType::TinyInt);

    let mut prepared = PreparedCall::prepare(conn, call)?;
    prepared.execute().await?;

    let Some(therapies) = drain_first(&mut prepared, therapy).await? else {
        return Ok(None);
    };
    let Some(medications) = drain_next(&mut prepared, medication).await? else {
        return Ok(None);
    };
    prepared.close().await?;

    Ok(Some(TreatmentHistory {
        therapies: non_empty(therapies),
        medications: non_empty(medications),
    }))
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

fn therapy(row: &ResultRow) -> DbResult<Therapy> {
    Ok(Therapy {
        prescription_class: row.get_string("rx class")?,
        therapy_type: row.get_string("therapy type")?,
        date_reviewed: row.get_date("date recorded")?,
    })
}

fn medication(row: &ResultRow) -> DbResult<Medication> {
    Ok(Medication {
        medication_id: row.get_string("med id")?,
        medication_name: row.get_string("med name")?,
        medication_class: row.get_string("med class")?,
        date_reviewed: row.get_date("date recorded")?,
    })
}
