//! Call-list retrieval.
//!
//! `getCallList` returns the patients a clinic should contact about a
//! subject; `getEmailMessages` returns the localized message bodies sent
//! with that subject. Both return a single cursor and a row-count output.

use crate::db::connection::{ConnectionPool, ProcedureConnection};
use crate::db::invoker::PreparedCall;
use crate::db::mapper::drain_first;
use crate::db::types::ResultRow;
use crate::error::DbResult;
use crate::leased;
use crate::models::{
    CallListEntry, CallListSubject, EmailMessageEntry, LastMeasurement, Outcome, ProcedureCall,
    SqlType,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct CallListGateway {
    pool: Arc<dyn ConnectionPool>,
}

impl CallListGateway {
    pub fn new(pool: Arc<dyn ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Patients of `clinic_id` to contact about `subject`.
    ///
    /// The subject decides which last-measurement date is read from each row.
    pub async fn fetch_call_list(
        &self,
        clinic_id: i32,
        subject: &CallListSubject,
        reference_chars: &str,
    ) -> Outcome<Vec<CallListEntry>> {
        let result = leased!(&self.pool, "fetch_call_list", |conn| {
            fetch_call_list(conn, clinic_id, subject, reference_chars)
        });
        Outcome::from_rows(result)
    }

    /// Message bodies, one per language, for `subject` at `clinic_id`.
    pub async fn fetch_email_messages(
        &self,
        clinic_id: i32,
        subject: &CallListSubject,
    ) -> Outcome<Vec<EmailMessageEntry>> {
        let result = leased!(&self.pool, "fetch_email_messages", |conn| {
            fetch_email_messages(conn, clinic_id, subject)
        });
        Outcome::from_rows(result)
    }
}

async fn fetch_call_list(
    conn: &mut dyn ProcedureConnection,
    clinic_id: i32,
    subject: &CallListSubject,
    reference_chars: &str,
) -> DbResult<Option<Vec<CallListEntry>>> {
    let call = ProcedureCall::new("getCallList")
        .arg(clinic_id)
        .arg(subject.as_str())
        .arg(reference_chars)
        .out(4, SqlType::Integer);

    let mut prepared = PreparedCall::prepare(conn, call)?;
    prepared.execute().await?;
    let entries = drain_first(&mut prepared, |row| call_list_entry(row, subject)).await?;
    prepared.close().await?;
    Ok(entries)
}

async fn fetch_email_messages(
    conn: &mut dyn ProcedureConnection,
    clinic_id: i32,
    subject: &CallListSubject,
) -> DbResult<Option<Vec<EmailMessageEntry>>> {
    let call = ProcedureCall::new("getEmailMessages")
        .arg(clinic_id)
        .arg(subject.as_str())
        .out(3, SqlType::Integer);

    let mut prepared = PreparedCall::prepare(conn, call)?;
    prepared.execute().await?;
    let messages = drain_first(&mut prepared, |row| {
        Ok(EmailMessageEntry {
            subject: subject.as_str().to_string(),
            language: row.get_string("language")?,
            message: row.get_string("message")?,
        })
    })
    .await?;
    prepared.close().await?;
    Ok(messages)
}

fn call_list_entry(row: &ResultRow, subject: &CallListSubject) -> DbResult<CallListEntry> {
    let last_measurement = match subject.measurement() {
        Some(kind) => Some(LastMeasurement {
            kind,
            date: row.get_date(kind.column_label())?,
        }),
        None => None,
    };

    Ok(CallListEntry {
        patient_id: row.get_i32("patient id")?,
        first_name: row.get_string("first name")?,
        last_name: row.get_string("last name")?,
        birth_date: row.get_date("birth date")?,
        contact_number: row.get_string("contact number")?,
        email: row.get_string("email")?,
        language: row.get_string("language")?,
        last_measurement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MeasurementKind, SqlValue};
    use chrono::NaiveDate;

    fn patient_row(date_label: &str) -> ResultRow {
        ResultRow::from_pairs([
            ("patient id", SqlValue::from(12)),
            ("first name", SqlValue::from("Ana")),
            ("last name", SqlValue::from("Lopez")),
            (
                "birth date",
                SqlValue::from(NaiveDate::from_ymd_opt(1961, 4, 2).unwrap()),
            ),
            ("contact number", SqlValue::from("555-0101")),
            ("email", SqlValue::Null),
            ("language", SqlValue::from("Spanish")),
            (
                date_label,
                SqlValue::from(NaiveDate::from_ymd_opt(2016, 11, 30).unwrap()),
            ),
        ])
    }

    #[test]
    fn test_visit_reminder_reads_bp_date() {
        let entry =
            call_list_entry(&patient_row("last BP date"), &CallListSubject::VisitReminder).unwrap();
        assert_eq!(entry.patient_id, 12);
        assert_eq!(entry.email, None);
        assert_eq!(
            entry.last_measurement,
            Some(LastMeasurement {
                kind: MeasurementKind::BloodPressure,
                date: NaiveDate::from_ymd_opt(2016, 11, 30),
            })
        );
    }

    #[test]
    fn test_lab_reminder_reads_a1c_date() {
        let entry =
            call_list_entry(&patient_row("last A1C date"), &CallListSubject::LabReminder).unwrap();
        assert_eq!(
            entry.last_measurement.map(|m| m.kind),
            Some(MeasurementKind::A1c)
        );
    }

    #[test]
    fn test_custom_subject_has_no_measurement() {
        let subject = CallListSubject::Custom("Flu Shot".to_string());
        let entry = call_list_entry(&patient_row("last BP date"), &subject).unwrap();
        assert_eq!(entry.last_measurement, None);
    }

    #[test]
    fn test_missing_measurement_column_is_error() {
        assert!(
            call_list_entry(&patient_row("last BP date"), &CallListSubject::LabReminder).is_err()
        );
    }
}
