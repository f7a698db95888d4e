//! Domain records produced by the gateways.
//!
//! Each record is fully built from one or more rows before it is appended to
//! its output collection. Nullable columns map to `Option` fields.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Subject string stored for clinic visit reminders.
pub const VISIT_REMINDER: &str = "Clinic Visit Reminder";

/// Subject string stored for lab work reminders.
pub const LAB_REMINDER: &str = "Lab Work Reminder";

/// Which last-measurement date a call-list row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    BloodPressure,
    A1c,
}

impl MeasurementKind {
    /// Result column holding the date of the last measurement.
    pub fn column_label(&self) -> &'static str {
        match self {
            Self::BloodPressure => "last BP date",
            Self::A1c => "last A1C date",
        }
    }
}

/// Subject of a call list.
///
/// The subject is passed to the procedure as text and also decides which
/// last-measurement column is read from each row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallListSubject {
    VisitReminder,
    LabReminder,
    Custom(String),
}

impl CallListSubject {
    pub fn as_str(&self) -> &str {
        match self {
            Self::VisitReminder => VISIT_REMINDER,
            Self::LabReminder => LAB_REMINDER,
            Self::Custom(s) => s,
        }
    }

    pub fn measurement(&self) -> Option<MeasurementKind> {
        match self {
            Self::VisitReminder => Some(MeasurementKind::BloodPressure),
            Self::LabReminder => Some(MeasurementKind::A1c),
            Self::Custom(_) => None,
        }
    }
}

impl FromStr for CallListSubject {
    type Err = std::convert::Infallible;

    /// Accepts the stored subject strings as well as the short forms
    /// `visit` and `lab`. Anything else is a custom subject.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(if trimmed == VISIT_REMINDER || trimmed.eq_ignore_ascii_case("visit") {
            Self::VisitReminder
        } else if trimmed == LAB_REMINDER || trimmed.eq_ignore_ascii_case("lab") {
            Self::LabReminder
        } else {
            Self::Custom(trimmed.to_string())
        })
    }
}

impl std::fmt::Display for CallListSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A patient to contact, as listed by `getCallList`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallListEntry {
    pub patient_id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub language: Option<String>,
    /// Only set for visit and lab reminders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_measurement: Option<LastMeasurement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMeasurement {
    pub kind: MeasurementKind,
    pub date: Option<NaiveDate>,
}

/// A localized message body for a call-list subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessageEntry {
    pub subject: String,
    pub language: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Therapy {
    pub prescription_class: Option<String>,
    pub therapy_type: Option<String>,
    pub date_reviewed: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub medication_id: Option<String>,
    pub medication_name: Option<String>,
    pub medication_class: Option<String>,
    pub date_reviewed: Option<NaiveDate>,
}

/// Therapies and medications of one patient.
///
/// An empty sub-collection is `None`, never an empty vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentHistory {
    pub therapies: Option<Vec<Therapy>>,
    pub medications: Option<Vec<Medication>>,
}

/// Input for recording one treatment across several medications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentRecord {
    pub patient_id: i32,
    pub prescription_class: String,
    pub medications: Vec<String>,
    pub date: NaiveDate,
    pub user_name: String,
    pub clinic_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clinic {
    pub clinic_id: i32,
    pub clinic_name: Option<String>,
}

/// A signed-in user and the clinics they may work in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub administrator: bool,
    /// Assigned even when the user has no clinics.
    pub clinics: Vec<Clinic>,
}

/// Result of checking sign-in credentials against the output flags of
/// `authenticateUser`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInStatus {
    Authenticated,
    PasswordChange,
    Failed,
}

impl SignInStatus {
    /// Decide the status from the (authenticated, must change, call succeeded) flags.
    pub fn from_flags(authenticated: bool, password_change: bool, succeeded: bool) -> Self {
        if !succeeded {
            Self::Failed
        } else if password_change {
            Self::PasswordChange
        } else if authenticated {
            Self::Authenticated
        } else {
            Self::Failed
        }
    }
}
