//! Data models for the clinic registry gateway.
//!
//! This module re-exports all model types used throughout the application.

pub mod outcome;
pub mod procedure;
pub mod records;

// Re-export commonly used types
pub use outcome::Outcome;
pub use procedure::{OutParam, ParamSlot, ProcedureCall, SqlType, SqlValue};
pub use records::{
    CallListEntry, CallListSubject, Clinic, EmailMessageEntry, LAB_REMINDER, LastMeasurement,
    MeasurementKind, Medication, SignInStatus, Therapy, TreatmentHistory, TreatmentRecord,
    UserProfile, VISIT_REMINDER,
};
