//! Identity & Patient Registry — the clinician account and the patients
//! it owns, including the patient lifecycle and the deletion cascade.
//!
//! Patient status transitions are clinician-driven and unrestricted among
//! ACTIVE, ARCHIVED and WAITLIST; what a status permits (new sessions,
//! evaluation-only intake) is the scheduler's concern.

use chrono::Utc;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{self, AccessContext};
use crate::binder;
use crate::db::repository;
use crate::error::CoreError;
use crate::models::{BillingDefaults, Clinician, Credential, NewPatient, Patient, PatientStatus};
use crate::txn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClinician {
    pub name: String,
    pub credential: Credential,
    pub currency: String,
    pub default_session_minutes: u32,
    pub default_session_price: Decimal,
    pub work_start_minute: Option<u32>,
    pub work_end_minute: Option<u32>,
}

/// Create the clinician account. Not patient-scoped, so not audited.
pub fn provision_clinician(
    conn: &mut Connection,
    new: &NewClinician,
) -> Result<Clinician, CoreError> {
    let clinician = Clinician {
        id: Uuid::new_v4(),
        name: new.name.clone(),
        credential: new.credential,
        currency: new.currency.clone(),
        default_session_minutes: new.default_session_minutes,
        default_session_price: new.default_session_price,
        work_start_minute: new.work_start_minute,
        work_end_minute: new.work_end_minute,
        created_at: Utc::now(),
    };
    txn::immediate(conn, |tx| {
        repository::insert_clinician(tx, &clinician)?;
        Ok(())
    })?;
    tracing::info!(clinician_id = %clinician.id, "Clinician provisioned");
    Ok(clinician)
}

/// Billing defaults and the working window are the only mutable fields.
pub fn update_billing_defaults(
    conn: &mut Connection,
    clinician_id: &Uuid,
    defaults: &BillingDefaults,
) -> Result<(), CoreError> {
    txn::immediate(conn, |tx| {
        repository::update_billing_defaults(tx, clinician_id, defaults)?;
        Ok(())
    })
}

pub fn register_patient(
    conn: &mut Connection,
    ctx: &AccessContext,
    new: &NewPatient,
) -> Result<Patient, CoreError> {
    let patient = Patient {
        id: Uuid::new_v4(),
        clinician_id: new.clinician_id,
        name: new.name.clone(),
        birth_date: new.birth_date,
        status: new.status,
        clinical_context: new.clinical_context.clone(),
        goals: new.goals.clone(),
        emergency_contact: new.emergency_contact.clone(),
        created_at: Utc::now(),
    };
    let result = txn::immediate(conn, |tx| {
        repository::insert_patient(tx, &patient)?;
        audit::record(
            tx,
            ctx,
            Some(patient.id),
            "register",
            "patients",
            None,
        )?;
        Ok(patient.clone())
    });
    audit::outcome(conn, ctx, Some(patient.id), "register", "patients", result)
}

/// Audited read of a single patient.
pub fn get_patient(
    conn: &Connection,
    ctx: &AccessContext,
    patient_id: &Uuid,
) -> Result<Patient, CoreError> {
    let result: Result<Patient, CoreError> = (|| {
        let patient = repository::get_patient(conn, patient_id)?
            .ok_or_else(|| CoreError::not_found("Patient", patient_id))?;
        audit::record(conn, ctx, Some(*patient_id), "read", "patients", None)?;
        Ok(patient)
    })();
    audit::outcome(conn, ctx, Some(*patient_id), "read", "patients", result)
}

/// Audited listing of a clinician's patients, optionally by status.
pub fn list_patients(
    conn: &Connection,
    ctx: &AccessContext,
    clinician_id: &Uuid,
    status: Option<PatientStatus>,
) -> Result<Vec<Patient>, CoreError> {
    let result: Result<Vec<Patient>, CoreError> = (|| {
        let patients = repository::list_patients(conn, clinician_id, status)?;
        audit::record(conn, ctx, None, "read", "patients", None)?;
        Ok(patients)
    })();
    audit::outcome(conn, ctx, None, "read", "patients", result)
}

/// Move a patient between ACTIVE, ARCHIVED and WAITLIST.
pub fn set_patient_status(
    conn: &mut Connection,
    ctx: &AccessContext,
    patient_id: &Uuid,
    status: PatientStatus,
) -> Result<Patient, CoreError> {
    let result = txn::immediate(conn, |tx| {
        let patient = repository::get_patient(tx, patient_id)?
            .ok_or_else(|| CoreError::not_found("Patient", patient_id))?;
        repository::update_patient_status(tx, patient_id, status)?;
        audit::record(
            tx,
            ctx,
            Some(*patient_id),
            "set_status",
            "patients",
            Some(format!("{} -> {}", patient.status.as_str(), status.as_str())),
        )?;
        Ok(Patient { status, ..patient })
    });
    audit::outcome(conn, ctx, Some(*patient_id), "set_status", "patients", result)
}

/// Delete a patient and everything that hangs off it: appointments with
/// their artifacts, and the patient's own access-log rows (this erasure
/// is the one sanctioned deletion path for the log). The erasure itself
/// is recorded as a new entry with the patient id in the detail, since
/// the patient row is gone.
pub fn delete_patient(
    conn: &mut Connection,
    ctx: &AccessContext,
    patient_id: &Uuid,
) -> Result<(), CoreError> {
    let result = txn::immediate(conn, |tx| {
        repository::get_patient(tx, patient_id)?
            .ok_or_else(|| CoreError::not_found("Patient", patient_id))?;

        let appointments = repository::list_appointments_for_patient(tx, patient_id)?;
        let mut artifacts = 0;
        for appt in &appointments {
            artifacts += binder::delete_appointment_cascade(tx, &appt.id)?;
        }
        let log_rows = repository::delete_access_entries_for_patient(tx, patient_id)?;
        repository::delete_patient_row(tx, patient_id)?;

        tracing::info!(
            patient_id = %patient_id,
            appointments = appointments.len(),
            artifacts,
            log_rows,
            "Patient erased with all dependent records"
        );

        audit::record(
            tx,
            ctx,
            None,
            "delete",
            "patients",
            Some(format!(
                "patient:{patient_id} appointments:{} artifacts:{artifacts} log_rows:{log_rows}",
                appointments.len()
            )),
        )?;
        Ok(())
    });
    // the patient row is gone; the denied path must not reference it either
    audit::outcome(conn, ctx, None, "delete", "patients", result)
}
