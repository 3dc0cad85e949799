//! Clinical Artifact Binder — at-most-one artifact of each kind per
//! appointment.
//!
//! The slot check and the insert run inside one immediate transaction,
//! with the UNIQUE(appointment_id) columns as a storage-level backstop.
//! Deleting an appointment (or, above it, a patient) removes every bound
//! artifact in the same transaction as the parent row.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{self, AccessContext};
use crate::config;
use crate::db::repository;
use crate::error::{ConflictError, CoreError, NotEligibleError, ValidationError};
use crate::models::{
    Appointment, AppointmentStatus, ArtifactKind, BodyMeasurement, ClinicalNote, FinanceTransaction,
    MealPlan, NoteTemplate, TransactionType,
};
use crate::txn;

// ─── Payloads ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClinicalNote {
    pub patient_id: Uuid,
    pub template: NoteTemplate,
    pub content: serde_json::Value,
    pub mood_rating: Option<i32>,
    pub private_notes: Option<String>,
    pub pinned: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBodyMeasurement {
    pub patient_id: Uuid,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub body_fat_pct: Option<f64>,
    pub waist_cm: Option<f64>,
    pub hip_cm: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMealPlan {
    pub patient_id: Uuid,
    pub description: Option<String>,
    pub file_ref: Option<String>,
}

/// A manually linked ledger row. Clinician and date come from the
/// appointment; unlike materialization, attaching twice is an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLinkedTransaction {
    pub transaction_type: TransactionType,
    pub category: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArtifactPayload {
    Note(NewClinicalNote),
    Measurement(NewBodyMeasurement),
    MealPlan(NewMealPlan),
    Transaction(NewLinkedTransaction),
}

impl ArtifactPayload {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Note(_) => ArtifactKind::ClinicalNote,
            Self::Measurement(_) => ArtifactKind::BodyMeasurement,
            Self::MealPlan(_) => ArtifactKind::MealPlan,
            Self::Transaction(_) => ArtifactKind::FinanceTransaction,
        }
    }

    fn patient_id(&self) -> Option<Uuid> {
        match self {
            Self::Note(n) => Some(n.patient_id),
            Self::Measurement(m) => Some(m.patient_id),
            Self::MealPlan(p) => Some(p.patient_id),
            // ledger rows reference the appointment, not the patient
            Self::Transaction(_) => None,
        }
    }
}

/// The stored record an attach produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BoundArtifact {
    Note(ClinicalNote),
    Measurement(BodyMeasurement),
    MealPlan(MealPlan),
    Transaction(FinanceTransaction),
}

impl BoundArtifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Note(_) => ArtifactKind::ClinicalNote,
            Self::Measurement(_) => ArtifactKind::BodyMeasurement,
            Self::MealPlan(_) => ArtifactKind::MealPlan,
            Self::Transaction(_) => ArtifactKind::FinanceTransaction,
        }
    }
}

// ─── Attach ────────────────────────────────────────────────

/// Bind an artifact to an appointment's empty slot of the payload's kind.
pub fn attach_artifact(
    conn: &mut Connection,
    ctx: &AccessContext,
    appointment_id: &Uuid,
    payload: &ArtifactPayload,
) -> Result<BoundArtifact, CoreError> {
    let kind = payload.kind();
    let mut patient_for_audit = None;
    let result = txn::immediate(conn, |tx| {
        let appt = repository::get_appointment(tx, appointment_id)?
            .ok_or_else(|| CoreError::not_found("Appointment", appointment_id))?;
        patient_for_audit = Some(appt.patient_id);

        if appt.status == AppointmentStatus::Cancelled {
            return Err(NotEligibleError::AppointmentCancelled.into());
        }
        if let Some(payload_patient) = payload.patient_id() {
            if payload_patient != appt.patient_id {
                return Err(ValidationError::PatientMismatch.into());
            }
        }
        if repository::artifact_exists(tx, appointment_id, kind)? {
            return Err(ConflictError::ArtifactAlreadyExists { kind }.into());
        }

        let bound = insert_payload(tx, &appt, payload)?;

        audit::record(
            tx,
            ctx,
            Some(appt.patient_id),
            "attach",
            "artifacts",
            Some(format!("appointment:{appointment_id} kind:{kind}")),
        )?;
        Ok(bound)
    });

    if result.is_ok() {
        tracing::info!(appointment_id = %appointment_id, kind = %kind, "Artifact attached");
    }
    audit::outcome(conn, ctx, patient_for_audit, "attach", "artifacts", result)
}

fn insert_payload(
    tx: &Connection,
    appt: &Appointment,
    payload: &ArtifactPayload,
) -> Result<BoundArtifact, CoreError> {
    match payload {
        ArtifactPayload::Note(n) => {
            if let Some(rating) = n.mood_rating {
                if !(config::MOOD_RATING_MIN..=config::MOOD_RATING_MAX).contains(&rating) {
                    return Err(ValidationError::MoodRatingOutOfRange { value: rating }.into());
                }
            }
            let note = ClinicalNote {
                id: Uuid::new_v4(),
                appointment_id: appt.id,
                patient_id: n.patient_id,
                template: n.template,
                content: n.content.clone(),
                mood_rating: n.mood_rating,
                private_notes: n.private_notes.clone(),
                pinned: n.pinned,
                tags: n.tags.clone(),
                created_at: Utc::now(),
            };
            repository::insert_clinical_note(tx, &note)?;
            Ok(BoundArtifact::Note(note))
        }
        ArtifactPayload::Measurement(m) => {
            let measurement = BodyMeasurement {
                id: Uuid::new_v4(),
                appointment_id: appt.id,
                patient_id: m.patient_id,
                weight_kg: m.weight_kg,
                height_cm: m.height_cm,
                body_fat_pct: m.body_fat_pct,
                waist_cm: m.waist_cm,
                hip_cm: m.hip_cm,
                recorded_at: Utc::now(),
            };
            repository::insert_measurement(tx, &measurement)?;
            Ok(BoundArtifact::Measurement(measurement))
        }
        ArtifactPayload::MealPlan(p) => {
            let plan = MealPlan {
                id: Uuid::new_v4(),
                appointment_id: appt.id,
                patient_id: p.patient_id,
                description: p.description.clone(),
                file_ref: p.file_ref.clone(),
                created_at: Utc::now(),
            };
            repository::insert_meal_plan(tx, &plan)?;
            Ok(BoundArtifact::MealPlan(plan))
        }
        ArtifactPayload::Transaction(t) => {
            if t.amount.is_sign_negative() {
                return Err(ValidationError::NegativeAmount.into());
            }
            let record = FinanceTransaction {
                id: Uuid::new_v4(),
                clinician_id: appt.clinician_id,
                appointment_id: Some(appt.id),
                transaction_type: t.transaction_type,
                category: t.category.clone(),
                amount: t.amount,
                date: appointment_date(appt),
            };
            repository::insert_transaction(tx, &record)?;
            Ok(BoundArtifact::Transaction(record))
        }
    }
}

fn appointment_date(appt: &Appointment) -> NaiveDate {
    appt.start_time.date_naive()
}

// ─── Cascade ───────────────────────────────────────────────

/// Delete an appointment and everything bound to it, atomically.
pub fn delete_appointment(
    conn: &mut Connection,
    ctx: &AccessContext,
    appointment_id: &Uuid,
) -> Result<(), CoreError> {
    let mut patient_for_audit = None;
    let result = txn::immediate(conn, |tx| {
        let appt = repository::get_appointment(tx, appointment_id)?
            .ok_or_else(|| CoreError::not_found("Appointment", appointment_id))?;
        patient_for_audit = Some(appt.patient_id);

        let removed = delete_appointment_cascade(tx, appointment_id)?;

        audit::record(
            tx,
            ctx,
            Some(appt.patient_id),
            "delete",
            "appointments",
            Some(format!("appointment:{appointment_id} artifacts:{removed}")),
        )?;
        Ok(())
    });

    audit::outcome(conn, ctx, patient_for_audit, "delete", "appointments", result)
}

/// Artifacts first, then the appointment row. Shared with the patient
/// cascade in the registry; must run inside the caller's transaction.
/// Returns the number of artifacts removed.
pub(crate) fn delete_appointment_cascade(
    tx: &Connection,
    appointment_id: &Uuid,
) -> Result<usize, CoreError> {
    let removed = repository::delete_artifacts_for_appointment(tx, appointment_id)?;
    repository::delete_appointment_row(tx, appointment_id)?;
    tracing::info!(
        appointment_id = %appointment_id,
        artifacts = removed,
        "Appointment deleted with its artifacts"
    );
    Ok(removed)
}
