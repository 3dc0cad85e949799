//! Appointment Scheduler — validates proposed sessions against the
//! clinician's calendar and commits or rejects them.
//!
//! Validation short-circuits in a fixed order, each step mapping to its
//! own error kind: interval → working hours → patient gate → calendar
//! overlap → price. The whole of validate+insert runs inside one
//! immediate transaction (`txn::immediate`), so no concurrent commit for
//! the same clinician can observe a half-validated state.

use chrono::{DateTime, Timelike, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{self, AccessContext};
use crate::db::repository;
use crate::error::{ConflictError, CoreError, NotEligibleError, ValidationError};
use crate::ledger;
use crate::models::{
    Appointment, AppointmentStatus, AppointmentType, Clinician, PatientStatus, PaymentMethod,
    PaymentStatus,
};
use crate::timerange::TimeRange;
use crate::txn;

/// Proposed session. Times are already-normalized UTC instants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub clinician_id: Uuid,
    pub patient_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub appointment_type: AppointmentType,
    /// None falls back to the clinician's default session price.
    pub price: Option<Decimal>,
    pub notes: Option<String>,
}

/// Validate and commit a new appointment.
pub fn schedule_appointment(
    conn: &mut Connection,
    ctx: &AccessContext,
    req: &ScheduleRequest,
) -> Result<Appointment, CoreError> {
    let result = txn::immediate(conn, |tx| {
        let appt = validate_and_insert(tx, req)?;
        audit::record(
            tx,
            ctx,
            Some(req.patient_id),
            "schedule",
            "appointments",
            Some(format!("appointment:{}", appt.id)),
        )?;
        Ok(appt)
    });

    if let Ok(appt) = &result {
        tracing::info!(
            appointment_id = %appt.id,
            clinician_id = %appt.clinician_id,
            start = %appt.start_time,
            "Appointment scheduled"
        );
    }
    audit::outcome(conn, ctx, Some(req.patient_id), "schedule", "appointments", result)
}

fn validate_and_insert(tx: &Connection, req: &ScheduleRequest) -> Result<Appointment, CoreError> {
    // 1. interval
    let range = TimeRange::new(req.start_time, req.end_time)?;

    let clinician = repository::get_clinician(tx, &req.clinician_id)?
        .ok_or_else(|| CoreError::not_found("Clinician", req.clinician_id))?;

    // 1b. working window, when the clinician has one
    if outside_working_window(&clinician, &range) {
        return Err(ValidationError::OutsideWorkingHours.into());
    }

    // 2. patient exists, belongs to the clinician, and is eligible
    let patient = repository::get_patient(tx, &req.patient_id)?
        .filter(|p| p.clinician_id == req.clinician_id)
        .ok_or_else(|| CoreError::not_found("Patient", req.patient_id))?;
    match patient.status {
        PatientStatus::Archived => {
            return Err(NotEligibleError::PatientArchived.into());
        }
        PatientStatus::Waitlist if req.appointment_type != AppointmentType::Evaluation => {
            return Err(NotEligibleError::WaitlistRequiresEvaluation.into());
        }
        _ => {}
    }

    // 3. calendar overlap
    if let Some(existing) = repository::find_calendar_conflict(tx, &req.clinician_id, &range, None)?
    {
        return Err(ConflictError::OverlappingAppointment { existing }.into());
    }

    // 4. price
    let price = req.price.unwrap_or(clinician.default_session_price);
    if price.is_sign_negative() {
        return Err(ValidationError::NegativePrice.into());
    }

    let appt = Appointment {
        id: Uuid::new_v4(),
        patient_id: req.patient_id,
        clinician_id: req.clinician_id,
        start_time: range.start(),
        end_time: range.end(),
        appointment_type: req.appointment_type,
        status: AppointmentStatus::Scheduled,
        payment_status: PaymentStatus::Pending,
        payment_method: None,
        price,
        notes: req.notes.clone(),
    };
    repository::insert_appointment(tx, &appt)?;
    Ok(appt)
}

/// Move a SCHEDULED appointment to a new interval, re-running the overlap
/// check with the appointment itself excluded.
pub fn reschedule_appointment(
    conn: &mut Connection,
    ctx: &AccessContext,
    appointment_id: &Uuid,
    new_start: DateTime<Utc>,
    new_end: DateTime<Utc>,
) -> Result<Appointment, CoreError> {
    let mut patient_for_audit = None;
    let result = txn::immediate(conn, |tx| {
        let appt = repository::get_appointment(tx, appointment_id)?
            .ok_or_else(|| CoreError::not_found("Appointment", appointment_id))?;
        patient_for_audit = Some(appt.patient_id);

        if appt.status != AppointmentStatus::Scheduled {
            return Err(NotEligibleError::RescheduleNotAllowed {
                status: appt.status,
            }
            .into());
        }

        let range = TimeRange::new(new_start, new_end)?;

        let clinician = repository::get_clinician(tx, &appt.clinician_id)?
            .ok_or_else(|| CoreError::not_found("Clinician", appt.clinician_id))?;
        if outside_working_window(&clinician, &range) {
            return Err(ValidationError::OutsideWorkingHours.into());
        }

        if let Some(existing) =
            repository::find_calendar_conflict(tx, &appt.clinician_id, &range, Some(appointment_id))?
        {
            return Err(ConflictError::OverlappingAppointment { existing }.into());
        }

        repository::update_appointment_times(tx, appointment_id, &range)?;
        audit::record(
            tx,
            ctx,
            Some(appt.patient_id),
            "reschedule",
            "appointments",
            Some(format!("appointment:{appointment_id}")),
        )?;

        Ok(Appointment {
            start_time: range.start(),
            end_time: range.end(),
            ..appt
        })
    });

    audit::outcome(conn, ctx, patient_for_audit, "reschedule", "appointments", result)
}

/// Drive the appointment state machine. Completing a paid appointment
/// materializes its income transaction (idempotently) in the same commit.
pub fn transition_appointment_status(
    conn: &mut Connection,
    ctx: &AccessContext,
    appointment_id: &Uuid,
    new_status: AppointmentStatus,
) -> Result<Appointment, CoreError> {
    let mut patient_for_audit = None;
    let result = txn::immediate(conn, |tx| {
        let appt = repository::get_appointment(tx, appointment_id)?
            .ok_or_else(|| CoreError::not_found("Appointment", appointment_id))?;
        patient_for_audit = Some(appt.patient_id);

        if !appt.status.can_transition_to(new_status) {
            return Err(NotEligibleError::InvalidTransition {
                from: appt.status,
                to: new_status,
            }
            .into());
        }

        repository::update_appointment_status(tx, appointment_id, new_status)?;
        let updated = Appointment {
            status: new_status,
            ..appt
        };

        if new_status == AppointmentStatus::Completed
            && updated.payment_status == PaymentStatus::Paid
        {
            ledger::materialize_income(tx, &updated)?;
        }

        audit::record(
            tx,
            ctx,
            Some(updated.patient_id),
            "transition",
            "appointments",
            Some(format!("appointment:{appointment_id} -> {new_status}")),
        )?;
        Ok(updated)
    });

    audit::outcome(conn, ctx, patient_for_audit, "transition", "appointments", result)
}

/// Record payment for a completed session. Idempotent: paying an already
/// paid appointment changes nothing. Triggers income materialization.
pub fn record_payment(
    conn: &mut Connection,
    ctx: &AccessContext,
    appointment_id: &Uuid,
    method: PaymentMethod,
) -> Result<Appointment, CoreError> {
    let mut patient_for_audit = None;
    let result = txn::immediate(conn, |tx| {
        let appt = repository::get_appointment(tx, appointment_id)?
            .ok_or_else(|| CoreError::not_found("Appointment", appointment_id))?;
        patient_for_audit = Some(appt.patient_id);

        if appt.payment_status == PaymentStatus::Paid {
            audit::record(
                tx,
                ctx,
                Some(appt.patient_id),
                "record_payment",
                "appointments",
                Some(format!("appointment:{appointment_id} (already paid)")),
            )?;
            return Ok(appt);
        }
        if appt.status != AppointmentStatus::Completed {
            return Err(NotEligibleError::PaymentBeforeCompletion.into());
        }

        repository::update_payment(tx, appointment_id, PaymentStatus::Paid, Some(method))?;
        let updated = Appointment {
            payment_status: PaymentStatus::Paid,
            payment_method: Some(method),
            ..appt
        };
        ledger::materialize_income(tx, &updated)?;

        audit::record(
            tx,
            ctx,
            Some(updated.patient_id),
            "record_payment",
            "appointments",
            Some(format!("appointment:{appointment_id}")),
        )?;
        Ok(updated)
    });

    audit::outcome(conn, ctx, patient_for_audit, "record_payment", "appointments", result)
}

/// Agenda listing for a clinician, optionally restricted to a window.
/// The read is logged like any other patient-data access.
pub fn agenda(
    conn: &Connection,
    ctx: &AccessContext,
    clinician_id: &Uuid,
    window: Option<&TimeRange>,
) -> Result<Vec<Appointment>, CoreError> {
    let result = repository::list_appointments(conn, clinician_id, window).map_err(CoreError::from);
    match result {
        Ok(appts) => {
            audit::record(conn, ctx, None, "read", "appointments", None)?;
            Ok(appts)
        }
        Err(err) => {
            audit::record_denied(conn, ctx, None, "read", "appointments", &err);
            Err(err)
        }
    }
}

fn minute_of_day(t: DateTime<Utc>) -> u32 {
    t.time().hour() * 60 + t.time().minute()
}

/// True when the clinician has a working window and the interval does not
/// fit inside it. An end at exactly midnight of the next day counts as
/// minute 1440 so a window closing at midnight accepts it.
fn outside_working_window(clinician: &Clinician, range: &TimeRange) -> bool {
    let (Some(work_start), Some(work_end)) =
        (clinician.work_start_minute, clinician.work_end_minute)
    else {
        return false;
    };

    let start_day = range.start().date_naive();
    let end_day = range.end().date_naive();
    let start_min = minute_of_day(range.start());
    let end_min = if end_day == start_day {
        minute_of_day(range.end())
    } else if end_day == start_day.succ_opt().unwrap_or(end_day) && minute_of_day(range.end()) == 0
    {
        24 * 60
    } else {
        // spans past midnight into the next day
        return true;
    };

    start_min < work_start || end_min > work_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use crate::db::sqlite::{open_database, open_memory_database};
    use crate::models::{Credential, NewPatient, Patient};
    use crate::registry;

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, h, m, 0).unwrap()
    }

    fn seed_clinician(conn: &mut Connection) -> Clinician {
        registry::provision_clinician(
            conn,
            &registry::NewClinician {
                name: "Dr. Lispector".into(),
                credential: Credential::Crn,
                currency: "BRL".into(),
                default_session_minutes: 50,
                default_session_price: Decimal::new(18_000, 2), // 180.00
                work_start_minute: None,
                work_end_minute: None,
            },
        )
        .unwrap()
    }

    fn seed_patient(conn: &mut Connection, clinician: &Clinician, status: PatientStatus) -> Patient {
        let ctx = AccessContext::new(clinician.id);
        registry::register_patient(
            conn,
            &ctx,
            &NewPatient {
                clinician_id: clinician.id,
                name: "Ana Souza".into(),
                birth_date: None,
                status,
                clinical_context: None,
                goals: vec!["weight maintenance".into()],
                emergency_contact: None,
            },
        )
        .unwrap()
    }

    fn request(
        clinician: &Clinician,
        patient: &Patient,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ScheduleRequest {
        ScheduleRequest {
            clinician_id: clinician.id,
            patient_id: patient.id,
            start_time: start,
            end_time: end,
            appointment_type: AppointmentType::Consultation,
            price: None,
            notes: None,
        }
    }

    #[test]
    fn schedules_a_valid_session() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        let appt = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap();

        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(appt.payment_status, PaymentStatus::Pending);
        assert_eq!(appt.price, Decimal::new(18_000, 2)); // clinician default
        let stored = repository::get_appointment(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(stored.start_time, at(2, 10, 0));
    }

    #[test]
    fn rejects_inverted_interval() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        let err = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 11, 0), at(2, 10, 0)),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::EmptyInterval)
        ));
    }

    #[test]
    fn rejects_overlapping_booking() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        let first = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap();

        let err = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 30), at(2, 11, 30)),
        )
        .unwrap_err();
        match err {
            CoreError::Conflict(ConflictError::OverlappingAppointment { existing }) => {
                assert_eq!(existing, first.id);
            }
            other => panic!("expected overlap conflict, got {other:?}"),
        }
    }

    #[test]
    fn back_to_back_sessions_are_allowed() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 9, 0), at(2, 10, 0)),
        )
        .unwrap();
        schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap();

        let appts = repository::list_appointments(&conn, &clinician.id, None).unwrap();
        assert_eq!(appts.len(), 2);
    }

    #[test]
    fn cancelled_slot_can_be_rebooked() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        let first = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap();
        transition_appointment_status(&mut conn, &ctx, &first.id, AppointmentStatus::Cancelled)
            .unwrap();

        // the cancelled appointment no longer blocks the calendar
        schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap();
    }

    #[test]
    fn archived_patient_cannot_book() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Archived);
        let ctx = AccessContext::new(clinician.id);

        let err = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::NotEligible(NotEligibleError::PatientArchived)
        ));
    }

    #[test]
    fn waitlisted_patient_only_books_evaluations() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Waitlist);
        let ctx = AccessContext::new(clinician.id);

        let err = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::NotEligible(NotEligibleError::WaitlistRequiresEvaluation)
        ));

        let mut req = request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0));
        req.appointment_type = AppointmentType::Evaluation;
        schedule_appointment(&mut conn, &ctx, &req).unwrap();
    }

    #[test]
    fn unknown_patient_is_not_found() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let ctx = AccessContext::new(clinician.id);

        let mut req = request(
            &clinician,
            &Patient {
                id: Uuid::new_v4(),
                clinician_id: clinician.id,
                name: "ghost".into(),
                birth_date: None,
                status: PatientStatus::Active,
                clinical_context: None,
                goals: vec![],
                emergency_contact: None,
                created_at: at(1, 0, 0),
            },
            at(2, 10, 0),
            at(2, 11, 0),
        );
        req.patient_id = Uuid::new_v4();
        let err = schedule_appointment(&mut conn, &ctx, &req).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn foreign_patient_is_not_found() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let other = registry::provision_clinician(
            &mut conn,
            &registry::NewClinician {
                name: "Dr. Rosa".into(),
                credential: Credential::Crm,
                currency: "BRL".into(),
                default_session_minutes: 30,
                default_session_price: Decimal::new(20_000, 2),
                work_start_minute: None,
                work_end_minute: None,
            },
        )
        .unwrap();
        let foreign_patient = seed_patient(&mut conn, &other, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        let err = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &foreign_patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn negative_price_override_is_rejected() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        let mut req = request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0));
        req.price = Some(Decimal::new(-100, 2));
        let err = schedule_appointment(&mut conn, &ctx, &req).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::NegativePrice)
        ));
    }

    #[test]
    fn working_window_is_enforced() {
        let mut conn = open_memory_database().unwrap();
        let clinician = registry::provision_clinician(
            &mut conn,
            &registry::NewClinician {
                name: "Dr. Lispector".into(),
                credential: Credential::Crn,
                currency: "BRL".into(),
                default_session_minutes: 50,
                default_session_price: Decimal::new(18_000, 2),
                work_start_minute: Some(8 * 60),
                work_end_minute: Some(18 * 60),
            },
        )
        .unwrap();
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        let err = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 7, 0), at(2, 8, 0)),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutsideWorkingHours)
        ));

        // exactly at the window edges is fine
        schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 8, 0), at(2, 9, 0)),
        )
        .unwrap();
        schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 17, 0), at(2, 18, 0)),
        )
        .unwrap();
    }

    #[test]
    fn reschedule_moves_a_scheduled_session() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        let appt = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap();

        let moved =
            reschedule_appointment(&mut conn, &ctx, &appt.id, at(2, 14, 0), at(2, 15, 0)).unwrap();
        assert_eq!(moved.start_time, at(2, 14, 0));

        let stored = repository::get_appointment(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(stored.start_time, at(2, 14, 0));
    }

    #[test]
    fn reschedule_into_occupied_slot_is_rejected_and_keeps_original_time() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        let x = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 9, 0), at(2, 10, 0)),
        )
        .unwrap();
        let y = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap();

        let err = reschedule_appointment(&mut conn, &ctx, &x.id, at(2, 9, 30), at(2, 10, 30))
            .unwrap_err();
        match err {
            CoreError::Conflict(ConflictError::OverlappingAppointment { existing }) => {
                assert_eq!(existing, y.id);
            }
            other => panic!("expected overlap conflict, got {other:?}"),
        }

        let stored = repository::get_appointment(&conn, &x.id).unwrap().unwrap();
        assert_eq!(stored.start_time, at(2, 9, 0), "X must keep its original time");
    }

    #[test]
    fn reschedule_onto_own_slot_is_allowed() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        let appt = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap();

        // shifting within its own old interval only conflicts with itself
        reschedule_appointment(&mut conn, &ctx, &appt.id, at(2, 10, 30), at(2, 11, 30)).unwrap();
    }

    #[test]
    fn reschedule_requires_scheduled_status() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        let appt = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap();
        transition_appointment_status(&mut conn, &ctx, &appt.id, AppointmentStatus::InProgress)
            .unwrap();

        let err = reschedule_appointment(&mut conn, &ctx, &appt.id, at(2, 14, 0), at(2, 15, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::NotEligible(NotEligibleError::RescheduleNotAllowed { .. })
        ));
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        let appt = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap();

        // SCHEDULED cannot jump straight to COMPLETED
        let err = transition_appointment_status(
            &mut conn,
            &ctx,
            &appt.id,
            AppointmentStatus::Completed,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::NotEligible(NotEligibleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn payment_requires_completion() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        let appt = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap();

        let err = record_payment(&mut conn, &ctx, &appt.id, PaymentMethod::Card).unwrap_err();
        assert!(matches!(
            err,
            CoreError::NotEligible(NotEligibleError::PaymentBeforeCompletion)
        ));
    }

    #[test]
    fn completing_and_paying_materializes_income_once() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        let appt = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap();
        transition_appointment_status(&mut conn, &ctx, &appt.id, AppointmentStatus::InProgress)
            .unwrap();
        transition_appointment_status(&mut conn, &ctx, &appt.id, AppointmentStatus::Completed)
            .unwrap();

        record_payment(&mut conn, &ctx, &appt.id, PaymentMethod::Transfer).unwrap();
        // paying again is a no-op, not a second transaction
        record_payment(&mut conn, &ctx, &appt.id, PaymentMethod::Transfer).unwrap();

        let tx = repository::get_transaction_for_appointment(&conn, &appt.id)
            .unwrap()
            .expect("income transaction must exist");
        assert_eq!(tx.amount, appt.price);
        assert!(tx.is_derived());

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM finance_transactions WHERE appointment_id = ?1",
                [appt.id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "materialization must be idempotent");
    }

    #[test]
    fn every_schedule_attempt_is_audited() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap();
        // denied attempt (overlap)
        let _ = schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        );

        let entries =
            repository::list_access_entries_for_patient(&conn, &patient.id).unwrap();
        let schedule_entries: Vec<_> = entries
            .iter()
            .filter(|e| e.action == "schedule")
            .collect();
        assert_eq!(schedule_entries.len(), 2);
        assert!(schedule_entries[1]
            .detail
            .as_deref()
            .unwrap()
            .starts_with("denied:"));
    }

    #[test]
    fn concurrent_overlapping_bookings_commit_exactly_one() {
        use std::sync::Arc;
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("praxis.db");

        let (clinician, patient) = {
            let mut conn = open_database(&path).unwrap();
            let clinician = seed_clinician(&mut conn);
            let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
            (clinician, patient)
        };

        let path = Arc::new(path);
        let reqs = [
            request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
            request(&clinician, &patient, at(2, 10, 30), at(2, 11, 30)),
        ];

        let handles: Vec<_> = reqs
            .into_iter()
            .map(|req| {
                let path = Arc::clone(&path);
                let ctx = AccessContext::new(clinician.id);
                thread::spawn(move || {
                    let mut conn = open_database(&path).unwrap();
                    schedule_appointment(&mut conn, &ctx, &req)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let committed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(committed, 1, "exactly one of two overlapping bookings wins");
        let loser = results.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(
            loser.as_ref().unwrap_err(),
            CoreError::Conflict(_) | CoreError::Concurrency { .. }
        ));

        let conn = open_database(&path).unwrap();
        let appts = repository::list_appointments(&conn, &clinician.id, None).unwrap();
        assert_eq!(appts.len(), 1);
    }

    #[test]
    fn committed_calendar_never_overlaps() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let ana = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);
        let bruno = registry::register_patient(
            &mut conn,
            &ctx,
            &NewPatient {
                clinician_id: clinician.id,
                name: "Bruno Lima".into(),
                birth_date: None,
                status: PatientStatus::Active,
                clinical_context: None,
                goals: vec![],
                emergency_contact: None,
            },
        )
        .unwrap();

        // a mix of winners and losers across two patients
        let attempts = [
            (&ana, 9, 0, 10, 0),
            (&bruno, 10, 0, 11, 0),
            (&ana, 10, 30, 11, 30),  // loses to bruno's 10-11
            (&bruno, 9, 30, 10, 30), // loses to both
            (&ana, 11, 0, 12, 0),
        ];
        for (patient, sh, sm, eh, em) in attempts {
            let _ = schedule_appointment(
                &mut conn,
                &ctx,
                &request(&clinician, patient, at(2, sh, sm), at(2, eh, em)),
            );
        }

        let committed: Vec<Appointment> =
            repository::list_appointments(&conn, &clinician.id, None)
                .unwrap()
                .into_iter()
                .filter(|a| a.status.blocks_calendar())
                .collect();
        assert_eq!(committed.len(), 3);
        for a in &committed {
            for b in &committed {
                if a.id != b.id {
                    assert!(
                        !a.range().overlaps(&b.range()),
                        "calendar invariant violated between {} and {}",
                        a.id,
                        b.id
                    );
                }
            }
        }
    }

    #[test]
    fn agenda_lists_by_window() {
        let mut conn = open_memory_database().unwrap();
        let clinician = seed_clinician(&mut conn);
        let patient = seed_patient(&mut conn, &clinician, PatientStatus::Active);
        let ctx = AccessContext::new(clinician.id);

        schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(2, 10, 0), at(2, 11, 0)),
        )
        .unwrap();
        schedule_appointment(
            &mut conn,
            &ctx,
            &request(&clinician, &patient, at(9, 10, 0), at(9, 11, 0)),
        )
        .unwrap();

        let window = TimeRange::new(at(1, 0, 0), at(3, 0, 0)).unwrap();
        let day_view = agenda(&conn, &ctx, &clinician.id, Some(&window)).unwrap();
        assert_eq!(day_view.len(), 1);
        assert_eq!(day_view[0].start_time, at(2, 10, 0));

        let all = agenda(&conn, &ctx, &clinician.id, None).unwrap();
        assert_eq!(all.len(), 2);
    }
}
