use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{decimal_column, enum_column, uuid_column};
use crate::db::DatabaseError;
use crate::models::{Appointment, AppointmentStatus, PaymentMethod, PaymentStatus};
use crate::timerange::TimeRange;

const APPOINTMENT_COLUMNS: &str = "id, patient_id, clinician_id, start_time, end_time, type,
                                   status, payment_status, payment_method, price, notes";

fn appointment_from_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: uuid_column(0, row.get(0)?)?,
        patient_id: uuid_column(1, row.get(1)?)?,
        clinician_id: uuid_column(2, row.get(2)?)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        appointment_type: enum_column(5, row.get(5)?)?,
        status: enum_column(6, row.get(6)?)?,
        payment_status: enum_column(7, row.get(7)?)?,
        payment_method: row
            .get::<_, Option<String>>(8)?
            .map(|v| enum_column(8, v))
            .transpose()?,
        price: decimal_column(9, row.get(9)?)?,
        notes: row.get(10)?,
    })
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, clinician_id, start_time, end_time, type,
         status, payment_status, payment_method, price, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.clinician_id.to_string(),
            appt.start_time,
            appt.end_time,
            appt.appointment_type.as_str(),
            appt.status.as_str(),
            appt.payment_status.as_str(),
            appt.payment_method.map(|m| m.as_str()),
            appt.price.to_string(),
            appt.notes,
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], appointment_from_row);
    match result {
        Ok(a) => Ok(Some(a)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// First calendar-blocking appointment of the clinician whose half-open
/// interval overlaps `range`, excluding `exclude` (the record being
/// rescheduled). Must run inside the committing transaction so the answer
/// stays true at commit time.
pub fn find_calendar_conflict(
    conn: &Connection,
    clinician_id: &Uuid,
    range: &TimeRange,
    exclude: Option<&Uuid>,
) -> Result<Option<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM appointments
         WHERE clinician_id = ?1
           AND status IN (?2, ?3)
           AND start_time < ?4 AND ?5 < end_time
           AND id <> ?6
         ORDER BY start_time ASC
         LIMIT 1",
    )?;

    let exclude_id = exclude.map(Uuid::to_string).unwrap_or_default();
    let result = stmt.query_row(
        params![
            clinician_id.to_string(),
            AppointmentStatus::Scheduled.as_str(),
            AppointmentStatus::InProgress.as_str(),
            range.end(),
            range.start(),
            exclude_id,
        ],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(id) => Ok(Some(Uuid::parse_str(&id).map_err(|_| {
            DatabaseError::ConstraintViolation(format!("malformed appointment id: {id}"))
        })?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_appointment_times(
    conn: &Connection,
    id: &Uuid,
    range: &TimeRange,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET start_time = ?1, end_time = ?2 WHERE id = ?3",
        params![range.start(), range.end(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn update_appointment_status(
    conn: &Connection,
    id: &Uuid,
    status: AppointmentStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn update_payment(
    conn: &Connection,
    id: &Uuid,
    status: PaymentStatus,
    method: Option<PaymentMethod>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET payment_status = ?1, payment_method = ?2 WHERE id = ?3",
        params![status.as_str(), method.map(|m| m.as_str()), id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Agenda listing, optionally restricted to a calendar window (any
/// appointment overlapping the window, same half-open test as conflicts).
pub fn list_appointments(
    conn: &Connection,
    clinician_id: &Uuid,
    window: Option<&TimeRange>,
) -> Result<Vec<Appointment>, DatabaseError> {
    match window {
        Some(w) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments
                 WHERE clinician_id = ?1 AND start_time < ?2 AND ?3 < end_time
                 ORDER BY start_time ASC"
            ))?;
            let rows = stmt.query_map(
                params![clinician_id.to_string(), w.end(), w.start()],
                appointment_from_row,
            )?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments
                 WHERE clinician_id = ?1
                 ORDER BY start_time ASC"
            ))?;
            let rows = stmt.query_map(params![clinician_id.to_string()], appointment_from_row)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
        }
    }
}

pub fn list_appointments_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE patient_id = ?1
         ORDER BY start_time ASC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], appointment_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Row deletion only; artifact cleanup is the binder's cascade and runs
/// before this inside the same transaction.
pub fn delete_appointment_row(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM appointments WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}
