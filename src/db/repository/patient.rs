use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{enum_column, json_column, uuid_column};
use crate::db::DatabaseError;
use crate::models::{Patient, PatientStatus};

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: uuid_column(0, row.get(0)?)?,
        clinician_id: uuid_column(1, row.get(1)?)?,
        name: row.get(2)?,
        birth_date: row.get(3)?,
        status: enum_column(4, row.get(4)?)?,
        clinical_context: row.get(5)?,
        goals: json_column(6, row.get(6)?)?,
        emergency_contact: row
            .get::<_, Option<String>>(7)?
            .map(|v| json_column(7, v))
            .transpose()?,
        created_at: row.get(8)?,
    })
}

const PATIENT_COLUMNS: &str = "id, clinician_id, name, birth_date, status, clinical_context,
                               goals, emergency_contact, created_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let goals_json = serde_json::to_string(&patient.goals)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("goals serialization: {e}")))?;
    let contact_json = patient
        .emergency_contact
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DatabaseError::ConstraintViolation(format!("contact serialization: {e}")))?;

    conn.execute(
        "INSERT INTO patients (id, clinician_id, name, birth_date, status, clinical_context,
         goals, emergency_contact, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            patient.id.to_string(),
            patient.clinician_id.to_string(),
            patient.name,
            patient.birth_date,
            patient.status.as_str(),
            patient.clinical_context,
            goals_json,
            contact_json,
            patient.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], patient_from_row);
    match result {
        Ok(p) => Ok(Some(p)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_patients(
    conn: &Connection,
    clinician_id: &Uuid,
    status: Option<PatientStatus>,
) -> Result<Vec<Patient>, DatabaseError> {
    match status {
        Some(s) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PATIENT_COLUMNS} FROM patients
                 WHERE clinician_id = ?1 AND status = ?2
                 ORDER BY name ASC"
            ))?;
            let rows = stmt.query_map(params![clinician_id.to_string(), s.as_str()], patient_from_row)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PATIENT_COLUMNS} FROM patients
                 WHERE clinician_id = ?1
                 ORDER BY name ASC"
            ))?;
            let rows = stmt.query_map(params![clinician_id.to_string()], patient_from_row)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
        }
    }
}

pub fn update_patient_status(
    conn: &Connection,
    id: &Uuid,
    status: PatientStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Row deletion only; the cascade over appointments and artifacts is the
/// registry's job and runs before this inside the same transaction.
pub fn delete_patient_row(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM patients WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}
