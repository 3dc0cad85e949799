//! CRUD for the three appointment-scoped clinical artifacts: notes,
//! body measurements, and meal plans. Finance rows live in `finance`.

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{enum_column, json_column, uuid_column};
use crate::db::DatabaseError;
use crate::models::{ArtifactKind, BodyMeasurement, ClinicalNote, MealPlan};

// ── Clinical notes ─────────────────────────────────────────

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<ClinicalNote> {
    Ok(ClinicalNote {
        id: uuid_column(0, row.get(0)?)?,
        appointment_id: uuid_column(1, row.get(1)?)?,
        patient_id: uuid_column(2, row.get(2)?)?,
        template: enum_column(3, row.get(3)?)?,
        content: json_column(4, row.get(4)?)?,
        mood_rating: row.get(5)?,
        private_notes: row.get(6)?,
        pinned: row.get(7)?,
        tags: json_column(8, row.get(8)?)?,
        created_at: row.get(9)?,
    })
}

pub fn insert_clinical_note(conn: &Connection, note: &ClinicalNote) -> Result<(), DatabaseError> {
    let content_json = serde_json::to_string(&note.content)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("note content: {e}")))?;
    let tags_json = serde_json::to_string(&note.tags)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("note tags: {e}")))?;

    conn.execute(
        "INSERT INTO clinical_notes (id, appointment_id, patient_id, template, content,
         mood_rating, private_notes, pinned, tags, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            note.id.to_string(),
            note.appointment_id.to_string(),
            note.patient_id.to_string(),
            note.template.as_str(),
            content_json,
            note.mood_rating,
            note.private_notes,
            note.pinned,
            tags_json,
            note.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_note_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Option<ClinicalNote>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, appointment_id, patient_id, template, content, mood_rating,
                private_notes, pinned, tags, created_at
         FROM clinical_notes WHERE appointment_id = ?1",
    )?;
    let result = stmt.query_row(params![appointment_id.to_string()], note_from_row);
    match result {
        Ok(n) => Ok(Some(n)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Body measurements ──────────────────────────────────────

fn measurement_from_row(row: &Row<'_>) -> rusqlite::Result<BodyMeasurement> {
    Ok(BodyMeasurement {
        id: uuid_column(0, row.get(0)?)?,
        appointment_id: uuid_column(1, row.get(1)?)?,
        patient_id: uuid_column(2, row.get(2)?)?,
        weight_kg: row.get(3)?,
        height_cm: row.get(4)?,
        body_fat_pct: row.get(5)?,
        waist_cm: row.get(6)?,
        hip_cm: row.get(7)?,
        recorded_at: row.get(8)?,
    })
}

pub fn insert_measurement(
    conn: &Connection,
    measurement: &BodyMeasurement,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO body_measurements (id, appointment_id, patient_id, weight_kg, height_cm,
         body_fat_pct, waist_cm, hip_cm, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            measurement.id.to_string(),
            measurement.appointment_id.to_string(),
            measurement.patient_id.to_string(),
            measurement.weight_kg,
            measurement.height_cm,
            measurement.body_fat_pct,
            measurement.waist_cm,
            measurement.hip_cm,
            measurement.recorded_at,
        ],
    )?;
    Ok(())
}

pub fn get_measurement_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Option<BodyMeasurement>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, appointment_id, patient_id, weight_kg, height_cm, body_fat_pct,
                waist_cm, hip_cm, recorded_at
         FROM body_measurements WHERE appointment_id = ?1",
    )?;
    let result = stmt.query_row(params![appointment_id.to_string()], measurement_from_row);
    match result {
        Ok(m) => Ok(Some(m)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Meal plans ─────────────────────────────────────────────

fn meal_plan_from_row(row: &Row<'_>) -> rusqlite::Result<MealPlan> {
    Ok(MealPlan {
        id: uuid_column(0, row.get(0)?)?,
        appointment_id: uuid_column(1, row.get(1)?)?,
        patient_id: uuid_column(2, row.get(2)?)?,
        description: row.get(3)?,
        file_ref: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert_meal_plan(conn: &Connection, plan: &MealPlan) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO meal_plans (id, appointment_id, patient_id, description, file_ref, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            plan.id.to_string(),
            plan.appointment_id.to_string(),
            plan.patient_id.to_string(),
            plan.description,
            plan.file_ref,
            plan.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_meal_plan_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Option<MealPlan>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, appointment_id, patient_id, description, file_ref, created_at
         FROM meal_plans WHERE appointment_id = ?1",
    )?;
    let result = stmt.query_row(params![appointment_id.to_string()], meal_plan_from_row);
    match result {
        Ok(p) => Ok(Some(p)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Slot queries & cascade ─────────────────────────────────

fn kind_table(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::ClinicalNote => "clinical_notes",
        ArtifactKind::FinanceTransaction => "finance_transactions",
        ArtifactKind::BodyMeasurement => "body_measurements",
        ArtifactKind::MealPlan => "meal_plans",
    }
}

/// Whether the artifact slot of the given kind is already taken.
pub fn artifact_exists(
    conn: &Connection,
    appointment_id: &Uuid,
    kind: ArtifactKind,
) -> Result<bool, DatabaseError> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE appointment_id = ?1",
        kind_table(kind)
    );
    let count: i64 = conn.query_row(&sql, params![appointment_id.to_string()], |row| row.get(0))?;
    Ok(count > 0)
}

/// Delete every artifact bound to the appointment. Returns the number of
/// rows removed per kind, for cascade logging.
pub fn delete_artifacts_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<usize, DatabaseError> {
    let id = appointment_id.to_string();
    let mut total = 0;
    total += conn.execute(
        "DELETE FROM clinical_notes WHERE appointment_id = ?1",
        params![id],
    )?;
    total += conn.execute(
        "DELETE FROM body_measurements WHERE appointment_id = ?1",
        params![id],
    )?;
    total += conn.execute(
        "DELETE FROM meal_plans WHERE appointment_id = ?1",
        params![id],
    )?;
    total += conn.execute(
        "DELETE FROM finance_transactions WHERE appointment_id = ?1",
        params![id],
    )?;
    Ok(total)
}
