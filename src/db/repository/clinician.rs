use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{decimal_column, enum_column, uuid_column};
use crate::db::DatabaseError;
use crate::models::{BillingDefaults, Clinician};

pub fn insert_clinician(conn: &Connection, clinician: &Clinician) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO clinicians (id, name, credential, currency, default_session_minutes,
         default_session_price, work_start_minute, work_end_minute, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            clinician.id.to_string(),
            clinician.name,
            clinician.credential.as_str(),
            clinician.currency,
            clinician.default_session_minutes,
            clinician.default_session_price.to_string(),
            clinician.work_start_minute,
            clinician.work_end_minute,
            clinician.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_clinician(conn: &Connection, id: &Uuid) -> Result<Option<Clinician>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, credential, currency, default_session_minutes,
                default_session_price, work_start_minute, work_end_minute, created_at
         FROM clinicians WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok(Clinician {
            id: uuid_column(0, row.get(0)?)?,
            name: row.get(1)?,
            credential: enum_column(2, row.get(2)?)?,
            currency: row.get(3)?,
            default_session_minutes: row.get(4)?,
            default_session_price: decimal_column(5, row.get(5)?)?,
            work_start_minute: row.get(6)?,
            work_end_minute: row.get(7)?,
            created_at: row.get(8)?,
        })
    });

    match result {
        Ok(c) => Ok(Some(c)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Billing defaults and the working window are the only mutable columns.
pub fn update_billing_defaults(
    conn: &Connection,
    id: &Uuid,
    defaults: &BillingDefaults,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE clinicians
         SET currency = ?1, default_session_minutes = ?2, default_session_price = ?3,
             work_start_minute = ?4, work_end_minute = ?5
         WHERE id = ?6",
        params![
            defaults.currency,
            defaults.default_session_minutes,
            defaults.default_session_price.to_string(),
            defaults.work_start_minute,
            defaults.work_end_minute,
            id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Clinician".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}
