use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{uuid_column, uuid_column_opt};
use crate::db::DatabaseError;
use crate::models::AccessLogEntry;

const ACCESS_COLUMNS: &str =
    "id, actor_id, patient_id, action, resource, detail, ip, user_agent, timestamp";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<AccessLogEntry> {
    Ok(AccessLogEntry {
        id: uuid_column(0, row.get(0)?)?,
        actor_id: uuid_column(1, row.get(1)?)?,
        patient_id: uuid_column_opt(2, row.get(2)?)?,
        action: row.get(3)?,
        resource: row.get(4)?,
        detail: row.get(5)?,
        ip: row.get(6)?,
        user_agent: row.get(7)?,
        timestamp: row.get(8)?,
    })
}

/// Append one entry. The table is insert-only; there is no update path.
pub fn insert_access_entry(conn: &Connection, entry: &AccessLogEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO access_log (id, actor_id, patient_id, action, resource, detail, ip,
         user_agent, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.id.to_string(),
            entry.actor_id.to_string(),
            entry.patient_id.map(|id| id.to_string()),
            entry.action,
            entry.resource,
            entry.detail,
            entry.ip,
            entry.user_agent,
            entry.timestamp,
        ],
    )?;
    Ok(())
}

/// Entries for one patient in call order (rowid is the append order).
pub fn list_access_entries_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<AccessLogEntry>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCESS_COLUMNS} FROM access_log WHERE patient_id = ?1 ORDER BY rowid ASC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], entry_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Entries recorded by one actor in call order.
pub fn list_access_entries_for_actor(
    conn: &Connection,
    actor_id: &Uuid,
) -> Result<Vec<AccessLogEntry>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCESS_COLUMNS} FROM access_log WHERE actor_id = ?1 ORDER BY rowid ASC"
    ))?;
    let rows = stmt.query_map(params![actor_id.to_string()], entry_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Erase a deleted patient's rows. Only the patient-deletion cascade may
/// call this; every other path treats the log as append-only.
pub fn delete_access_entries_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM access_log WHERE patient_id = ?1",
        params![patient_id.to_string()],
    )?;
    Ok(deleted)
}
