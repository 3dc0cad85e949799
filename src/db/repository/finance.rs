use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{decimal_column, enum_column, uuid_column, uuid_column_opt};
use crate::db::DatabaseError;
use crate::models::{FinanceTransaction, LedgerFilter};

const TRANSACTION_COLUMNS: &str =
    "id, clinician_id, appointment_id, type, category, amount, date";

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<FinanceTransaction> {
    Ok(FinanceTransaction {
        id: uuid_column(0, row.get(0)?)?,
        clinician_id: uuid_column(1, row.get(1)?)?,
        appointment_id: uuid_column_opt(2, row.get(2)?)?,
        transaction_type: enum_column(3, row.get(3)?)?,
        category: row.get(4)?,
        amount: decimal_column(5, row.get(5)?)?,
        date: row.get(6)?,
    })
}

pub fn insert_transaction(
    conn: &Connection,
    tx: &FinanceTransaction,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO finance_transactions (id, clinician_id, appointment_id, type, category,
         amount, date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            tx.id.to_string(),
            tx.clinician_id.to_string(),
            tx.appointment_id.map(|id| id.to_string()),
            tx.transaction_type.as_str(),
            tx.category,
            tx.amount.to_string(),
            tx.date,
        ],
    )?;
    Ok(())
}

/// Insert keyed by appointment id; a row already bound to the appointment
/// wins and the call is a no-op. Returns whether a row was written.
pub fn insert_transaction_if_absent(
    conn: &Connection,
    tx: &FinanceTransaction,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT INTO finance_transactions (id, clinician_id, appointment_id, type, category,
         amount, date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(appointment_id) DO NOTHING",
        params![
            tx.id.to_string(),
            tx.clinician_id.to_string(),
            tx.appointment_id.map(|id| id.to_string()),
            tx.transaction_type.as_str(),
            tx.category,
            tx.amount.to_string(),
            tx.date,
        ],
    )?;
    Ok(inserted > 0)
}

pub fn get_transaction(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<FinanceTransaction>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM finance_transactions WHERE id = ?1"
    ))?;
    let result = stmt.query_row(params![id.to_string()], transaction_from_row);
    match result {
        Ok(t) => Ok(Some(t)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_transaction_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Option<FinanceTransaction>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM finance_transactions WHERE appointment_id = ?1"
    ))?;
    let result = stmt.query_row(params![appointment_id.to_string()], transaction_from_row);
    match result {
        Ok(t) => Ok(Some(t)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_transaction(
    conn: &Connection,
    tx: &FinanceTransaction,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE finance_transactions
         SET type = ?1, category = ?2, amount = ?3, date = ?4
         WHERE id = ?5",
        params![
            tx.transaction_type.as_str(),
            tx.category,
            tx.amount.to_string(),
            tx.date,
            tx.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "FinanceTransaction".into(),
            id: tx.id.to_string(),
        });
    }
    Ok(())
}

pub fn delete_transaction_row(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM finance_transactions WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "FinanceTransaction".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Ledger listing with optional type and date-range filters, newest first.
pub fn list_transactions(
    conn: &Connection,
    clinician_id: &Uuid,
    filter: &LedgerFilter,
) -> Result<Vec<FinanceTransaction>, DatabaseError> {
    let mut sql = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM finance_transactions WHERE clinician_id = ?1"
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(clinician_id.to_string())];
    let mut param_idx = 2u32;

    if let Some(t) = filter.transaction_type {
        sql.push_str(&format!(" AND type = ?{param_idx}"));
        params_vec.push(Box::new(t.as_str()));
        param_idx += 1;
    }
    if let Some(from) = filter.date_from {
        sql.push_str(&format!(" AND date >= ?{param_idx}"));
        params_vec.push(Box::new(from));
        param_idx += 1;
    }
    if let Some(to) = filter.date_to {
        sql.push_str(&format!(" AND date <= ?{param_idx}"));
        params_vec.push(Box::new(to));
    }
    sql.push_str(" ORDER BY date DESC, rowid DESC");

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), transaction_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}
