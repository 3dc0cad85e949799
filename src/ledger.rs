//! Finance Ledger — clinician-scoped income/expense records.
//!
//! Two kinds of rows share one table: entries derived from completed,
//! paid appointments (keyed by appointment id, written idempotently by
//! the scheduler) and manual entries the clinician maintains directly.
//! Derived entries are read-only here; they follow their appointment.

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{self, AccessContext};
use crate::db::repository;
use crate::error::{CoreError, NotEligibleError, ValidationError};
use crate::models::{Appointment, FinanceTransaction, LedgerFilter, TransactionType};
use crate::txn;

/// Category assigned to derived session-income rows.
pub const SESSION_CATEGORY: &str = "session";

/// Derive the INCOME row for a completed, paid appointment. Idempotent:
/// a row already bound to the appointment wins and nothing is written.
/// Runs inside the caller's transaction.
pub fn materialize_income(
    conn: &Connection,
    appt: &Appointment,
) -> Result<Option<FinanceTransaction>, CoreError> {
    let tx = FinanceTransaction {
        id: Uuid::new_v4(),
        clinician_id: appt.clinician_id,
        appointment_id: Some(appt.id),
        transaction_type: TransactionType::Income,
        category: SESSION_CATEGORY.into(),
        amount: appt.price,
        date: appt.start_time.date_naive(),
    };

    if repository::insert_transaction_if_absent(conn, &tx)? {
        tracing::info!(
            appointment_id = %appt.id,
            amount = %tx.amount,
            "Materialized session income"
        );
        Ok(Some(tx))
    } else {
        tracing::debug!(appointment_id = %appt.id, "Income already materialized");
        Ok(None)
    }
}

/// Manual entry input. `id` present means update, absent means create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualEntry {
    pub id: Option<Uuid>,
    pub clinician_id: Uuid,
    pub transaction_type: TransactionType,
    pub category: String,
    pub amount: Decimal,
    pub date: NaiveDate,
}

/// Create or update a manual ledger entry. Rejects negative amounts and
/// any attempt to touch a derived (appointment-bound) row.
pub fn upsert_manual_entry(
    conn: &mut Connection,
    ctx: &AccessContext,
    entry: &ManualEntry,
) -> Result<FinanceTransaction, CoreError> {
    let result = txn::immediate(conn, |tx| {
        if entry.amount.is_sign_negative() {
            return Err(ValidationError::NegativeAmount.into());
        }

        let stored = match entry.id {
            None => {
                let record = FinanceTransaction {
                    id: Uuid::new_v4(),
                    clinician_id: entry.clinician_id,
                    appointment_id: None,
                    transaction_type: entry.transaction_type,
                    category: entry.category.clone(),
                    amount: entry.amount,
                    date: entry.date,
                };
                repository::insert_transaction(tx, &record)?;
                record
            }
            Some(id) => {
                let existing = repository::get_transaction(tx, &id)?
                    .ok_or_else(|| CoreError::not_found("FinanceTransaction", id))?;
                if existing.is_derived() {
                    return Err(NotEligibleError::DerivedEntryImmutable.into());
                }
                let record = FinanceTransaction {
                    id,
                    clinician_id: existing.clinician_id,
                    appointment_id: None,
                    transaction_type: entry.transaction_type,
                    category: entry.category.clone(),
                    amount: entry.amount,
                    date: entry.date,
                };
                repository::update_transaction(tx, &record)?;
                record
            }
        };

        audit::record(
            tx,
            ctx,
            None,
            "upsert",
            "finance_transactions",
            Some(format!("transaction:{}", stored.id)),
        )?;
        Ok(stored)
    });

    audit::outcome(conn, ctx, None, "upsert", "finance_transactions", result)
}

/// Delete a manual entry. Derived rows are refused; they disappear only
/// with their appointment.
pub fn delete_manual_entry(
    conn: &mut Connection,
    ctx: &AccessContext,
    id: &Uuid,
) -> Result<(), CoreError> {
    let result = txn::immediate(conn, |tx| {
        let existing = repository::get_transaction(tx, id)?
            .ok_or_else(|| CoreError::not_found("FinanceTransaction", id))?;
        if existing.is_derived() {
            return Err(NotEligibleError::DerivedEntryImmutable.into());
        }
        repository::delete_transaction_row(tx, id)?;
        audit::record(
            tx,
            ctx,
            None,
            "delete",
            "finance_transactions",
            Some(format!("transaction:{id}")),
        )?;
        Ok(())
    });

    audit::outcome(conn, ctx, None, "delete", "finance_transactions", result)
}

/// Ledger listing for a clinician, newest first.
pub fn list_entries(
    conn: &Connection,
    ctx: &AccessContext,
    clinician_id: &Uuid,
    filter: &LedgerFilter,
) -> Result<Vec<FinanceTransaction>, CoreError> {
    match repository::list_transactions(conn, clinician_id, filter) {
        Ok(entries) => {
            audit::record(conn, ctx, None, "read", "finance_transactions", None)?;
            Ok(entries)
        }
        Err(e) => {
            let err = CoreError::from(e);
            audit::record_denied(conn, ctx, None, "read", "finance_transactions", &err);
            Err(err)
        }
    }
}
